//! Incremental byte-stream key decoder.
//!
//! Push parser: the caller feeds raw terminal bytes and receives decoded
//! [`KeyEvent`]s through a callback sink, so sequences may be split across
//! reads at any byte. A lone ESC cannot be distinguished from the start of
//! an escape sequence by the bytes alone; the caller polls the input for a
//! short window and invokes [`Decoder::flush`] on timeout to resolve it.
//!
//! Recognized sequences are the VT100/xterm subset: `ESC [ … final` (CSI)
//! and `ESC O final` (SS3 PF-keys). Unknown sequences are consumed and
//! dropped; malformed UTF-8 is dropped bytewise.

use core_events::{Key, KeyEvent};
use smallvec::SmallVec;
use tracing::trace;

/// Longest accepted CSI parameter/intermediate run. Sequences that exceed
/// it are discarded wholesale.
const CSI_PARAM_MAX: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    Csi,
    Ss3,
}

/// Incremental decoder state.
pub struct Decoder {
    state: State,
    params: SmallVec<[u8; CSI_PARAM_MAX]>,
    csi_overflow: bool,
    utf8: [u8; 4],
    utf8_len: usize,
    utf8_need: usize,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            params: SmallVec::new(),
            csi_overflow: false,
            utf8: [0; 4],
            utf8_len: 0,
            utf8_need: 0,
        }
    }

    /// Feed bytes, emitting zero or more events into `sink`.
    pub fn feed(&mut self, bytes: &[u8], sink: &mut impl FnMut(KeyEvent)) {
        for &b in bytes {
            self.advance(b, sink);
        }
    }

    /// True when the decoder sits mid-sequence and a timed [`flush`] is
    /// needed if no further bytes arrive.
    ///
    /// [`flush`]: Decoder::flush
    pub fn is_pending(&self) -> bool {
        self.state != State::Ground || self.utf8_need > 0
    }

    /// Resolve a pending state at input idle: a bare ESC becomes the
    /// `escape` key; incomplete CSI/SS3/UTF-8 remainders are dropped.
    pub fn flush(&mut self, sink: &mut impl FnMut(KeyEvent)) {
        match self.state {
            State::Escape => sink(KeyEvent::Key(Key::Escape)),
            State::Csi | State::Ss3 => {
                trace!(target: "input.decode", "incomplete_sequence_dropped");
            }
            State::Ground => {}
        }
        self.state = State::Ground;
        self.params.clear();
        self.csi_overflow = false;
        self.utf8_len = 0;
        self.utf8_need = 0;
    }

    fn advance(&mut self, b: u8, sink: &mut impl FnMut(KeyEvent)) {
        match self.state {
            State::Ground => self.ground(b, sink),
            State::Escape => match b {
                b'[' => {
                    self.state = State::Csi;
                    self.params.clear();
                    self.csi_overflow = false;
                }
                b'O' => self.state = State::Ss3,
                _ => {
                    // ESC followed by an ordinary byte: deliver escape, then
                    // reprocess the byte (this is how Alt-prefixed keys
                    // arrive).
                    sink(KeyEvent::Key(Key::Escape));
                    self.state = State::Ground;
                    self.ground(b, sink);
                }
            },
            State::Csi => match b {
                0x20..=0x3f => {
                    if self.params.len() < CSI_PARAM_MAX {
                        self.params.push(b);
                    } else {
                        self.csi_overflow = true;
                    }
                }
                0x40..=0x7e => {
                    if !self.csi_overflow {
                        if let Some(key) = csi_dispatch(&self.params, b) {
                            sink(KeyEvent::Key(key));
                        } else {
                            trace!(target: "input.decode", final_byte = b, "unknown_csi_dropped");
                        }
                    }
                    self.state = State::Ground;
                }
                _ => {
                    // Control byte inside a sequence aborts it.
                    self.state = State::Ground;
                }
            },
            State::Ss3 => {
                self.state = State::Ground;
                match b {
                    b'P' => sink(KeyEvent::Key(Key::F(1))),
                    b'Q' => sink(KeyEvent::Key(Key::F(2))),
                    b'R' => sink(KeyEvent::Key(Key::F(3))),
                    b'S' => sink(KeyEvent::Key(Key::F(4))),
                    _ => trace!(target: "input.decode", final_byte = b, "unknown_ss3_dropped"),
                }
            }
        }
    }

    fn ground(&mut self, b: u8, sink: &mut impl FnMut(KeyEvent)) {
        if self.utf8_need > 0 {
            if (0x80..0xc0).contains(&b) {
                self.utf8[self.utf8_len] = b;
                self.utf8_len += 1;
                if self.utf8_len == self.utf8_need {
                    if let Ok(s) = std::str::from_utf8(&self.utf8[..self.utf8_len]) {
                        if let Some(c) = s.chars().next() {
                            sink(KeyEvent::Char(c));
                        }
                    }
                    self.utf8_need = 0;
                    self.utf8_len = 0;
                }
                return;
            }
            // Invalid continuation: drop the partial scalar, reprocess.
            self.utf8_need = 0;
            self.utf8_len = 0;
        }
        match b {
            0x1b => self.state = State::Escape,
            0x01..=0x1a => sink(KeyEvent::ctrl((b'a' + b - 1) as char)),
            0x1f => sink(KeyEvent::Key(Key::CtrlUnderscore)),
            0x7f => sink(KeyEvent::Key(Key::Backspace)),
            0x20..=0x7e => sink(KeyEvent::Char(b as char)),
            0xc0..=0xdf => self.start_utf8(b, 2),
            0xe0..=0xef => self.start_utf8(b, 3),
            0xf0..=0xf7 => self.start_utf8(b, 4),
            _ => {
                // NUL, stray continuation bytes, 0x1c-0x1e: dropped.
                trace!(target: "input.decode", byte = b, "byte_dropped");
            }
        }
    }

    fn start_utf8(&mut self, b: u8, need: usize) {
        self.utf8[0] = b;
        self.utf8_len = 1;
        self.utf8_need = need;
    }
}

/// First numeric parameter of a CSI byte run, if any.
fn csi_number(params: &[u8]) -> Option<u32> {
    let digits: Vec<u8> = params
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .copied()
        .collect();
    if digits.is_empty() {
        return None;
    }
    std::str::from_utf8(&digits).ok()?.parse().ok()
}

fn csi_dispatch(params: &[u8], final_byte: u8) -> Option<Key> {
    match final_byte {
        b'A' => Some(Key::Up),
        b'B' => Some(Key::Down),
        b'C' => Some(Key::Right),
        b'D' => Some(Key::Left),
        b'H' => Some(Key::Home),
        b'F' => Some(Key::End),
        b'~' => match csi_number(params)? {
            3 => Some(Key::Delete),
            5 => Some(Key::PageUp),
            6 => Some(Key::PageDown),
            15 => Some(Key::F(5)),
            17 => Some(Key::F(6)),
            18 => Some(Key::F(7)),
            19 => Some(Key::F(8)),
            20 => Some(Key::F(9)),
            21 => Some(Key::F(10)),
            23 => Some(Key::F(11)),
            24 => Some(Key::F(12)),
            _ => None,
        },
        _ => None,
    }
}
