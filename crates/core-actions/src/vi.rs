//! Vi-flavor key handler: a modal state machine over the edit buffer.
//!
//! Navigation mode runs a two-layer dispatch. Typed characters accumulate
//! into a prefix that narrows a static table of multi-character keystrokes
//! (`dd`, `cw`, `>>`, …): an exact match fires its handler, a live prefix
//! waits for more input, and anything else resets the prefix without
//! touching the pending count. Digits build the count (capped below one
//! million); `f`/`F`/`t`/`T`/`r` install a one-character callback that
//! consumes the very next scalar.

use crate::common::{
    base_key, delete_words_to_clipboard, handle_enter, handle_isearch_event, handle_tab, repeat,
    word_back, word_forward,
};
use crate::{DispatchOutcome, KeyHandler};
use core_events::{Key, KeyEvent};
use core_state::{ClipboardData, Line, WordKind};
use tracing::trace;

/// Vi input mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViMode {
    #[default]
    Insert,
    Replace,
    Navigation,
}

/// Pending unary callback installed by `f`/`F`/`t`/`T`/`r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OneChar {
    FindForward(usize),
    FindBackward(usize),
    TillForward(usize),
    TillBackward(usize),
    Replace(usize),
}

type NavFn = fn(&mut ViHandler, &mut Line, Option<usize>) -> DispatchOutcome;

/// Navigation-mode keystroke table. Multi-character keys rely on prefix
/// narrowing; no single-character key is a proper prefix of another entry.
static NAVIGATION_TABLE: &[(&str, NavFn)] = &[
    (" ", nav_space),
    ("$", nav_end_of_line),
    ("%", nav_matching_bracket),
    ("0", nav_start_of_line),
    ("A", nav_append_at_end),
    ("B", nav_word_back_big),
    ("C", nav_change_to_end),
    ("D", nav_delete_to_end),
    ("E", nav_end_of_word_big),
    ("F", nav_find_backward),
    ("G", nav_go_to_line),
    ("H", nav_first_position),
    ("I", nav_insert_at_start),
    ("J", nav_join_lines),
    ("L", nav_last_position),
    ("O", nav_open_above),
    ("P", nav_paste_before),
    ("R", nav_replace_mode),
    ("S", nav_change_line),
    ("T", nav_till_backward),
    ("W", nav_word_forward_big),
    ("X", nav_delete_before),
    ("^", nav_start_after_whitespace),
    ("a", nav_append),
    ("b", nav_word_back),
    ("c$", nav_change_to_end),
    ("cc", nav_change_line),
    ("ce", nav_change_word),
    ("cw", nav_change_word),
    ("d$", nav_delete_to_end),
    ("dd", nav_delete_lines),
    ("dw", nav_delete_words),
    ("e", nav_end_of_word),
    ("f", nav_find_forward),
    ("h", nav_left),
    ("i", nav_insert),
    ("j", nav_down),
    ("k", nav_up),
    ("l", nav_right),
    ("o", nav_open_below),
    ("p", nav_paste_after),
    ("r", nav_replace_char),
    ("s", nav_substitute),
    ("t", nav_till_forward),
    ("u", nav_undo),
    ("v", nav_open_editor),
    ("w", nav_word_forward),
    ("x", nav_delete_char),
    ("yw", nav_yank_word),
    ("yy", nav_yank_lines),
    ("~", nav_toggle_case),
    ("<<", nav_unindent),
    (">>", nav_indent),
];

#[derive(Debug, Default)]
pub struct ViHandler {
    mode: ViMode,
    arg_count: Option<u64>,
    pending: String,
    one_char: Option<OneChar>,
    second_tab: bool,
}

impl ViHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> ViMode {
        self.mode
    }

    fn reset(&mut self) {
        self.mode = ViMode::Insert;
        self.arg_count = None;
        self.pending.clear();
        self.one_char = None;
        self.second_tab = false;
    }

    fn set_arg_count(&mut self, value: Option<u64>, line: &mut Line) {
        self.arg_count = value;
        match value {
            Some(n) => line.set_arg_prompt(n.to_string()),
            None => line.set_arg_prompt(""),
        }
    }

    fn dispatch_inner(&mut self, event: KeyEvent, line: &mut Line) -> DispatchOutcome {
        if let Some(outcome) = handle_isearch_event(event, line) {
            return outcome;
        }
        match event {
            KeyEvent::Key(Key::Escape) => {
                self.mode = ViMode::Navigation;
                self.pending.clear();
                self.one_char = None;
                self.set_arg_count(None, line);
                DispatchOutcome::Continue
            }
            e if e.is_enter() => {
                line.run_enter_hook();
                let force_accept = !line.multiline || self.mode == ViMode::Navigation;
                handle_enter(line, force_accept)
            }
            e if e.is_tab() => handle_tab(&mut self.second_tab, line),
            KeyEvent::Char(c) => {
                self.second_tab = false;
                if let Some(pending) = self.one_char.take() {
                    self.run_one_char(pending, c, line);
                    return DispatchOutcome::Continue;
                }
                match self.mode {
                    ViMode::Insert => {
                        self.insert_char(c, line, false);
                        DispatchOutcome::Continue
                    }
                    ViMode::Replace => {
                        self.insert_char(c, line, true);
                        DispatchOutcome::Continue
                    }
                    ViMode::Navigation => self.navigation_char(c, line),
                }
            }
            KeyEvent::Key(key) => {
                self.second_tab = false;
                self.one_char = None;
                base_key(key, line, 1)
            }
        }
    }

    fn insert_char(&mut self, c: char, line: &mut Line, overwrite: bool) {
        let mut buffer = [0u8; 4];
        line.insert_text(c.encode_utf8(&mut buffer), overwrite, true);
    }

    fn navigation_char(&mut self, c: char, line: &mut Line) -> DispatchOutcome {
        // Digits build the count, even while a multi-char keystroke is
        // pending; a leading zero is the line-start motion instead.
        if (c.is_ascii_digit() && c != '0') || (c == '0' && self.arg_count.is_some()) {
            let digit = u64::from(c.to_digit(10).unwrap_or(0));
            let next = self
                .arg_count
                .unwrap_or(0)
                .saturating_mul(10)
                .saturating_add(digit);
            let next = if next >= 1_000_000 { None } else { Some(next) };
            self.set_arg_count(next, line);
            return DispatchOutcome::Continue;
        }

        self.pending.push(c);
        let exact = NAVIGATION_TABLE
            .iter()
            .find(|(key, _)| *key == self.pending.as_str())
            .map(|(_, f)| *f);
        if let Some(handler) = exact {
            let count = self.arg_count.take().map(|n| n as usize);
            self.pending.clear();
            line.set_arg_prompt("");
            trace!(target: "actions.vi", key = %c, count = ?count, "navigation_dispatch");
            return handler(self, line, count);
        }
        let is_prefix = NAVIGATION_TABLE
            .iter()
            .any(|(key, _)| key.starts_with(self.pending.as_str()));
        if !is_prefix {
            // Unknown keystroke: back to the full table, count untouched.
            self.pending.clear();
        }
        DispatchOutcome::Continue
    }

    fn run_one_char(&mut self, pending: OneChar, c: char, line: &mut Line) {
        match pending {
            OneChar::FindForward(n) => repeat(n, || line.go_to_character_in_line(c)),
            OneChar::FindBackward(n) => repeat(n, || line.go_to_character_in_line_back(c)),
            OneChar::TillForward(n) => {
                repeat(n, || line.go_to_character_in_line(c));
                line.cursor_left();
            }
            OneChar::TillBackward(n) => {
                repeat(n, || line.go_to_character_in_line_back(c));
                line.cursor_right();
            }
            OneChar::Replace(n) => {
                let mut buffer = [0u8; 4];
                let s = c.encode_utf8(&mut buffer).to_string();
                line.insert_text(&s.repeat(n), true, false);
            }
        }
    }
}

impl KeyHandler for ViHandler {
    fn dispatch(&mut self, event: KeyEvent, line: &mut Line) -> DispatchOutcome {
        let outcome = self.dispatch_inner(event, line);
        if outcome.is_terminal() {
            self.reset();
        }
        outcome
    }

    fn mode_tag(&self) -> &'static str {
        match self.mode {
            ViMode::Insert => "(INSERT)",
            ViMode::Replace => "(REPLACE)",
            ViMode::Navigation => "(NAV)",
        }
    }
}

fn count(n: Option<usize>) -> usize {
    n.unwrap_or(1).max(1)
}

// ---------------------------------------------------------------------
// Navigation handlers
// ---------------------------------------------------------------------

fn nav_space(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    repeat(count(n), || line.cursor_right());
    DispatchOutcome::Continue
}

fn nav_left(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    repeat(count(n), || line.cursor_left());
    DispatchOutcome::Continue
}

fn nav_right(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    repeat(count(n), || line.cursor_right());
    DispatchOutcome::Continue
}

fn nav_down(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    repeat(count(n), || line.auto_down());
    DispatchOutcome::Continue
}

fn nav_up(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    repeat(count(n), || line.auto_up());
    DispatchOutcome::Continue
}

fn nav_word_forward(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    word_forward(line, WordKind::Small, count(n));
    DispatchOutcome::Continue
}

fn nav_word_forward_big(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    word_forward(line, WordKind::Big, count(n));
    DispatchOutcome::Continue
}

fn nav_word_back(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    word_back(line, WordKind::Small, count(n));
    DispatchOutcome::Continue
}

fn nav_word_back_big(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    word_back(line, WordKind::Big, count(n));
    DispatchOutcome::Continue
}

fn nav_end_of_word(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    repeat(count(n), || line.cursor_to_end_of_word(WordKind::Small));
    DispatchOutcome::Continue
}

fn nav_end_of_word_big(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    repeat(count(n), || line.cursor_to_end_of_word(WordKind::Big));
    DispatchOutcome::Continue
}

fn nav_start_of_line(_h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    line.cursor_to_start_of_line(false);
    DispatchOutcome::Continue
}

fn nav_start_after_whitespace(
    _h: &mut ViHandler,
    line: &mut Line,
    _n: Option<usize>,
) -> DispatchOutcome {
    line.cursor_to_start_of_line(true);
    DispatchOutcome::Continue
}

fn nav_end_of_line(_h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    line.cursor_to_end_of_line();
    DispatchOutcome::Continue
}

fn nav_first_position(_h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    line.set_cursor_position(0);
    DispatchOutcome::Continue
}

fn nav_last_position(_h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    line.end();
    DispatchOutcome::Continue
}

fn nav_go_to_line(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    line.go_to_line(n);
    DispatchOutcome::Continue
}

fn nav_matching_bracket(_h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    line.go_to_matching_bracket();
    DispatchOutcome::Continue
}

fn nav_insert(h: &mut ViHandler, _line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    h.mode = ViMode::Insert;
    DispatchOutcome::Continue
}

fn nav_insert_at_start(h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    h.mode = ViMode::Insert;
    line.cursor_to_start_of_line(true);
    DispatchOutcome::Continue
}

fn nav_append(h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    h.mode = ViMode::Insert;
    line.cursor_right();
    DispatchOutcome::Continue
}

fn nav_append_at_end(h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    h.mode = ViMode::Insert;
    line.cursor_to_end_of_line();
    DispatchOutcome::Continue
}

fn nav_replace_mode(h: &mut ViHandler, _line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    h.mode = ViMode::Replace;
    DispatchOutcome::Continue
}

fn nav_open_below(h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    h.mode = ViMode::Insert;
    line.insert_line_below();
    DispatchOutcome::Continue
}

fn nav_open_above(h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    h.mode = ViMode::Insert;
    line.insert_line_above();
    DispatchOutcome::Continue
}

fn nav_delete_char(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    let mut removed = String::new();
    repeat(count(n), || removed.push_str(&line.delete()));
    line.set_clipboard(ClipboardData::characters(removed));
    DispatchOutcome::Continue
}

fn nav_delete_before(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    repeat(count(n), || {
        line.delete_character_before_cursor();
    });
    DispatchOutcome::Continue
}

fn nav_substitute(h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    let mut removed = String::new();
    repeat(count(n), || removed.push_str(&line.delete()));
    line.set_clipboard(ClipboardData::characters(removed));
    h.mode = ViMode::Insert;
    DispatchOutcome::Continue
}

fn nav_delete_to_end(_h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    let removed = line.delete_until_end_of_line();
    line.set_clipboard(ClipboardData::characters(removed));
    DispatchOutcome::Continue
}

fn nav_change_to_end(h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    let removed = line.delete_until_end_of_line();
    line.set_clipboard(ClipboardData::characters(removed));
    h.mode = ViMode::Insert;
    DispatchOutcome::Continue
}

fn nav_change_line(h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    line.cursor_to_start_of_line(true);
    let removed = line.delete_until_end_of_line();
    line.set_clipboard(ClipboardData::characters(removed));
    h.mode = ViMode::Insert;
    DispatchOutcome::Continue
}

fn nav_change_word(h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    delete_words_to_clipboard(line, count(n));
    h.mode = ViMode::Insert;
    DispatchOutcome::Continue
}

fn nav_delete_words(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    delete_words_to_clipboard(line, count(n));
    DispatchOutcome::Continue
}

fn nav_delete_lines(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    let mut lines = Vec::new();
    repeat(count(n), || lines.push(line.delete_current_line()));
    line.set_clipboard(ClipboardData::lines(lines.join("\n")));
    DispatchOutcome::Continue
}

fn nav_yank_lines(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    let doc = line.document();
    let row = doc.cursor_position_row();
    let lines = doc.lines();
    let end = (row + count(n)).min(lines.len());
    let text = lines[row..end].join("\n");
    line.set_clipboard(ClipboardData::lines(text));
    DispatchOutcome::Continue
}

fn nav_yank_word(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    let words = line.document().get_following_words(count(n), false).to_string();
    line.set_clipboard(ClipboardData::characters(words));
    DispatchOutcome::Continue
}

fn nav_paste_after(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    repeat(count(n), || line.paste_from_clipboard(false));
    DispatchOutcome::Continue
}

fn nav_paste_before(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    repeat(count(n), || line.paste_from_clipboard(true));
    DispatchOutcome::Continue
}

fn nav_undo(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    repeat(count(n), || line.undo());
    DispatchOutcome::Continue
}

fn nav_open_editor(_h: &mut ViHandler, _line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    DispatchOutcome::OpenEditor
}

fn nav_join_lines(_h: &mut ViHandler, line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    repeat(count(n), || line.join_next_line());
    DispatchOutcome::Continue
}

fn nav_toggle_case(_h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    if let Some(c) = line.document().current_char() {
        if c != '\n' {
            let toggled: String = if c.is_lowercase() {
                c.to_uppercase().collect()
            } else {
                c.to_lowercase().collect()
            };
            line.insert_text(&toggled, true, false);
        }
    }
    DispatchOutcome::Continue
}

fn nav_indent(_h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    line.indent();
    DispatchOutcome::Continue
}

fn nav_unindent(_h: &mut ViHandler, line: &mut Line, _n: Option<usize>) -> DispatchOutcome {
    line.unindent();
    DispatchOutcome::Continue
}

fn nav_find_forward(h: &mut ViHandler, _line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    h.one_char = Some(OneChar::FindForward(count(n)));
    DispatchOutcome::Continue
}

fn nav_find_backward(h: &mut ViHandler, _line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    h.one_char = Some(OneChar::FindBackward(count(n)));
    DispatchOutcome::Continue
}

fn nav_till_forward(h: &mut ViHandler, _line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    h.one_char = Some(OneChar::TillForward(count(n)));
    DispatchOutcome::Continue
}

fn nav_till_backward(h: &mut ViHandler, _line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    h.one_char = Some(OneChar::TillBackward(count(n)));
    DispatchOutcome::Continue
}

fn nav_replace_char(h: &mut ViHandler, _line: &mut Line, n: Option<usize>) -> DispatchOutcome {
    h.one_char = Some(OneChar::Replace(count(n)));
    DispatchOutcome::Continue
}
