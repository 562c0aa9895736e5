//! Emacs-flavor key handler.
//!
//! Alt is delivered by terminals as ESC followed by the key, so the handler
//! keeps an `escape_pressed` flag and composes the next event into an
//! explicit [`Composed`] variant; ctrl_x chords work the same way. The
//! numeric argument accumulates through Alt+digits (Alt+`-` starts a
//! negative count) and repeats the operations that honor it.

use crate::common::{
    arg_count_append, base_key, delete_words_to_clipboard, handle_enter, handle_isearch_event,
    handle_tab, word_back, word_forward,
};
use crate::{DispatchOutcome, KeyHandler};
use core_events::{Key, KeyEvent};
use core_state::{Line, WordKind};
use tracing::trace;

/// A key event with its prefix composition resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Composed {
    Plain(KeyEvent),
    Alt(KeyEvent),
    CtrlX(KeyEvent),
}

#[derive(Debug, Default)]
pub struct EmacsHandler {
    escape_pressed: bool,
    ctrl_x_pressed: bool,
    arg_count: Option<i64>,
    second_tab: bool,
}

impl EmacsHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.escape_pressed = false;
        self.ctrl_x_pressed = false;
        self.arg_count = None;
        self.second_tab = false;
    }

    fn arg(&self) -> usize {
        match self.arg_count {
            Some(n) if n > 0 => n as usize,
            _ => 1,
        }
    }

    fn set_arg_count(&mut self, value: Option<i64>, line: &mut Line) {
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

        // Resolve the prefix state into a composed event.
        let composed = if self.escape_pressed {
            self.escape_pressed = false;
            // Alt+digit accumulates the numeric argument instead of
            // dispatching.
            if let KeyEvent::Char(c) = event {
                if c.is_ascii_digit() || (c == '-' && self.arg_count.is_none()) {
                    let next = arg_count_append(self.arg_count, c);
                    self.set_arg_count(next, line);
                    return DispatchOutcome::Continue;
                }
            }
            Composed::Alt(event)
        } else if self.ctrl_x_pressed {
            self.ctrl_x_pressed = false;
            Composed::CtrlX(event)
        } else {
            Composed::Plain(event)
        };

        let reset_arg = !matches!(composed, Composed::Plain(KeyEvent::Key(Key::Escape)));
        let outcome = self.dispatch_composed(composed, line);
        if reset_arg {
            self.set_arg_count(None, line);
        }
        if !matches!(composed, Composed::Plain(e) if e.is_tab()) {
            self.second_tab = false;
        }
        outcome
    }

    fn dispatch_composed(&mut self, composed: Composed, line: &mut Line) -> DispatchOutcome {
        trace!(target: "actions.emacs", event = ?composed, "dispatch");
        match composed {
            Composed::Plain(event) => self.plain(event, line),
            Composed::Alt(event) => self.alt(event, line),
            Composed::CtrlX(event) => self.ctrl_x(event, line),
        }
    }

    fn plain(&mut self, event: KeyEvent, line: &mut Line) -> DispatchOutcome {
        match event {
            KeyEvent::Key(Key::Escape) => {
                self.escape_pressed = true;
                DispatchOutcome::Continue
            }
            KeyEvent::Key(Key::Ctrl('x')) => {
                self.ctrl_x_pressed = true;
                DispatchOutcome::Continue
            }
            e if e.is_enter() => {
                line.run_enter_hook();
                handle_enter(line, false)
            }
            e if e.is_tab() => handle_tab(&mut self.second_tab, line),
            KeyEvent::Key(Key::CtrlUnderscore) => {
                line.undo();
                DispatchOutcome::Continue
            }
            KeyEvent::Char(c) => {
                let mut buffer = [0u8; 4];
                let s: &str = c.encode_utf8(&mut buffer);
                for _ in 0..self.arg() {
                    line.insert_text(s, false, true);
                }
                DispatchOutcome::Continue
            }
            KeyEvent::Key(key) => base_key(key, line, self.arg()),
        }
    }

    fn alt(&mut self, event: KeyEvent, line: &mut Line) -> DispatchOutcome {
        match event {
            // ESC-enter always accepts, even in multiline mode.
            e if e.is_enter() => handle_enter(line, true),
            KeyEvent::Char('b') => {
                word_back(line, WordKind::Big, self.arg());
                DispatchOutcome::Continue
            }
            KeyEvent::Char('f') => {
                word_forward(line, WordKind::Big, self.arg());
                DispatchOutcome::Continue
            }
            KeyEvent::Char('d') => {
                delete_words_to_clipboard(line, self.arg());
                DispatchOutcome::Continue
            }
            KeyEvent::Char('c') => {
                self.transform_following_words(line, py_capitalize);
                DispatchOutcome::Continue
            }
            KeyEvent::Char('l') => {
                self.transform_following_words(line, |w| w.to_lowercase());
                DispatchOutcome::Continue
            }
            KeyEvent::Char('u') => {
                self.transform_following_words(line, |w| w.to_uppercase());
                DispatchOutcome::Continue
            }
            _ => DispatchOutcome::Continue,
        }
    }

    fn ctrl_x(&mut self, event: KeyEvent, line: &mut Line) -> DispatchOutcome {
        match event {
            KeyEvent::Key(Key::Ctrl('e')) => DispatchOutcome::OpenEditor,
            KeyEvent::Key(Key::Ctrl('u')) => {
                line.undo();
                DispatchOutcome::Continue
            }
            KeyEvent::Key(Key::Ctrl('x')) => {
                // Bounce between the ends of the current line.
                let current = line.document().current_char();
                match current {
                    Some('\n') | None => line.cursor_to_start_of_line(false),
                    Some(_) => line.cursor_to_end_of_line(),
                }
                DispatchOutcome::Continue
            }
            _ => DispatchOutcome::Continue,
        }
    }

    /// Overwrite the next words with a transformed copy (alt_c/l/u).
    fn transform_following_words(&self, line: &mut Line, f: impl Fn(&str) -> String) {
        let words = line.document().get_following_words(self.arg(), true).to_string();
        if !words.is_empty() {
            line.insert_text(&f(&words), true, false);
        }
    }
}

/// Python-style capitalize: first scalar uppercased, the rest lowered.
fn py_capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

impl KeyHandler for EmacsHandler {
    fn dispatch(&mut self, event: KeyEvent, line: &mut Line) -> DispatchOutcome {
        let outcome = self.dispatch_inner(event, line);
        if outcome.is_terminal() {
            self.reset();
        }
        outcome
    }

    fn mode_tag(&self) -> &'static str {
        "(emacs)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_state::MemoryHistory;
    use core_syntax::PlainCode;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn line() -> Line {
        Line::new(
            Rc::new(RefCell::new(MemoryHistory::new())),
            Rc::new(PlainCode),
        )
    }

    fn line_with_history(entries: &[&str]) -> Line {
        Line::new(
            Rc::new(RefCell::new(MemoryHistory::with_entries(
                entries.iter().copied(),
            ))),
            Rc::new(PlainCode),
        )
    }

    fn feed(handler: &mut EmacsHandler, line: &mut Line, events: &[KeyEvent]) -> DispatchOutcome {
        let mut last = DispatchOutcome::Continue;
        for &e in events {
            last = handler.dispatch(e, line);
        }
        last
    }

    fn chars(s: &str) -> Vec<KeyEvent> {
        s.chars().map(KeyEvent::Char).collect()
    }

    #[test]
    fn typed_chars_then_undo_restores_empty() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        let mut events = chars("hello");
        events.push(KeyEvent::Key(Key::CtrlUnderscore));
        feed(&mut h, &mut l, &events);
        assert_eq!(l.text(), "");
        assert_eq!(l.cursor_position(), 0);
    }

    #[test]
    fn enter_accepts_single_line() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        feed(&mut h, &mut l, &chars("ok"));
        let outcome = h.dispatch(KeyEvent::ctrl('j'), &mut l);
        assert_eq!(outcome, DispatchOutcome::Accept("ok".into()));
    }

    #[test]
    fn enter_inserts_newline_in_multiline() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        l.multiline = true;
        feed(&mut h, &mut l, &chars("ab"));
        assert_eq!(h.dispatch(KeyEvent::ctrl('j'), &mut l), DispatchOutcome::Continue);
        assert_eq!(l.text(), "ab\n");
        // ESC-enter still accepts.
        let outcome = feed(
            &mut h,
            &mut l,
            &[KeyEvent::Key(Key::Escape), KeyEvent::ctrl('j')],
        );
        assert_eq!(outcome, DispatchOutcome::Accept("ab\n".into()));
    }

    #[test]
    fn alt_digit_repeats_insert() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        feed(
            &mut h,
            &mut l,
            &[
                KeyEvent::Key(Key::Escape),
                KeyEvent::Char('4'),
                KeyEvent::Char('x'),
            ],
        );
        assert_eq!(l.text(), "xxxx");
    }

    #[test]
    fn arg_count_resets_after_use() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        feed(
            &mut h,
            &mut l,
            &[
                KeyEvent::Key(Key::Escape),
                KeyEvent::Char('2'),
                KeyEvent::Char('a'),
                KeyEvent::Char('b'),
            ],
        );
        assert_eq!(l.text(), "aab");
        assert_eq!(l.arg_prompt_text(), "");
    }

    #[test]
    fn alt_b_and_f_move_by_words() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        feed(&mut h, &mut l, &chars("one two three"));
        feed(&mut h, &mut l, &[KeyEvent::Key(Key::Escape), KeyEvent::Char('b')]);
        assert_eq!(l.cursor_position(), 8);
        feed(&mut h, &mut l, &[KeyEvent::Key(Key::Escape), KeyEvent::Char('b')]);
        assert_eq!(l.cursor_position(), 4);
        feed(&mut h, &mut l, &[KeyEvent::Key(Key::Escape), KeyEvent::Char('f')]);
        assert_eq!(l.cursor_position(), 8);
    }

    #[test]
    fn alt_d_kills_word_to_clipboard_and_ctrl_y_pastes() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        feed(&mut h, &mut l, &chars("one two"));
        feed(&mut h, &mut l, &[KeyEvent::ctrl('a')]);
        feed(&mut h, &mut l, &[KeyEvent::Key(Key::Escape), KeyEvent::Char('d')]);
        assert_eq!(l.text(), "two");
        assert_eq!(l.clipboard().unwrap().text, "one ");
        feed(&mut h, &mut l, &[KeyEvent::ctrl('e'), KeyEvent::ctrl('y')]);
        assert_eq!(l.text(), "twoone ");
    }

    #[test]
    fn kill_to_end_of_line() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        feed(&mut h, &mut l, &chars("hello world"));
        feed(&mut h, &mut l, &[KeyEvent::ctrl('a'), KeyEvent::ctrl('k')]);
        assert_eq!(l.text(), "");
        assert_eq!(l.clipboard().unwrap().text, "hello world");
    }

    #[test]
    fn case_transforms() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        feed(&mut h, &mut l, &chars("word here"));
        feed(&mut h, &mut l, &[KeyEvent::ctrl('a')]);
        feed(&mut h, &mut l, &[KeyEvent::Key(Key::Escape), KeyEvent::Char('u')]);
        assert_eq!(l.text(), "WORD here");
        feed(&mut h, &mut l, &[KeyEvent::ctrl('a')]);
        feed(&mut h, &mut l, &[KeyEvent::Key(Key::Escape), KeyEvent::Char('c')]);
        assert_eq!(l.text(), "Word here");
    }

    #[test]
    fn ctrl_d_exits_only_when_empty() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        assert_eq!(h.dispatch(KeyEvent::ctrl('d'), &mut l), DispatchOutcome::Exit);
        feed(&mut h, &mut l, &chars("ab"));
        feed(&mut h, &mut l, &[KeyEvent::ctrl('a')]);
        assert_eq!(h.dispatch(KeyEvent::ctrl('d'), &mut l), DispatchOutcome::Continue);
        assert_eq!(l.text(), "b");
    }

    #[test]
    fn ctrl_c_aborts() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        assert_eq!(h.dispatch(KeyEvent::ctrl('c'), &mut l), DispatchOutcome::Abort);
    }

    #[test]
    fn ctrl_x_chords() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        feed(&mut h, &mut l, &chars("abc"));
        let outcome = feed(&mut h, &mut l, &[KeyEvent::ctrl('x'), KeyEvent::ctrl('e')]);
        assert_eq!(outcome, DispatchOutcome::OpenEditor);
        feed(&mut h, &mut l, &[KeyEvent::ctrl('x'), KeyEvent::ctrl('u')]);
        assert_eq!(l.text(), "");
    }

    #[test]
    fn ctrl_x_ctrl_x_bounces_line_ends() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        feed(&mut h, &mut l, &chars("abc"));
        feed(&mut h, &mut l, &[KeyEvent::ctrl('x'), KeyEvent::ctrl('x')]);
        assert_eq!(l.cursor_position(), 0);
        feed(&mut h, &mut l, &[KeyEvent::ctrl('x'), KeyEvent::ctrl('x')]);
        assert_eq!(l.cursor_position(), 3);
    }

    #[test]
    fn history_prefix_scenario() {
        // Listed newest-last: "alpha" is the most recent matching entry.
        let mut h = EmacsHandler::new();
        let mut l = line_with_history(&["algol", "beta", "alpha"]);
        feed(&mut h, &mut l, &chars("al"));
        feed(
            &mut h,
            &mut l,
            &[KeyEvent::ctrl('p'), KeyEvent::ctrl('p'), KeyEvent::ctrl('n')],
        );
        assert_eq!(l.text(), "alpha");
    }

    #[test]
    fn isearch_cancel_scenario() {
        let mut h = EmacsHandler::new();
        let mut l = line_with_history(&["banana", "apple"]);
        feed(&mut h, &mut l, &chars("hello"));
        feed(
            &mut h,
            &mut l,
            &[KeyEvent::ctrl('r'), KeyEvent::Char('a'), KeyEvent::ctrl('g')],
        );
        assert_eq!(l.text(), "hello");
        assert_eq!(l.cursor_position(), 5);
        assert!(!l.in_isearch());
    }

    #[test]
    fn isearch_accepts_on_other_key() {
        let mut h = EmacsHandler::new();
        let mut l = line_with_history(&["banana"]);
        feed(&mut h, &mut l, &[KeyEvent::ctrl('r'), KeyEvent::Char('n')]);
        assert_eq!(l.text(), "banana");
        // ctrl_e is not an isearch key: it accepts the match, then runs.
        feed(&mut h, &mut l, &[KeyEvent::ctrl('e')]);
        assert!(!l.in_isearch());
        assert_eq!(l.text(), "banana");
    }

    #[test]
    fn transpose_chars() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        feed(&mut h, &mut l, &chars("ab"));
        feed(&mut h, &mut l, &[KeyEvent::ctrl('t')]);
        assert_eq!(l.text(), "ba");
    }

    #[test]
    fn clear_screen_outcome() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        feed(&mut h, &mut l, &chars("keep"));
        assert_eq!(h.dispatch(KeyEvent::ctrl('l'), &mut l), DispatchOutcome::ClearScreen);
        assert_eq!(l.text(), "keep");
    }

    #[test]
    fn f7_toggles_multiline_and_f6_paste_mode() {
        let mut h = EmacsHandler::new();
        let mut l = line();
        h.dispatch(KeyEvent::Key(Key::F(7)), &mut l);
        assert!(l.multiline);
        h.dispatch(KeyEvent::Key(Key::F(6)), &mut l);
        assert!(l.paste_mode && l.multiline);
        h.dispatch(KeyEvent::Key(Key::F(6)), &mut l);
        assert!(!l.paste_mode);
    }

    #[test]
    fn py_capitalize_matches_python() {
        assert_eq!(py_capitalize("wORD"), "Word");
        assert_eq!(py_capitalize(""), "");
    }
}
