//! Bindings shared by both keybinding flavors.

use crate::DispatchOutcome;
use core_events::{Key, KeyEvent};
use core_state::{ClipboardData, Line, WordKind};

/// Route events while incremental search is active. Printable characters
/// extend the pattern, a small set of keys edits or leaves the search, and
/// every other key first accepts the current match and then dispatches
/// normally (signalled by returning `None`).
pub(crate) fn handle_isearch_event(event: KeyEvent, line: &mut Line) -> Option<DispatchOutcome> {
    if !line.in_isearch() {
        return None;
    }
    match event {
        KeyEvent::Char(c) => {
            line.isearch_append(c);
            Some(DispatchOutcome::Continue)
        }
        KeyEvent::Key(Key::Ctrl('r')) => {
            line.reverse_search();
            Some(DispatchOutcome::Continue)
        }
        KeyEvent::Key(Key::Ctrl('s')) => {
            line.forward_search();
            Some(DispatchOutcome::Continue)
        }
        KeyEvent::Key(Key::Ctrl('g')) => {
            line.exit_isearch(true);
            Some(DispatchOutcome::Continue)
        }
        KeyEvent::Key(Key::Backspace | Key::Ctrl('h')) => {
            line.isearch_backspace();
            Some(DispatchOutcome::Continue)
        }
        _ => {
            line.exit_isearch(false);
            None
        }
    }
}

/// The named-key bindings common to emacs and vi. `arg` is the numeric
/// repeat for the operations that honor it; enter and tab are intercepted
/// by the flavor-specific handlers before reaching this table.
pub(crate) fn base_key(key: Key, line: &mut Line, arg: usize) -> DispatchOutcome {
    let arg = arg.max(1);
    match key {
        Key::Home => line.home(),
        Key::End => line.end(),
        Key::Ctrl('a') => line.cursor_to_start_of_line(false),
        Key::Ctrl('b') | Key::Left => repeat(arg, || line.cursor_left()),
        Key::Ctrl('c') => return DispatchOutcome::Abort,
        Key::Ctrl('d') => {
            // EOF only on an empty line; otherwise forward delete.
            if line.text().is_empty() {
                return DispatchOutcome::Exit;
            }
            repeat(arg, || {
                line.delete();
            });
        }
        Key::Ctrl('e') => line.cursor_to_end_of_line(),
        Key::Ctrl('f') | Key::Right => repeat(arg, || line.cursor_right()),
        Key::Ctrl('g') => line.exit_isearch(true),
        Key::Ctrl('h') | Key::Backspace => repeat(arg, || {
            line.delete_character_before_cursor();
        }),
        Key::Ctrl('k') => {
            let removed = line.delete_until_end_of_line();
            line.set_clipboard(ClipboardData::characters(removed));
        }
        Key::Ctrl('l') => return DispatchOutcome::ClearScreen,
        Key::Ctrl('n') => line.history_forward(),
        Key::Ctrl('p') => line.history_backward(),
        Key::Ctrl('r') => line.reverse_search(),
        Key::Ctrl('s') => line.forward_search(),
        Key::Ctrl('t') => line.swap_characters_before_cursor(),
        Key::Ctrl('u') => {
            line.delete_from_start_of_line();
        }
        Key::Ctrl('w') => repeat(arg, || {
            line.delete_word_before_cursor();
        }),
        Key::Ctrl('y') => line.paste_from_clipboard(false),
        Key::PageUp => line.history_backward(),
        Key::PageDown => line.history_forward(),
        Key::Up => line.auto_up(),
        Key::Down => line.auto_down(),
        Key::Delete => repeat(arg, || {
            line.delete();
        }),
        Key::F(6) => {
            line.paste_mode = !line.paste_mode;
            if line.paste_mode {
                line.multiline = true;
            }
        }
        Key::F(7) => line.multiline = !line.multiline,
        _ => {}
    }
    DispatchOutcome::Continue
}

pub(crate) fn repeat(n: usize, mut op: impl FnMut()) {
    for _ in 0..n {
        op();
    }
}

/// Tab: first press completes (entering the cycling state when there are
/// several candidates), the second lists, further presses cycle.
pub(crate) fn handle_tab(second_tab: &mut bool, line: &mut Line) -> DispatchOutcome {
    if *second_tab {
        *second_tab = false;
        match line.completion_candidates() {
            Some(candidates) => DispatchOutcome::ListCompletions(candidates),
            None => DispatchOutcome::Continue,
        }
    } else {
        *second_tab = !line.complete();
        DispatchOutcome::Continue
    }
}

/// Enter with the multiline rules: insert a newline or accept. The caller
/// runs the host enter hook first where it applies; Vi navigation mode and
/// ESC-enter force acceptance.
pub(crate) fn handle_enter(line: &mut Line, force_accept: bool) -> DispatchOutcome {
    if line.multiline && !force_accept {
        line.newline();
        DispatchOutcome::Continue
    } else {
        DispatchOutcome::Accept(line.text().to_string())
    }
}

/// Append a typed digit (or a leading `-`) to the numeric argument,
/// readline-style: the digits concatenate as text and the count resets
/// once it reaches a million.
pub(crate) fn arg_count_append(current: Option<i64>, digit: char) -> Option<i64> {
    let value = match current {
        None if digit == '-' => -1,
        None => i64::from(digit.to_digit(10)?),
        Some(c) => format!("{c}{digit}").parse().ok()?,
    };
    if value >= 1_000_000 { None } else { Some(value) }
}

pub(crate) fn delete_words_to_clipboard(line: &mut Line, arg: usize) -> String {
    let mut removed = String::new();
    for _ in 0..arg.max(1) {
        removed.push_str(&line.delete_word());
    }
    line.set_clipboard(ClipboardData::characters(removed.clone()));
    removed
}

/// Word movement used by both flavors.
pub(crate) fn word_forward(line: &mut Line, kind: WordKind, arg: usize) {
    repeat(arg.max(1), || line.cursor_word_forward(kind));
}

pub(crate) fn word_back(line: &mut Line, kind: WordKind, arg: usize) {
    repeat(arg.max(1), || line.cursor_word_back(kind));
}
