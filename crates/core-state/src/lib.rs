//! Mutable editing state for one prompt.
//!
//! A [`Line`] lives for exactly one `read_input` call: text and cursor, the
//! undo stack, the clipboard, history navigation, incremental search and
//! completion state. Key handlers mutate it through the operations below
//! and never touch the fields directly; every operation clamps instead of
//! panicking, so `0 <= cursor_position <= text.len()` holds at all times.

use core_syntax::{CodeAdapter, Completion, IsearchDisplay};
use core_text::Document;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{trace, warn};

pub mod history;

pub use core_text::WordKind;
pub use history::{FileHistory, History, MemoryHistory};

/// Maximum number of undo snapshots retained.
pub const UNDO_DEPTH_MAX: usize = 200;

/// What a clipboard payload represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardKind {
    Characters,
    Lines,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardData {
    pub text: String,
    pub kind: ClipboardKind,
}

impl ClipboardData {
    pub fn characters(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ClipboardKind::Characters,
        }
    }

    pub fn lines(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ClipboardKind::Lines,
        }
    }
}

#[derive(Debug, Clone)]
struct IsearchState {
    forward: bool,
    pattern: String,
    match_index: Option<usize>,
    original_text: String,
    original_cursor: usize,
}

#[derive(Debug, Clone)]
struct CompletionState {
    candidates: Vec<Completion>,
    index: usize,
    original_text: String,
    original_cursor: usize,
}

/// Decides whether accepting input should instead insert a newline; the
/// host installs this to make `enter` language-aware (open brackets,
/// trailing colon or backslash).
pub type EnterHook = Box<dyn FnMut(&Document<'_>) -> bool>;

/// The edit buffer.
pub struct Line {
    text: String,
    cursor_position: usize,
    undo_stack: Vec<(String, usize)>,
    last_edit_was_insert: bool,
    clipboard: Option<ClipboardData>,
    history: Rc<RefCell<dyn History>>,
    history_index: Option<usize>,
    history_prefix: Option<String>,
    history_original: Option<(String, usize)>,
    isearch: Option<IsearchState>,
    completion: Option<CompletionState>,
    arg_prompt_text: String,
    code: Rc<dyn CodeAdapter>,
    enter_hook: Option<EnterHook>,
    /// Enter inserts a newline instead of accepting.
    pub multiline: bool,
    /// Suppress auto-indentation while pasting.
    pub paste_mode: bool,
    /// Copy indentation (and extend after a trailing colon) on newline.
    pub auto_indent: bool,
}

impl Line {
    pub fn new(history: Rc<RefCell<dyn History>>, code: Rc<dyn CodeAdapter>) -> Self {
        Self {
            text: String::new(),
            cursor_position: 0,
            undo_stack: Vec::new(),
            last_edit_was_insert: false,
            clipboard: None,
            history,
            history_index: None,
            history_prefix: None,
            history_original: None,
            isearch: None,
            completion: None,
            arg_prompt_text: String::new(),
            code,
            enter_hook: None,
            multiline: false,
            paste_mode: false,
            auto_indent: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor_position(&self) -> usize {
        self.cursor_position
    }

    pub fn document(&self) -> Document<'_> {
        Document::new(&self.text, self.cursor_position)
    }

    pub fn set_enter_hook(&mut self, hook: EnterHook) {
        self.enter_hook = Some(hook);
    }

    /// Run the host's enter hook; a `true` result enables multiline so the
    /// pending enter inserts a newline instead of accepting.
    pub fn run_enter_hook(&mut self) {
        if let Some(mut hook) = self.enter_hook.take() {
            if hook(&self.document()) {
                self.multiline = true;
            }
            self.enter_hook = Some(hook);
        }
    }

    // ------------------------------------------------------------------
    // Undo
    // ------------------------------------------------------------------

    fn save_to_undo_stack(&mut self) {
        if self
            .undo_stack
            .last()
            .is_some_and(|(text, cp)| *text == self.text && *cp == self.cursor_position)
        {
            return;
        }
        self.undo_stack
            .push((self.text.clone(), self.cursor_position));
        if self.undo_stack.len() > UNDO_DEPTH_MAX {
            self.undo_stack.remove(0);
        }
        trace!(target: "state.undo", depth = self.undo_stack.len(), "push_snapshot");
    }

    /// Restore the most recent snapshot whose text differs from the
    /// current buffer.
    pub fn undo(&mut self) {
        while let Some((text, cursor)) = self.undo_stack.pop() {
            if text != self.text {
                trace!(target: "state.undo", depth = self.undo_stack.len(), "undo_pop");
                self.text = text;
                self.cursor_position = cursor;
                break;
            }
        }
        self.note_non_insert_op();
    }

    /// Invalidation shared by every non-coalescing operation.
    fn note_non_insert_op(&mut self) {
        self.last_edit_was_insert = false;
        self.completion = None;
        self.isearch = None;
    }

    fn reset_history_nav(&mut self) {
        self.history_index = None;
        self.history_prefix = None;
        self.history_original = None;
    }

    // ------------------------------------------------------------------
    // Insertion and deletion
    // ------------------------------------------------------------------

    /// Insert `data` at the cursor. With `overwrite`, replace an equal
    /// number of scalars after the cursor (clipped to the end of text).
    /// With `coalesce`, consecutive insertions share one undo snapshot.
    pub fn insert_text(&mut self, data: &str, overwrite: bool, coalesce: bool) {
        if data.is_empty() {
            return;
        }
        if !(coalesce && self.last_edit_was_insert) {
            self.save_to_undo_stack();
        }
        if overwrite {
            let mut end = self.cursor_position;
            for c in self.text[self.cursor_position..]
                .chars()
                .take(data.chars().count())
            {
                end += c.len_utf8();
            }
            self.text.replace_range(self.cursor_position..end, data);
        } else {
            self.text.insert_str(self.cursor_position, data);
        }
        self.cursor_position += data.len();
        self.completion = None;
        self.isearch = None;
        self.reset_history_nav();
        self.last_edit_was_insert = coalesce;
    }

    fn remove_range(&mut self, start: usize, end: usize) -> String {
        let removed = self.text[start..end].to_string();
        if !removed.is_empty() {
            self.save_to_undo_stack();
            self.text.replace_range(start..end, "");
        }
        removed
    }

    /// Delete the scalar under the cursor, returning it.
    pub fn delete(&mut self) -> String {
        let current = self.document().current_char();
        let removed = match current {
            Some(c) => self.remove_range(self.cursor_position, self.cursor_position + c.len_utf8()),
            None => String::new(),
        };
        self.after_delete();
        removed
    }

    pub fn delete_character_before_cursor(&mut self) -> String {
        let previous = self.document().char_before_cursor();
        let removed = match previous {
            Some(c) => {
                let start = self.cursor_position - c.len_utf8();
                let removed = self.remove_range(start, self.cursor_position);
                self.cursor_position = start;
                removed
            }
            None => String::new(),
        };
        self.after_delete();
        removed
    }

    /// Delete from the cursor to the start of the next word (or to the end
    /// of text when no word follows).
    pub fn delete_word(&mut self) -> String {
        let end = self
            .document()
            .find_next_word_beginning(WordKind::Big)
            .unwrap_or(self.text.len());
        let removed = self.remove_range(self.cursor_position, end);
        self.after_delete();
        removed
    }

    pub fn delete_word_before_cursor(&mut self) -> String {
        let start = self
            .document()
            .find_previous_word_beginning(WordKind::Big)
            .unwrap_or(0);
        let removed = self.remove_range(start, self.cursor_position);
        self.cursor_position = start;
        self.after_delete();
        removed
    }

    pub fn delete_until_end_of_line(&mut self) -> String {
        let end = self.cursor_position + self.document().current_line_after_cursor().len();
        let removed = self.remove_range(self.cursor_position, end);
        self.after_delete();
        removed
    }

    pub fn delete_from_start_of_line(&mut self) -> String {
        let start = self.cursor_position - self.document().current_line_before_cursor().len();
        let removed = self.remove_range(start, self.cursor_position);
        self.cursor_position = start;
        self.after_delete();
        removed
    }

    /// Delete the whole current line including its newline; the cursor
    /// lands where the next line begins, so repeating consumes successive
    /// lines.
    pub fn delete_current_line(&mut self) -> String {
        let doc = self.document();
        let start = self.cursor_position - doc.current_line_before_cursor().len();
        let end = self.cursor_position + doc.current_line_after_cursor().len();
        let removed;
        if end < self.text.len() {
            removed = self.remove_range(start, end + 1);
            self.cursor_position = start;
        } else if start > 0 {
            removed = self.remove_range(start - 1, end);
            self.cursor_position = self.text[..start - 1].rfind('\n').map_or(0, |i| i + 1);
        } else {
            removed = self.remove_range(start, end);
            self.cursor_position = 0;
        }
        let removed = removed.trim_start_matches('\n').trim_end_matches('\n').to_string();
        self.after_delete();
        removed
    }

    fn after_delete(&mut self) {
        self.note_non_insert_op();
        self.reset_history_nav();
    }

    /// Exchange the two scalars before the cursor.
    pub fn swap_characters_before_cursor(&mut self) {
        let mut rev = self.text[..self.cursor_position].chars().rev();
        let (Some(b), Some(a)) = (rev.next(), rev.next()) else {
            return;
        };
        self.save_to_undo_stack();
        let start = self.cursor_position - a.len_utf8() - b.len_utf8();
        let mut swapped = String::with_capacity(a.len_utf8() + b.len_utf8());
        swapped.push(b);
        swapped.push(a);
        self.text
            .replace_range(start..self.cursor_position, &swapped);
        self.note_non_insert_op();
        self.reset_history_nav();
    }

    /// Reset text and cursor; history is untouched.
    pub fn clear(&mut self) {
        self.save_to_undo_stack();
        self.text.clear();
        self.cursor_position = 0;
        self.after_delete();
    }

    /// Replace the whole buffer (external editor round-trip).
    pub fn set_text(&mut self, text: String) {
        self.save_to_undo_stack();
        self.cursor_position = text.len();
        self.text = text;
        self.after_delete();
    }

    /// Insert a newline, applying auto-indentation when enabled and the
    /// cursor is at the end of its line: copy the indentation of the line
    /// just left and extend by four spaces after a trailing colon.
    pub fn newline(&mut self) {
        let mut inserted = String::from("\n");
        if self.auto_indent && !self.paste_mode {
            let doc = self.document();
            if doc.current_line_after_cursor().is_empty() {
                let before = doc.current_line_before_cursor().trim_end();
                let pad: String = before.chars().take_while(|c| c.is_whitespace()).collect();
                inserted.push_str(&pad);
                if before.ends_with(':') {
                    inserted.push_str("    ");
                }
            }
        }
        self.insert_text(&inserted, false, false);
    }

    /// Join the current line with the next one, collapsing the newline and
    /// the next line's indentation into a single space.
    pub fn join_next_line(&mut self) {
        let doc = self.document();
        let line_end = self.cursor_position + doc.current_line_after_cursor().len();
        if line_end >= self.text.len() {
            return;
        }
        let mut end = line_end + 1;
        for c in self.text[end..].chars() {
            if c == ' ' || c == '\t' {
                end += c.len_utf8();
            } else {
                break;
            }
        }
        self.save_to_undo_stack();
        self.text.replace_range(line_end..end, " ");
        self.after_delete();
    }

    /// Indent the current line by four spaces (Vi `>>`).
    pub fn indent(&mut self) {
        let start = self.cursor_position - self.document().current_line_before_cursor().len();
        self.save_to_undo_stack();
        self.text.insert_str(start, "    ");
        self.cursor_position += 4;
        self.after_delete();
    }

    /// Remove up to four leading spaces from the current line (Vi `<<`).
    pub fn unindent(&mut self) {
        let start = self.cursor_position - self.document().current_line_before_cursor().len();
        let n = self.text[start..]
            .chars()
            .take(4)
            .take_while(|c| *c == ' ')
            .count();
        if n == 0 {
            return;
        }
        self.save_to_undo_stack();
        self.text.replace_range(start..start + n, "");
        self.cursor_position = self.cursor_position.saturating_sub(n).max(start);
        self.after_delete();
    }

    /// Open an empty line above the current one and move onto it.
    pub fn insert_line_above(&mut self) {
        let doc = self.document();
        let start = self.cursor_position - doc.current_line_before_cursor().len();
        let pad = if self.auto_indent {
            doc.leading_whitespace_in_current_line().to_string()
        } else {
            String::new()
        };
        self.save_to_undo_stack();
        self.text.insert_str(start, &format!("{pad}\n"));
        self.cursor_position = start + pad.len();
        self.after_delete();
    }

    /// Open an empty line below the current one and move onto it.
    pub fn insert_line_below(&mut self) {
        let doc = self.document();
        let end = self.cursor_position + doc.current_line_after_cursor().len();
        let pad = if self.auto_indent {
            doc.leading_whitespace_in_current_line().to_string()
        } else {
            String::new()
        };
        self.save_to_undo_stack();
        self.text.insert_str(end, &format!("\n{pad}"));
        self.cursor_position = end + 1 + pad.len();
        self.after_delete();
    }

    // ------------------------------------------------------------------
    // Cursor movement
    // ------------------------------------------------------------------

    fn move_cursor_to(&mut self, position: usize) {
        self.cursor_position = position.min(self.text.len());
        while self.cursor_position > 0 && !self.text.is_char_boundary(self.cursor_position) {
            self.cursor_position -= 1;
        }
        self.last_edit_was_insert = false;
        self.completion = None;
    }

    pub fn cursor_left(&mut self) {
        if let Some(c) = self.document().char_before_cursor() {
            self.move_cursor_to(self.cursor_position - c.len_utf8());
        }
    }

    pub fn cursor_right(&mut self) {
        if let Some(c) = self.document().current_char() {
            self.move_cursor_to(self.cursor_position + c.len_utf8());
        }
    }

    /// Move one row up keeping the column.
    pub fn cursor_up(&mut self) {
        let doc = self.document();
        let row = doc.cursor_position_row();
        if row > 0 {
            let target = doc.translate_row_col_to_index(row - 1, doc.cursor_position_col());
            self.move_cursor_to(target);
        }
    }

    pub fn cursor_down(&mut self) {
        let doc = self.document();
        let row = doc.cursor_position_row();
        if row + 1 < doc.line_count() {
            let target = doc.translate_row_col_to_index(row + 1, doc.cursor_position_col());
            self.move_cursor_to(target);
        }
    }

    /// Geometric movement in a multi-line buffer, history otherwise.
    pub fn auto_up(&mut self) {
        if self.document().line_count() > 1 {
            self.cursor_up();
        } else {
            self.history_backward();
        }
    }

    pub fn auto_down(&mut self) {
        if self.document().line_count() > 1 {
            self.cursor_down();
        } else {
            self.history_forward();
        }
    }

    pub fn cursor_word_forward(&mut self, kind: WordKind) {
        if let Some(pos) = self.document().find_next_word_beginning(kind) {
            self.move_cursor_to(pos);
        }
    }

    pub fn cursor_word_back(&mut self, kind: WordKind) {
        if let Some(pos) = self.document().find_previous_word_beginning(kind) {
            self.move_cursor_to(pos);
        }
    }

    /// Move onto the last scalar of the current (or next) word.
    pub fn cursor_to_end_of_word(&mut self, kind: WordKind) {
        if let Some(end) = self.document().find_next_word_ending(kind) {
            if let Some(c) = self.text[..end].chars().next_back() {
                self.move_cursor_to(end - c.len_utf8());
            }
        }
    }

    pub fn cursor_to_start_of_line(&mut self, after_whitespace: bool) {
        let doc = self.document();
        let mut target = self.cursor_position - doc.current_line_before_cursor().len();
        if after_whitespace {
            target += doc.leading_whitespace_in_current_line().len();
        }
        self.move_cursor_to(target);
    }

    pub fn cursor_to_end_of_line(&mut self) {
        let target = self.cursor_position + self.document().current_line_after_cursor().len();
        self.move_cursor_to(target);
    }

    pub fn home(&mut self) {
        self.move_cursor_to(0);
    }

    pub fn end(&mut self) {
        self.move_cursor_to(self.text.len());
    }

    /// Absolute cursor placement (Vi `H`/`L`), clamped.
    pub fn set_cursor_position(&mut self, position: usize) {
        self.move_cursor_to(position);
    }

    /// Move onto the first non-blank of the 1-based `line` (Vi `G`);
    /// `None` selects the last line.
    pub fn go_to_line(&mut self, line: Option<usize>) {
        let doc = self.document();
        let row = match line {
            Some(n) => n.saturating_sub(1).min(doc.line_count() - 1),
            None => doc.line_count() - 1,
        };
        let target = doc.translate_row_col_to_index(row, 0);
        self.move_cursor_to(target);
        self.cursor_to_start_of_line(true);
    }

    pub fn go_to_matching_bracket(&mut self) {
        if let Some(pos) = self.document().find_matching_bracket() {
            self.move_cursor_to(pos);
        }
    }

    pub fn go_to_character_in_line(&mut self, ch: char) {
        if let Some(pos) = self.document().find_char_in_line(ch) {
            self.move_cursor_to(pos);
        }
    }

    pub fn go_to_character_in_line_back(&mut self, ch: char) {
        if let Some(pos) = self.document().find_char_in_line_back(ch) {
            self.move_cursor_to(pos);
        }
    }

    // ------------------------------------------------------------------
    // Clipboard
    // ------------------------------------------------------------------

    pub fn set_clipboard(&mut self, data: ClipboardData) {
        self.clipboard = Some(data);
    }

    pub fn clipboard(&self) -> Option<&ClipboardData> {
        self.clipboard.as_ref()
    }

    /// Paste the clipboard. Character data inserts at the cursor (after
    /// the current scalar unless `before`); line data inserts whole lines
    /// above/below the current line, cursor on the first pasted line.
    pub fn paste_from_clipboard(&mut self, before: bool) {
        let Some(data) = self.clipboard.clone() else {
            return;
        };
        if data.text.is_empty() {
            return;
        }
        match data.kind {
            ClipboardKind::Characters => {
                let at = if before {
                    self.cursor_position
                } else {
                    self.cursor_position
                        + self.document().current_char().map_or(0, char::len_utf8)
                };
                self.save_to_undo_stack();
                self.text.insert_str(at, &data.text);
                self.cursor_position = at + data.text.len();
                self.after_delete();
            }
            ClipboardKind::Lines => {
                let doc = self.document();
                if before {
                    let start = self.cursor_position - doc.current_line_before_cursor().len();
                    self.save_to_undo_stack();
                    self.text.insert_str(start, &format!("{}\n", data.text));
                    self.cursor_position = start;
                } else {
                    let end = self.cursor_position + doc.current_line_after_cursor().len();
                    self.save_to_undo_stack();
                    self.text.insert_str(end, &format!("\n{}", data.text));
                    self.cursor_position = end + 1;
                }
                self.after_delete();
            }
        }
    }

    // ------------------------------------------------------------------
    // History navigation
    // ------------------------------------------------------------------

    fn ensure_history_nav(&mut self) {
        if self.history_prefix.is_none() {
            self.history_prefix = Some(self.document().text_before_cursor().to_string());
            self.history_original = Some((self.text.clone(), self.cursor_position));
        }
    }

    /// Recall the next older entry matching the history prefix.
    pub fn history_backward(&mut self) {
        self.ensure_history_nav();
        let prefix = self.history_prefix.clone().unwrap_or_default();
        let found = {
            let history = self.history.borrow();
            let start = self.history_index.unwrap_or(history.len());
            (0..start)
                .rev()
                .find_map(|i| {
                    history
                        .get(i)
                        .filter(|e| e.starts_with(&prefix))
                        .map(|e| (i, e.to_string()))
                })
        };
        if let Some((index, entry)) = found {
            self.recall_history_entry(index, entry);
        }
    }

    /// Recall the next newer matching entry, or restore the original line
    /// when stepping past the newest match.
    pub fn history_forward(&mut self) {
        let Some(current) = self.history_index else {
            return;
        };
        let prefix = self.history_prefix.clone().unwrap_or_default();
        let found = {
            let history = self.history.borrow();
            (current + 1..history.len()).find_map(|i| {
                history
                    .get(i)
                    .filter(|e| e.starts_with(&prefix))
                    .map(|e| (i, e.to_string()))
            })
        };
        match found {
            Some((index, entry)) => self.recall_history_entry(index, entry),
            None => {
                if let Some((text, cursor)) = self.history_original.clone() {
                    self.save_to_undo_stack();
                    self.text = text;
                    self.cursor_position = cursor;
                }
                self.history_index = None;
                self.note_non_insert_op();
            }
        }
    }

    fn recall_history_entry(&mut self, index: usize, entry: String) {
        self.save_to_undo_stack();
        self.cursor_position = entry.len();
        self.text = entry;
        self.history_index = Some(index);
        self.note_non_insert_op();
    }

    // ------------------------------------------------------------------
    // Incremental search
    // ------------------------------------------------------------------

    pub fn in_isearch(&self) -> bool {
        self.isearch.is_some()
    }

    pub fn isearch_display(&self) -> Option<IsearchDisplay<'_>> {
        self.isearch.as_ref().map(|s| IsearchDisplay {
            forward: s.forward,
            pattern: &s.pattern,
        })
    }

    /// Enter reverse isearch, or jump to the next older match when already
    /// searching.
    pub fn reverse_search(&mut self) {
        self.start_or_step_isearch(false);
    }

    pub fn forward_search(&mut self) {
        self.start_or_step_isearch(true);
    }

    fn start_or_step_isearch(&mut self, forward: bool) {
        match &mut self.isearch {
            None => {
                self.completion = None;
                self.isearch = Some(IsearchState {
                    forward,
                    pattern: String::new(),
                    match_index: None,
                    original_text: self.text.clone(),
                    original_cursor: self.cursor_position,
                });
            }
            Some(state) => {
                state.forward = forward;
                self.isearch_step(false);
            }
        }
    }

    /// Extend the pattern and re-search from the current anchor.
    pub fn isearch_append(&mut self, ch: char) {
        if let Some(state) = &mut self.isearch {
            state.pattern.push(ch);
            self.isearch_step(true);
        }
    }

    /// Drop the last pattern char and search again from scratch.
    pub fn isearch_backspace(&mut self) {
        if let Some(state) = &mut self.isearch {
            state.pattern.pop();
            state.match_index = None;
            if state.pattern.is_empty() {
                let text = state.original_text.clone();
                let cursor = state.original_cursor;
                self.text = text;
                self.cursor_position = cursor;
            } else {
                self.isearch_step(true);
            }
        }
    }

    /// Find the next matching entry. `include_current` re-tests the
    /// current match (after the pattern changed) before stepping.
    fn isearch_step(&mut self, include_current: bool) {
        let Some(state) = &self.isearch else {
            return;
        };
        if state.pattern.is_empty() {
            return;
        }
        let (forward, pattern, anchor) = (
            state.forward,
            state.pattern.clone(),
            state.match_index,
        );
        let found = {
            let history = self.history.borrow();
            let len = history.len();
            let matches = |i: usize| {
                history
                    .get(i)
                    .filter(|e| e.contains(&pattern))
                    .map(|e| (i, e.to_string()))
            };
            if forward {
                let start = match (anchor, include_current) {
                    (Some(i), true) => i,
                    (Some(i), false) => i + 1,
                    (None, _) => 0,
                };
                (start..len).find_map(matches)
            } else {
                let end = match (anchor, include_current) {
                    (Some(i), true) => i + 1,
                    (Some(i), false) => i,
                    (None, _) => len,
                };
                (0..end).rev().find_map(matches)
            }
        };
        if let Some((index, entry)) = found {
            self.cursor_position = entry.len();
            self.text = entry;
            if let Some(state) = &mut self.isearch {
                state.match_index = Some(index);
            }
        }
    }

    /// Leave isearch; with `restore_original_line` the pre-search text and
    /// cursor come back bit-exactly.
    pub fn exit_isearch(&mut self, restore_original_line: bool) {
        if let Some(state) = self.isearch.take() {
            if restore_original_line {
                self.text = state.original_text;
                self.cursor_position = state.original_cursor;
            }
        }
    }

    // ------------------------------------------------------------------
    // Completion
    // ------------------------------------------------------------------

    /// Ask the code adapter for candidates. Returns `true` when completion
    /// finished (nothing to do, or a sole candidate was accepted); `false`
    /// enters/advances the cycling state so a second tab lists candidates.
    pub fn complete(&mut self) -> bool {
        if self.completion.is_some() {
            self.cycle_completion(1);
            return false;
        }
        let candidates = match self.code.completions(&self.text, self.cursor_position) {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(target: "state.complete", %error, "completion_adapter_failed");
                Vec::new()
            }
        };
        match candidates.len() {
            0 => true,
            1 => {
                self.insert_text(&candidates[0].suffix, false, false);
                true
            }
            _ => {
                self.save_to_undo_stack();
                self.isearch = None;
                self.completion = Some(CompletionState {
                    candidates,
                    index: 0,
                    original_text: self.text.clone(),
                    original_cursor: self.cursor_position,
                });
                self.apply_completion();
                false
            }
        }
    }

    fn cycle_completion(&mut self, step: usize) {
        if let Some(state) = &mut self.completion {
            state.index = (state.index + step) % state.candidates.len();
            self.apply_completion();
        }
    }

    fn apply_completion(&mut self) {
        if let Some(state) = &self.completion {
            let suffix = &state.candidates[state.index].suffix;
            let mut text = state.original_text.clone();
            text.insert_str(state.original_cursor, suffix);
            self.cursor_position = state.original_cursor + suffix.len();
            self.text = text;
        }
    }

    /// Candidates of the active completion state, for listing.
    pub fn completion_candidates(&self) -> Option<Vec<Completion>> {
        self.completion.as_ref().map(|s| s.candidates.clone())
    }

    // ------------------------------------------------------------------
    // Arg prompt
    // ------------------------------------------------------------------

    pub fn set_arg_prompt(&mut self, text: impl Into<String>) {
        self.arg_prompt_text = text.into();
    }

    pub fn arg_prompt_text(&self) -> &str {
        &self.arg_prompt_text
    }

    /// Tokenize the buffer through the code adapter, degrading to plain
    /// text when the adapter fails.
    pub fn code_tokens(&self) -> Vec<(core_syntax::StyleToken, String)> {
        match self.code.tokens(&self.text) {
            Ok(tokens) => tokens,
            Err(error) => {
                warn!(target: "state.tokens", %error, "tokenizer_failed");
                vec![(core_syntax::StyleToken::Text, self.text.clone())]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_syntax::PlainCode;
    use pretty_assertions::assert_eq;

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

    #[test]
    fn insert_and_cursor() {
        let mut l = line();
        l.insert_text("hello", false, false);
        assert_eq!(l.text(), "hello");
        assert_eq!(l.cursor_position(), 5);
        l.cursor_left();
        l.insert_text("X", false, false);
        assert_eq!(l.text(), "hellXo");
    }

    #[test]
    fn overwrite_clips_to_text_end() {
        let mut l = line();
        l.insert_text("abc", false, false);
        l.move_cursor_to(1);
        l.insert_text("XYZW", true, false);
        assert_eq!(l.text(), "aXYZW");
        assert_eq!(l.cursor_position(), 5);
    }

    #[test]
    fn coalesced_inserts_undo_as_one() {
        let mut l = line();
        for c in ["h", "e", "l", "l", "o"] {
            l.insert_text(c, false, true);
        }
        l.undo();
        assert_eq!(l.text(), "");
        assert_eq!(l.cursor_position(), 0);
    }

    #[test]
    fn movement_breaks_coalescing() {
        let mut l = line();
        l.insert_text("ab", false, true);
        l.cursor_left();
        l.insert_text("X", false, true);
        assert_eq!(l.text(), "aXb");
        l.undo();
        assert_eq!(l.text(), "ab");
        l.undo();
        assert_eq!(l.text(), "");
    }

    #[test]
    fn deletions_return_removed_text() {
        let mut l = line();
        l.insert_text("one two three", false, false);
        l.home();
        assert_eq!(l.delete(), "o");
        assert_eq!(l.delete_word(), "ne ");
        assert_eq!(l.text(), "two three");
        l.end();
        assert_eq!(l.delete_word_before_cursor(), "three");
        assert_eq!(l.text(), "two ");
    }

    #[test]
    fn delete_line_parts() {
        let mut l = line();
        l.insert_text("alpha beta", false, false);
        l.move_cursor_to(5);
        assert_eq!(l.delete_until_end_of_line(), " beta");
        assert_eq!(l.text(), "alpha");
        assert_eq!(l.delete_from_start_of_line(), "alpha");
        assert_eq!(l.text(), "");
    }

    #[test]
    fn delete_current_line_consumes_successive_lines() {
        let mut l = line();
        l.insert_text("one\ntwo\nthree", false, false);
        l.move_cursor_to(5);
        assert_eq!(l.delete_current_line(), "two");
        assert_eq!(l.text(), "one\nthree");
        assert_eq!(l.cursor_position(), 4);
        assert_eq!(l.delete_current_line(), "three");
        assert_eq!(l.text(), "one");
        assert_eq!(l.delete_current_line(), "one");
        assert_eq!(l.text(), "");
    }

    #[test]
    fn swap_characters() {
        let mut l = line();
        l.insert_text("ab", false, false);
        l.swap_characters_before_cursor();
        assert_eq!(l.text(), "ba");
    }

    #[test]
    fn newline_auto_indents_after_colon() {
        let mut l = line();
        l.auto_indent = true;
        l.insert_text("    if True:", false, false);
        l.newline();
        assert_eq!(l.text(), "    if True:\n        ");
        assert_eq!(l.cursor_position(), 21);
    }

    #[test]
    fn newline_without_auto_indent() {
        let mut l = line();
        l.insert_text("    x", false, false);
        l.newline();
        assert_eq!(l.text(), "    x\n");
    }

    #[test]
    fn paste_mode_suppresses_indent() {
        let mut l = line();
        l.auto_indent = true;
        l.paste_mode = true;
        l.insert_text("    a:", false, false);
        l.newline();
        assert_eq!(l.text(), "    a:\n");
    }

    #[test]
    fn join_lines_collapses_indentation() {
        let mut l = line();
        l.insert_text("one\n    two", false, false);
        l.home();
        l.join_next_line();
        assert_eq!(l.text(), "one two");
    }

    #[test]
    fn indent_and_unindent() {
        let mut l = line();
        l.insert_text("a\nbc", false, false);
        l.indent();
        assert_eq!(l.text(), "a\n    bc");
        l.unindent();
        assert_eq!(l.text(), "a\nbc");
        l.unindent();
        assert_eq!(l.text(), "a\nbc");
    }

    #[test]
    fn open_lines_above_and_below() {
        let mut l = line();
        l.insert_text("aaa\nbbb", false, false);
        l.insert_line_below();
        assert_eq!(l.text(), "aaa\nbbb\n");
        assert_eq!(l.cursor_position(), 8);
        let mut l = line();
        l.insert_text("aaa", false, false);
        l.insert_line_above();
        assert_eq!(l.text(), "\naaa");
        assert_eq!(l.cursor_position(), 0);
    }

    #[test]
    fn geometric_cursor_movement() {
        let mut l = line();
        l.insert_text("alpha\nbe\ngamma", false, false);
        l.move_cursor_to(13);
        l.cursor_up();
        assert_eq!(l.cursor_position(), 8); // clamped to "be" end
        l.cursor_up();
        assert_eq!(l.cursor_position(), 2);
        l.cursor_down();
        l.cursor_down();
        assert_eq!(l.document().cursor_position_row(), 2);
    }

    #[test]
    fn auto_up_recalls_history_on_single_line() {
        let mut l = line_with_history(&["older"]);
        l.auto_up();
        assert_eq!(l.text(), "older");
    }

    #[test]
    fn word_motion_and_line_ends() {
        let mut l = line();
        l.insert_text("one two three", false, false);
        l.home();
        l.cursor_word_forward(WordKind::Big);
        assert_eq!(l.cursor_position(), 4);
        l.cursor_to_end_of_word(WordKind::Big);
        assert_eq!(l.cursor_position(), 6); // on 'o' of "two"
        l.cursor_to_end_of_line();
        assert_eq!(l.cursor_position(), 13);
        l.cursor_to_start_of_line(false);
        assert_eq!(l.cursor_position(), 0);
    }

    #[test]
    fn start_of_line_after_whitespace() {
        let mut l = line();
        l.insert_text("    text", false, false);
        l.cursor_to_start_of_line(true);
        assert_eq!(l.cursor_position(), 4);
    }

    #[test]
    fn bracket_and_char_jumps() {
        let mut l = line();
        l.insert_text("f(a, b)", false, false);
        l.move_cursor_to(1);
        l.go_to_matching_bracket();
        assert_eq!(l.cursor_position(), 6);
        l.home();
        l.go_to_character_in_line('b');
        assert_eq!(l.cursor_position(), 5);
        l.go_to_character_in_line_back('(');
        assert_eq!(l.cursor_position(), 1);
    }

    #[test]
    fn go_to_line_lands_after_indent() {
        let mut l = line();
        l.insert_text("one\n  two\nthree", false, false);
        l.home();
        l.go_to_line(None);
        assert_eq!(l.document().cursor_position_row(), 2);
        l.go_to_line(Some(2));
        assert_eq!(l.cursor_position(), 6);
    }

    #[test]
    fn clipboard_characters_paste() {
        let mut l = line();
        l.insert_text("ab", false, false);
        l.set_clipboard(ClipboardData::characters("XY"));
        l.move_cursor_to(0);
        l.paste_from_clipboard(false);
        assert_eq!(l.text(), "aXYb");
        let mut l = line();
        l.insert_text("ab", false, false);
        l.set_clipboard(ClipboardData::characters("XY"));
        l.move_cursor_to(0);
        l.paste_from_clipboard(true);
        assert_eq!(l.text(), "XYab");
    }

    #[test]
    fn clipboard_lines_paste() {
        let mut l = line();
        l.insert_text("one\ntwo", false, false);
        l.set_clipboard(ClipboardData::lines("new"));
        l.move_cursor_to(1);
        l.paste_from_clipboard(false);
        assert_eq!(l.text(), "one\nnew\ntwo");
        assert_eq!(l.cursor_position(), 4);
        l.move_cursor_to(1);
        l.paste_from_clipboard(true);
        assert_eq!(l.text(), "new\none\nnew\ntwo");
        assert_eq!(l.cursor_position(), 0);
    }

    #[test]
    fn history_prefix_navigation() {
        // Listed newest-last: "alpha" is the most recent entry.
        let mut l = line_with_history(&["algol", "beta", "alpha"]);
        l.insert_text("al", false, false);
        l.history_backward();
        assert_eq!(l.text(), "alpha");
        l.history_backward();
        assert_eq!(l.text(), "algol");
        l.history_forward();
        assert_eq!(l.text(), "alpha");
    }

    #[test]
    fn history_forward_past_newest_restores_original() {
        let mut l = line_with_history(&["aaa"]);
        l.insert_text("a", false, false);
        l.history_backward();
        assert_eq!(l.text(), "aaa");
        l.history_forward();
        assert_eq!(l.text(), "a");
        assert_eq!(l.cursor_position(), 1);
    }

    #[test]
    fn history_prefix_survives_round_trips() {
        let mut l = line_with_history(&["alpha", "beta", "algol"]);
        l.insert_text("al", false, false);
        for _ in 0..5 {
            l.history_backward();
            assert!(l.text().starts_with("al"));
        }
        for _ in 0..5 {
            l.history_forward();
            assert!(l.text().starts_with("al"));
        }
    }

    #[test]
    fn isearch_finds_and_cancels() {
        let mut l = line_with_history(&["banana", "apple"]);
        l.insert_text("hello", false, false);
        l.reverse_search();
        l.isearch_append('a');
        assert_eq!(l.text(), "apple");
        l.exit_isearch(true);
        assert_eq!(l.text(), "hello");
        assert_eq!(l.cursor_position(), 5);
        assert!(!l.in_isearch());
    }

    #[test]
    fn isearch_steps_to_older_matches() {
        let mut l = line_with_history(&["grep a", "ls", "grep b"]);
        l.reverse_search();
        l.isearch_append('g');
        assert_eq!(l.text(), "grep b");
        l.reverse_search();
        assert_eq!(l.text(), "grep a");
        l.exit_isearch(false);
        assert_eq!(l.text(), "grep a");
    }

    #[test]
    fn isearch_backspace_researches() {
        let mut l = line_with_history(&["abc", "abd"]);
        l.reverse_search();
        l.isearch_append('a');
        l.isearch_append('b');
        l.isearch_append('c');
        assert_eq!(l.text(), "abc");
        l.isearch_backspace();
        assert_eq!(l.text(), "abd");
    }

    #[test]
    fn undo_restores_prior_states_in_order() {
        let mut l = line();
        l.insert_text("one", false, false);
        l.insert_text(" two", false, false);
        l.delete_word_before_cursor();
        assert_eq!(l.text(), "one ");
        l.undo();
        assert_eq!(l.text(), "one two");
        l.undo();
        assert_eq!(l.text(), "one");
        l.undo();
        assert_eq!(l.text(), "");
    }

    struct FixedCompletions(Vec<Completion>);

    impl CodeAdapter for FixedCompletions {
        fn tokens(&self, text: &str) -> anyhow::Result<Vec<(core_syntax::StyleToken, String)>> {
            Ok(vec![(core_syntax::StyleToken::Text, text.to_string())])
        }

        fn completions(
            &self,
            _text: &str,
            _cursor_position: usize,
        ) -> anyhow::Result<Vec<Completion>> {
            Ok(self.0.clone())
        }
    }

    fn line_with_completions(candidates: &[(&str, &str)]) -> Line {
        let candidates = candidates
            .iter()
            .map(|(d, s)| Completion::new(*d, *s))
            .collect();
        Line::new(
            Rc::new(RefCell::new(MemoryHistory::new())),
            Rc::new(FixedCompletions(candidates)),
        )
    }

    #[test]
    fn complete_with_no_candidates_is_done() {
        let mut l = line_with_completions(&[]);
        l.insert_text("x", false, false);
        assert!(l.complete());
        assert_eq!(l.text(), "x");
    }

    #[test]
    fn sole_candidate_accepted_immediately() {
        let mut l = line_with_completions(&[("xyzzy", "yzzy")]);
        l.insert_text("x", false, false);
        assert!(l.complete());
        assert_eq!(l.text(), "xyzzy");
        assert!(l.completion_candidates().is_none());
    }

    #[test]
    fn many_candidates_enter_cycling_state() {
        let mut l = line_with_completions(&[("alpha", "lpha"), ("altitude", "ltitude")]);
        l.insert_text("a", false, false);
        assert!(!l.complete());
        assert_eq!(l.text(), "alpha");
        assert_eq!(l.completion_candidates().unwrap().len(), 2);
        // Cycling replaces the candidate against the original text.
        assert!(!l.complete());
        assert_eq!(l.text(), "altitude");
        assert!(!l.complete());
        assert_eq!(l.text(), "alpha");
    }

    #[test]
    fn editing_drops_completion_state() {
        let mut l = line_with_completions(&[("aa", "a"), ("ab", "b")]);
        l.insert_text("a", false, false);
        l.complete();
        assert!(l.completion_candidates().is_some());
        l.cursor_left();
        assert!(l.completion_candidates().is_none());
    }

    #[test]
    fn isearch_and_completion_are_exclusive() {
        let mut l = line_with_completions(&[("aa", "a"), ("ab", "b")]);
        l.insert_text("a", false, false);
        l.complete();
        assert!(l.completion_candidates().is_some());
        l.reverse_search();
        assert!(l.in_isearch());
        assert!(l.completion_candidates().is_none());
        l.complete();
        assert!(!l.in_isearch());
    }

    #[test]
    fn clear_keeps_history() {
        let mut l = line_with_history(&["kept"]);
        l.insert_text("junk", false, false);
        l.clear();
        assert_eq!(l.text(), "");
        l.history_backward();
        assert_eq!(l.text(), "kept");
    }
}
