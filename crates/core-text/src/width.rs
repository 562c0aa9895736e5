//! Terminal cell width for scalars.
//!
//! Rendering is the only layer that cares about visual width; cursor
//! arithmetic elsewhere treats every scalar as one logical column.

use unicode_width::UnicodeWidthChar;

/// Number of terminal cells a scalar occupies. Never less than one: control
/// characters and zero-width combining marks still consume a cell when they
/// reach the screen buffer, matching classic wcwidth-based renderers.
pub fn char_width(c: char) -> usize {
    UnicodeWidthChar::width(c).map_or(1, |w| w.max(1))
}
