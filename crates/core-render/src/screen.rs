//! Virtual screen: a grid of styled cells with the input→screen map.
//!
//! Writers append styled token streams; the screen handles wide-glyph
//! wrapping at the right margin and records, for every input cell, where
//! on the physical screen it landed. Prompt and help cells are not input
//! cells: the map only covers positions that correspond to the edit
//! buffer, which is what the renderer needs to place the hardware cursor.

use crate::codes::CRLF;
use crate::palette::ColorCache;
use ahash::AHashMap;
use core_syntax::{Color, StyleSheet, StyleSpec, StyleToken, StyledText};
use core_text::char_width;

#[derive(Debug, Clone, Copy)]
struct Cell {
    glyph: char,
    style: Option<StyleSpec>,
}

/// One frame's worth of output.
pub struct Screen<'a> {
    style: &'a dyn StyleSheet,
    columns: usize,
    grayed: bool,
    rows: Vec<Vec<Option<Cell>>>,
    input_map: AHashMap<(usize, usize), (usize, usize)>,
    x: usize,
    y: usize,
    input_row: usize,
    input_col: usize,
    second_line_prefix: Option<StyledText>,
}

impl<'a> Screen<'a> {
    /// `grayed` replaces every token with [`StyleToken::Aborted`] so an
    /// abandoned line visibly fades.
    pub fn new(style: &'a dyn StyleSheet, columns: usize, grayed: bool) -> Self {
        Self {
            style,
            columns: columns.max(2),
            grayed,
            rows: Vec::new(),
            input_map: AHashMap::new(),
            x: 0,
            y: 0,
            input_row: 0,
            input_col: 0,
            second_line_prefix: None,
        }
    }

    /// Final cursor column after all writes.
    pub fn x(&self) -> usize {
        self.x
    }

    /// Final cursor row after all writes.
    pub fn y(&self) -> usize {
        self.y
    }

    /// Tokens to re-emit (as non-input cells) after every input newline.
    pub fn set_second_line_prefix(&mut self, prefix: Option<StyledText>) {
        self.second_line_prefix = prefix;
    }

    /// Record that the current input position sits at the current screen
    /// position. Called implicitly for every input cell; call it once more
    /// after the last input token so the end-of-buffer cursor resolves.
    pub fn save_input_pos(&mut self) {
        self.input_map
            .insert((self.input_row, self.input_col), (self.y, self.x));
    }

    /// Screen position of a logical input coordinate.
    pub fn input_to_screen(&self, row: usize, col: usize) -> Option<(usize, usize)> {
        self.input_map.get(&(row, col)).copied()
    }

    pub fn write_highlighted(&mut self, data: &[(StyleToken, String)], is_input: bool) {
        for (token, text) in data {
            for c in text.chars() {
                self.write_char(c, *token, is_input);
            }
        }
    }

    pub fn write_char(&mut self, c: char, token: StyleToken, is_input: bool) {
        let width = char_width(c);
        // A glyph that would cross the right margin wraps first.
        if self.x + width >= self.columns {
            self.y += 1;
            self.x = 0;
        }
        if is_input {
            self.save_input_pos();
        }
        let token = if self.grayed {
            StyleToken::Aborted
        } else {
            token
        };
        if c == '\n' {
            self.y += 1;
            self.x = 0;
            if is_input {
                self.input_row += 1;
                self.input_col = 0;
                if let Some(prefix) = self.second_line_prefix.clone() {
                    self.write_highlighted(&prefix, false);
                }
            }
        } else {
            let style = self.style.style_for_token(token);
            self.put_cell(self.y, self.x, Cell { glyph: c, style });
            if is_input {
                self.input_col += 1;
            }
            if self.x + width >= self.columns {
                self.y += 1;
                self.x = 0;
            } else {
                self.x += width;
            }
        }
    }

    fn put_cell(&mut self, y: usize, x: usize, cell: Cell) {
        if self.rows.len() <= y {
            self.rows.resize_with(y + 1, Vec::new);
        }
        let row = &mut self.rows[y];
        if row.len() <= x {
            row.resize(x + 1, None);
        }
        row[x] = Some(cell);
    }

    /// Background-highlight every drawn cell of an input row.
    pub fn highlight_line(&mut self, row: usize, bg: Color) {
        let cells: Vec<(usize, usize)> = self
            .input_map
            .iter()
            .filter(|((r, _), _)| *r == row)
            .map(|((r, c), _)| (*r, *c))
            .collect();
        for (r, c) in cells {
            self.highlight_character(r, c, None, Some(bg));
        }
    }

    /// Recolor one input cell, addressed by logical coordinates.
    pub fn highlight_character(
        &mut self,
        row: usize,
        col: usize,
        fg: Option<Color>,
        bg: Option<Color>,
    ) {
        let Some(&(y, x)) = self.input_map.get(&(row, col)) else {
            return;
        };
        let Some(cell) = self
            .rows
            .get_mut(y)
            .and_then(|r| r.get_mut(x))
            .and_then(Option::as_mut)
        else {
            return;
        };
        let mut style = cell.style.unwrap_or_default();
        if let Some(fg) = fg {
            style.fg = Some(fg);
        }
        if let Some(bg) = bg {
            style.bg = Some(bg);
        }
        cell.style = Some(style);
    }

    /// Serialize row by row with CRLF separators. Undrawn cells inside a
    /// row render as spaces; wide glyphs advance by their width.
    pub fn output(&self, colors: &mut ColorCache) -> String {
        let mut out = String::new();
        for (i, row) in self.rows.iter().enumerate() {
            let mut x = 0;
            while x < row.len() {
                match &row[x] {
                    Some(cell) => {
                        match &cell.style {
                            Some(style) if !style.is_plain() => {
                                out.push_str(&colors.color_string(style));
                                out.push(cell.glyph);
                                out.push_str(crate::codes::RESET_ATTRIBUTES);
                            }
                            _ => out.push(cell.glyph),
                        }
                        x += char_width(cell.glyph);
                    }
                    None => {
                        out.push(' ');
                        x += 1;
                    }
                }
            }
            if i + 1 < self.rows.len() {
                out.push_str(CRLF);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_syntax::DefaultStyle;
    use pretty_assertions::assert_eq;

    struct NoStyle;
    impl StyleSheet for NoStyle {
        fn style_for_token(&self, _token: StyleToken) -> Option<StyleSpec> {
            None
        }
    }

    fn text(s: &str) -> StyledText {
        vec![(StyleToken::Text, s.to_string())]
    }

    #[test]
    fn plain_text_round_trips() {
        let style = NoStyle;
        let mut screen = Screen::new(&style, 80, false);
        screen.write_highlighted(&text("hello"), true);
        let mut colors = ColorCache::new();
        assert_eq!(screen.output(&mut colors), "hello");
        assert_eq!((screen.x(), screen.y()), (5, 0));
    }

    #[test]
    fn input_map_tracks_columns() {
        let style = NoStyle;
        let mut screen = Screen::new(&style, 80, false);
        screen.write_highlighted(&text("ab\ncd"), true);
        assert_eq!(screen.input_to_screen(0, 0), Some((0, 0)));
        assert_eq!(screen.input_to_screen(0, 1), Some((0, 1)));
        assert_eq!(screen.input_to_screen(1, 0), Some((1, 0)));
        assert_eq!(screen.input_to_screen(1, 1), Some((1, 1)));
    }

    #[test]
    fn prompt_shifts_input_map() {
        let style = NoStyle;
        let mut screen = Screen::new(&style, 80, false);
        screen.write_highlighted(&text("> "), false);
        screen.write_highlighted(&text("ab"), true);
        assert_eq!(screen.input_to_screen(0, 0), Some((0, 2)));
        assert_eq!(screen.input_to_screen(0, 1), Some((0, 3)));
    }

    #[test]
    fn second_line_prefix_inserted_after_newlines() {
        let style = NoStyle;
        let mut screen = Screen::new(&style, 80, false);
        screen.write_highlighted(&text("> "), false);
        screen.set_second_line_prefix(Some(text("| ")));
        screen.write_highlighted(&text("a\nb"), true);
        let mut colors = ColorCache::new();
        assert_eq!(screen.output(&mut colors), "> a\r\n| b");
        // The second input row starts after the prefix.
        assert_eq!(screen.input_to_screen(1, 0), Some((1, 2)));
    }

    #[test]
    fn single_width_columns_match_logical_columns() {
        let style = NoStyle;
        let mut screen = Screen::new(&style, 80, false);
        screen.write_highlighted(&text("abcdef"), true);
        for col in 0..6 {
            assert_eq!(screen.input_to_screen(0, col), Some((0, col)));
        }
    }

    #[test]
    fn wide_glyphs_never_split_across_rows() {
        let style = NoStyle;
        // Width 5: "ab" leaves columns 2..4; a width-2 glyph at x=3 would
        // cross the margin, so it wraps to the next row whole.
        let mut screen = Screen::new(&style, 5, false);
        screen.write_highlighted(&text("abc漢"), true);
        assert_eq!(screen.input_to_screen(0, 3), Some((1, 0)));
        let mut colors = ColorCache::new();
        assert_eq!(screen.output(&mut colors), "abc\r\n漢");
    }

    #[test]
    fn wide_glyph_advances_two_columns() {
        let style = NoStyle;
        let mut screen = Screen::new(&style, 80, false);
        screen.write_highlighted(&text("漢x"), true);
        assert_eq!(screen.input_to_screen(0, 0), Some((0, 0)));
        assert_eq!(screen.input_to_screen(0, 1), Some((0, 2)));
    }

    #[test]
    fn grayed_screen_uses_aborted_style() {
        let style = DefaultStyle;
        let mut screen = Screen::new(&style, 80, true);
        screen.write_highlighted(&[(StyleToken::Keyword, "if".to_string())], true);
        let mut colors = ColorCache::new();
        let out = screen.output(&mut colors);
        let gray = colors.index_for(Color::rgb(0xaa, 0xaa, 0xaa));
        assert!(out.contains(&format!("\x1b[38;5;{gray}m")));
    }

    #[test]
    fn highlight_character_overrides_background() {
        let style = NoStyle;
        let mut screen = Screen::new(&style, 80, false);
        screen.write_highlighted(&text("ok"), true);
        screen.highlight_character(0, 1, None, Some(Color::rgb(0x44, 0x44, 0x44)));
        let mut colors = ColorCache::new();
        let out = screen.output(&mut colors);
        assert!(out.contains("\x1b[48;5;"));
    }

    #[test]
    fn gaps_render_as_spaces() {
        let style = NoStyle;
        let mut screen = Screen::new(&style, 80, false);
        screen.write_highlighted(&text("a\nb"), false);
        screen.write_highlighted(&text("c"), true);
        let mut colors = ColorCache::new();
        assert_eq!(screen.output(&mut colors), "a\r\nbc");
    }
}
