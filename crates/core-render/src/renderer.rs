//! Differential frame renderer.
//!
//! Each tick builds a fresh [`Screen`] from the render context and compares
//! it against the previous paint: an identical frame emits nothing at all.
//! A changed frame moves the cursor to the first painted line, erases
//! downward, rewrites the screen and walks the cursor back to the input
//! position with relative moves only.

use crate::codes;
use crate::palette::ColorCache;
use crate::screen::Screen;
use anyhow::Result;
use core_syntax::{Color, Completion, HelpContext, PromptAdapter, StyleSheet, StyleToken};
use core_text::Document;
use std::io::Write;
use std::rc::Rc;
use tracing::trace;

/// Highlighted span of input cells: `(row, start_col)` to `(row, end_col)`
/// exclusive, logical coordinates.
pub type HighlightRegion = ((usize, usize), (usize, usize));

/// Everything the renderer needs for one tick.
pub struct RenderContext<'a> {
    pub code_tokens: &'a [(StyleToken, String)],
    pub prompt: &'a dyn PromptAdapter,
    pub document: Document<'a>,
    pub help: HelpContext<'a>,
    pub accept: bool,
    pub abort: bool,
    pub highlight_current_line: bool,
    pub highlight_regions: &'a [HighlightRegion],
}

#[derive(Debug, PartialEq, Eq)]
struct LastFrame {
    body: String,
    columns: usize,
    cursor: (usize, usize),
    screen_end: (usize, usize),
}

/// Paints frames onto a VT100 terminal through any `Write`.
pub struct Renderer<W: Write> {
    stdout: W,
    style: Rc<dyn StyleSheet>,
    colors: ColorCache,
    lines_in_use: usize,
    cursor_line: usize,
    last_frame: Option<LastFrame>,
    columns_override: Option<usize>,
}

const CURRENT_LINE_BG: Color = Color::rgb(0xf8, 0xf8, 0xf8);
const REGION_BG: Color = Color::rgb(0x44, 0x44, 0x44);
const REGION_FG: Color = Color::rgb(0xee, 0xee, 0xee);

impl<W: Write> Renderer<W> {
    pub fn new(stdout: W, style: Rc<dyn StyleSheet>) -> Self {
        Self {
            stdout,
            style,
            colors: ColorCache::new(),
            lines_in_use: 0,
            cursor_line: 0,
            last_frame: None,
            columns_override: None,
        }
    }

    /// Fix the width instead of asking the terminal (tests, pipes).
    pub fn with_columns(mut self, columns: usize) -> Self {
        self.columns_override = Some(columns);
        self
    }

    fn columns(&self) -> usize {
        self.columns_override
            .unwrap_or_else(|| core_terminal::terminal_size().0 as usize)
    }

    /// Paint one frame.
    pub fn render(&mut self, context: &RenderContext<'_>) -> Result<()> {
        let out = self.render_to_string(context);
        if !out.is_empty() {
            self.stdout.write_all(out.as_bytes())?;
            self.stdout.flush()?;
        }
        Ok(())
    }

    fn build_screen<'s>(&mut self, context: &RenderContext<'_>, style: &'s dyn StyleSheet) -> Screen<'s> {
        let mut screen = Screen::new(style, self.columns(), context.abort);
        screen.write_highlighted(&context.prompt.prompt(), false);
        screen.set_second_line_prefix(Some(context.prompt.second_line_prefix()));
        screen.write_highlighted(context.code_tokens, true);
        screen.save_input_pos();
        screen.set_second_line_prefix(None);
        if !(context.accept || context.abort) {
            let help = context.prompt.help_tokens(&context.help);
            if !help.is_empty() {
                screen.write_highlighted(&help, false);
            }
            if context.highlight_current_line {
                screen.highlight_line(context.document.cursor_position_row(), CURRENT_LINE_BG);
            }
            for ((start_row, start_col), (_end_row, end_col)) in context.highlight_regions {
                for col in *start_col..*end_col {
                    screen.highlight_character(*start_row, col, Some(REGION_FG), Some(REGION_BG));
                }
            }
        }
        screen
    }

    /// Build the frame and serialize the terminal delta. Empty result means
    /// the frame is identical to the previous paint.
    pub fn render_to_string(&mut self, context: &RenderContext<'_>) -> String {
        let style = Rc::clone(&self.style);
        let screen = self.build_screen(context, &*style);
        let body = screen.output(&mut self.colors);
        let screen_end = (screen.y(), screen.x());
        let cursor = screen
            .input_to_screen(
                context.document.cursor_position_row(),
                context.document.cursor_position_col(),
            )
            .unwrap_or(screen_end);

        let finished = context.accept || context.abort;
        if !finished {
            let frame = LastFrame {
                body: body.clone(),
                columns: self.columns(),
                cursor,
                screen_end,
            };
            if self.last_frame.as_ref() == Some(&frame) {
                trace!(target: "render.frame", "frame_unchanged");
                return String::new();
            }
            self.last_frame = Some(frame);
        }

        let mut out = String::new();
        if self.cursor_line > 0 {
            out.push_str(&codes::cursor_up(self.cursor_line));
        }
        out.push_str(codes::CARRIAGE_RETURN);
        out.push_str(codes::ERASE_DOWN);
        out.push_str(&body);

        if finished {
            self.lines_in_use = 0;
            self.cursor_line = 0;
            self.last_frame = None;
            out.push_str(codes::CRLF);
        } else {
            let (cursor_y, cursor_x) = cursor;
            if screen.y() > cursor_y {
                out.push_str(&codes::cursor_up(screen.y() - cursor_y));
            }
            if screen.x() > cursor_x {
                out.push_str(&codes::cursor_backward(screen.x() - cursor_x));
            }
            if screen.x() < cursor_x {
                out.push_str(&codes::cursor_forward(cursor_x - screen.x()));
            }
            self.lines_in_use = screen.y();
            self.cursor_line = cursor_y;
        }
        trace!(target: "render.frame", bytes = out.len(), lines = self.lines_in_use, "frame_painted");
        out
    }

    /// Erase the whole screen; the next frame repaints from the top.
    pub fn clear(&mut self) -> Result<()> {
        self.stdout.write_all(codes::ERASE_SCREEN.as_bytes())?;
        self.stdout
            .write_all(codes::cursor_goto(0, 0).as_bytes())?;
        self.stdout.flush()?;
        self.lines_in_use = 0;
        self.cursor_line = 0;
        self.last_frame = None;
        Ok(())
    }

    /// Print completion candidates in columns under the prompt; the next
    /// frame repaints below the listing.
    pub fn render_completions(&mut self, completions: &[Completion]) -> Result<()> {
        self.stdout.write_all(codes::CRLF.as_bytes())?;
        for line in in_columns(completions, self.columns()) {
            self.stdout.write_all(line.as_bytes())?;
            self.stdout.write_all(codes::CRLF.as_bytes())?;
        }
        self.stdout.flush()?;
        self.lines_in_use = 0;
        self.cursor_line = 0;
        self.last_frame = None;
        Ok(())
    }

    /// Reset the frame cache (after external output disturbed the screen).
    pub fn invalidate(&mut self) {
        self.lines_in_use = 0;
        self.cursor_line = 0;
        self.last_frame = None;
    }
}

/// Lay the candidate displays out in equal-width columns.
fn in_columns(completions: &[Completion], term_width: usize) -> Vec<String> {
    if completions.is_empty() {
        return Vec::new();
    }
    let max_length = completions
        .iter()
        .map(|c| c.display.chars().count())
        .max()
        .unwrap_or(0)
        + 1;
    let per_line = (term_width / max_length).max(1);
    let mut lines = Vec::new();
    let mut line = String::new();
    for (i, completion) in completions.iter().enumerate() {
        line.push_str(&completion.display);
        if (i + 1) % per_line == 0 {
            lines.push(std::mem::take(&mut line));
        } else {
            let pad = max_length - completion.display.chars().count();
            line.push_str(&" ".repeat(pad));
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_syntax::{DefaultPrompt, DefaultStyle, StyleSpec};
    use pretty_assertions::assert_eq;

    struct NoStyle;
    impl StyleSheet for NoStyle {
        fn style_for_token(&self, _token: StyleToken) -> Option<StyleSpec> {
            None
        }
    }

    fn context<'a>(
        tokens: &'a [(StyleToken, String)],
        prompt: &'a DefaultPrompt,
        document: Document<'a>,
    ) -> RenderContext<'a> {
        RenderContext {
            code_tokens: tokens,
            prompt,
            document,
            help: HelpContext {
                mode_tag: "(emacs)",
                multiline: false,
                paste_mode: false,
                isearch: None,
                arg_text: "",
            },
            accept: false,
            abort: false,
            highlight_current_line: false,
            highlight_regions: &[],
        }
    }

    fn renderer() -> Renderer<Vec<u8>> {
        Renderer::new(Vec::new(), Rc::new(NoStyle)).with_columns(40)
    }

    fn tokens(s: &str) -> Vec<(StyleToken, String)> {
        vec![(StyleToken::Text, s.to_string())]
    }

    #[test]
    fn first_frame_paints_prompt_and_text() {
        let mut r = renderer();
        let prompt = DefaultPrompt::default();
        let toks = tokens("hi");
        let out = r.render_to_string(&context(&toks, &prompt, Document::new("hi", 2)));
        assert_eq!(out, "\r\x1b[J> hi");
    }

    #[test]
    fn unchanged_frame_emits_nothing() {
        let mut r = renderer();
        let prompt = DefaultPrompt::default();
        let toks = tokens("hello");
        let ctx = context(&toks, &prompt, Document::new("hello", 5));
        let first = r.render_to_string(&ctx);
        assert!(!first.is_empty());
        let ctx = context(&toks, &prompt, Document::new("hello", 5));
        assert_eq!(r.render_to_string(&ctx), "");
    }

    #[test]
    fn cursor_walks_back_to_input_position() {
        let mut r = renderer();
        let prompt = DefaultPrompt::default();
        let toks = tokens("hello");
        let out = r.render_to_string(&context(&toks, &prompt, Document::new("hello", 2)));
        // Screen ends at column 7 ("> hello"); the cursor belongs at 4.
        assert!(out.ends_with(&codes::cursor_backward(3)));
    }

    #[test]
    fn cursor_motion_alone_repaints() {
        let mut r = renderer();
        let prompt = DefaultPrompt::default();
        let toks = tokens("hello");
        r.render_to_string(&context(&toks, &prompt, Document::new("hello", 5)));
        let out = r.render_to_string(&context(&toks, &prompt, Document::new("hello", 0)));
        assert!(!out.is_empty());
    }

    #[test]
    fn second_frame_starts_from_cursor_line() {
        let mut r = renderer();
        let prompt = DefaultPrompt::default();
        let toks = tokens("a\nb\nc");
        // Cursor on row 0 of three rows: the renderer leaves the hardware
        // cursor up there, so the next paint needs no cursor_up.
        r.render_to_string(&context(&toks, &prompt, Document::new("a\nb\nc", 0)));
        let toks2 = tokens("a\nb\ncd");
        let out = r.render_to_string(&context(&toks2, &prompt, Document::new("a\nb\ncd", 0)));
        assert!(out.starts_with("\r\x1b[J"));
    }

    #[test]
    fn accept_frame_finishes_with_crlf_and_resets() {
        let mut r = renderer();
        let prompt = DefaultPrompt::default();
        let toks = tokens("done");
        let mut ctx = context(&toks, &prompt, Document::new("done", 4));
        ctx.accept = true;
        let out = r.render_to_string(&ctx);
        assert!(out.ends_with(codes::CRLF));
        // Next frame paints from scratch, no cursor_up prefix.
        let ctx = context(&toks, &prompt, Document::new("done", 4));
        let out = r.render_to_string(&ctx);
        assert!(out.starts_with("\r\x1b[J"));
    }

    #[test]
    fn abort_frame_grays_out() {
        let mut r = Renderer::new(Vec::new(), Rc::new(DefaultStyle)).with_columns(40);
        let prompt = DefaultPrompt::default();
        let toks = tokens("gone");
        let mut ctx = context(&toks, &prompt, Document::new("gone", 4));
        ctx.abort = true;
        let out = r.render_to_string(&ctx);
        assert!(out.contains("\x1b[38;5;"));
    }

    #[test]
    fn multiline_cursor_position() {
        let mut r = renderer();
        let prompt = DefaultPrompt::default();
        let toks = tokens("ab\ncd");
        // Cursor at start of second line (row 1, col 0 → screen row 1 after
        // the two-cell prefix).
        let out = r.render_to_string(&context(&toks, &prompt, Document::new("ab\ncd", 3)));
        assert!(out.ends_with(&codes::cursor_backward(2)));
    }

    #[test]
    fn bracket_error_cells_carry_error_style() {
        let mut r = Renderer::new(Vec::new(), Rc::new(DefaultStyle)).with_columns(40);
        let prompt = DefaultPrompt::new("");
        let toks: Vec<(StyleToken, String)> = core_syntax::mark_unbalanced_brackets(
            "([)]".chars().map(|c| (StyleToken::Text, c.to_string())).collect(),
        );
        let out = r.render_to_string(&context(&toks, &prompt, Document::new("([)]", 4)));
        // Error style: black on ff8888 background.
        let mut cache = ColorCache::new();
        let bg = cache.index_for(Color::rgb(0xff, 0x88, 0x88));
        let needle = format!("\x1b[48;5;{bg}m");
        let first = out.find(&needle).expect("error background present");
        let second = out[first + needle.len()..].find(&needle);
        assert!(second.is_some(), "two error-styled cells expected");
    }

    #[test]
    fn highlight_region_recolors_cells() {
        let mut r = Renderer::new(Vec::new(), Rc::new(NoStyle)).with_columns(40);
        let prompt = DefaultPrompt::new("");
        let toks = tokens("abcd");
        let mut ctx = context(&toks, &prompt, Document::new("abcd", 4));
        let regions = [((0, 1), (0, 3))];
        ctx.highlight_regions = &regions;
        let out = r.render_to_string(&ctx);
        assert_eq!(out.matches("\x1b[48;5;").count(), 2);
    }

    #[test]
    fn completion_columns_layout() {
        let items: Vec<Completion> = ["alpha", "beta", "gamma", "delta"]
            .iter()
            .map(|s| Completion::new(*s, ""))
            .collect();
        let lines = in_columns(&items, 14);
        assert_eq!(lines, vec!["alpha beta", "gamma delta"]);
    }
}
