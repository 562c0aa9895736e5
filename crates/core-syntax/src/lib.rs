//! Style model and the adapter seams the core consumes.
//!
//! The editor never tokenizes or completes anything itself: a host plugs in
//! a [`CodeAdapter`] (tokens + completion candidates), a [`PromptAdapter`]
//! (prompt/help token streams) and a [`StyleSheet`] (symbolic token →
//! concrete style). Adapter failures must never wedge the editor, so the
//! fallible calls return `anyhow::Result` and callers degrade to empty
//! results.

use anyhow::Result;
use bitflags::bitflags;

/// Symbolic token class attached to a substring of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleToken {
    Text,
    Keyword,
    Operator,
    Number,
    Name,
    Str,
    Comment,
    Error,
    Prompt,
    PromptSecondLine,
    PromptIsearch,
    PromptIsearchText,
    PromptArg,
    Toolbar,
    ToolbarMode,
    ToolbarOn,
    ToolbarOff,
    /// Substituted for every token when a frame paints an aborted line.
    Aborted,
}

/// A styled run of text.
pub type StyledText = Vec<(StyleToken, String)>;

/// 24-bit color, mapped to the terminal's 256-color palette at render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `"rrggbb"` (with or without a leading `#`).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self { r, g, b })
    }
}

bitflags! {
    /// Cell text attributes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CellAttrs: u8 {
        const BOLD = 1 << 0;
        const UNDERLINE = 1 << 1;
    }
}

/// Concrete style resolved for a token: every field optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StyleSpec {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub attrs: CellAttrs,
}

impl StyleSpec {
    pub fn fg(color: Color) -> Self {
        Self {
            fg: Some(color),
            ..Self::default()
        }
    }

    pub fn with_bg(mut self, color: Color) -> Self {
        self.bg = Some(color);
        self
    }

    pub fn bold(mut self) -> Self {
        self.attrs |= CellAttrs::BOLD;
        self
    }

    pub fn underline(mut self) -> Self {
        self.attrs |= CellAttrs::UNDERLINE;
        self
    }

    pub fn is_plain(&self) -> bool {
        self.fg.is_none() && self.bg.is_none() && self.attrs.is_empty()
    }
}

/// One completion candidate: `display` is shown in listings, `suffix` is
/// inserted at the cursor on acceptance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub display: String,
    pub suffix: String,
}

impl Completion {
    pub fn new(display: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            display: display.into(),
            suffix: suffix.into(),
        }
    }
}

/// Tokenizer + completion oracle over the buffer text.
pub trait CodeAdapter {
    /// Tokenize for display. The concatenated token text must equal the
    /// input text.
    fn tokens(&self, text: &str) -> Result<StyledText>;

    /// Candidates for the word ending at `cursor_position` (byte offset).
    fn completions(&self, text: &str, cursor_position: usize) -> Result<Vec<Completion>>;
}

/// Isearch state as the prompt renders it.
#[derive(Debug, Clone, Copy)]
pub struct IsearchDisplay<'a> {
    pub forward: bool,
    pub pattern: &'a str,
}

/// Everything the help/toolbar area may want to show.
#[derive(Debug, Clone, Copy)]
pub struct HelpContext<'a> {
    /// Short tag for the active input mode, e.g. `(emacs)` or `(NAV)`.
    pub mode_tag: &'a str,
    pub multiline: bool,
    pub paste_mode: bool,
    pub isearch: Option<IsearchDisplay<'a>>,
    pub arg_text: &'a str,
}

/// Prompt token streams. All methods are infallible; a prompt that needs
/// fallible data should cache it elsewhere.
pub trait PromptAdapter {
    fn prompt(&self) -> StyledText;

    /// Inserted after every newline of the input area.
    fn second_line_prefix(&self) -> StyledText;

    fn isearch_prompt(&self, isearch: &IsearchDisplay<'_>) -> StyledText {
        let name = if isearch.forward {
            "(i-search)"
        } else {
            "(reverse-i-search)"
        };
        vec![
            (StyleToken::PromptIsearch, format!("{name}`")),
            (StyleToken::PromptIsearchText, isearch.pattern.to_string()),
            (StyleToken::PromptIsearch, "`: ".to_string()),
        ]
    }

    fn arg_prompt(&self, text: &str) -> StyledText {
        vec![(StyleToken::PromptArg, format!("(arg: {text}) "))]
    }

    /// Extra lines under the input (signature help, toolbar). Skipped on
    /// accept/abort frames.
    fn help_tokens(&self, ctx: &HelpContext<'_>) -> StyledText {
        let mut out = StyledText::new();
        if let Some(isearch) = &ctx.isearch {
            out.push((StyleToken::Text, "\n".to_string()));
            out.extend(self.isearch_prompt(isearch));
        } else if !ctx.arg_text.is_empty() {
            out.push((StyleToken::Text, "\n".to_string()));
            out.extend(self.arg_prompt(ctx.arg_text));
        }
        out
    }
}

/// Symbolic token → concrete style. `None` means "render unstyled".
pub trait StyleSheet {
    fn style_for_token(&self, token: StyleToken) -> Option<StyleSpec>;
}

/// Tokenizer that never styles and never completes.
#[derive(Debug, Default)]
pub struct PlainCode;

impl CodeAdapter for PlainCode {
    fn tokens(&self, text: &str) -> Result<StyledText> {
        Ok(vec![(StyleToken::Text, text.to_string())])
    }

    fn completions(&self, _text: &str, _cursor_position: usize) -> Result<Vec<Completion>> {
        Ok(Vec::new())
    }
}

/// Fixed-text prompt with an aligned continuation prefix.
#[derive(Debug)]
pub struct DefaultPrompt {
    text: String,
}

impl DefaultPrompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Default for DefaultPrompt {
    fn default() -> Self {
        Self::new("> ")
    }
}

impl PromptAdapter for DefaultPrompt {
    fn prompt(&self) -> StyledText {
        vec![(StyleToken::Prompt, self.text.clone())]
    }

    fn second_line_prefix(&self) -> StyledText {
        let width = self.text.chars().count();
        vec![(StyleToken::PromptSecondLine, " ".repeat(width))]
    }
}

/// Style sheet used when the host does not provide one.
#[derive(Debug, Default)]
pub struct DefaultStyle;

impl StyleSheet for DefaultStyle {
    fn style_for_token(&self, token: StyleToken) -> Option<StyleSpec> {
        let spec = match token {
            StyleToken::Keyword => StyleSpec::fg(Color::rgb(0xee, 0x00, 0xee)),
            StyleToken::Operator => StyleSpec::fg(Color::rgb(0xaa, 0x66, 0x66)),
            StyleToken::Number => StyleSpec::fg(Color::rgb(0xff, 0x00, 0x00)),
            StyleToken::Name => StyleSpec::fg(Color::rgb(0x00, 0x88, 0x00)),
            StyleToken::Str => StyleSpec::fg(Color::rgb(0x44, 0x00, 0x00)),
            StyleToken::Comment => StyleSpec::fg(Color::rgb(0x00, 0x00, 0xdd)),
            StyleToken::Error => {
                StyleSpec::fg(Color::rgb(0x00, 0x00, 0x00)).with_bg(Color::rgb(0xff, 0x88, 0x88))
            }
            StyleToken::Prompt => StyleSpec::fg(Color::rgb(0x00, 0x44, 0x00)).bold(),
            StyleToken::PromptSecondLine => StyleSpec::fg(Color::rgb(0x88, 0x88, 0x88)).bold(),
            StyleToken::PromptIsearch => StyleSpec::fg(Color::rgb(0x55, 0x00, 0x00)),
            StyleToken::PromptIsearchText => StyleSpec::default().bold(),
            StyleToken::PromptArg => StyleSpec::default().bold(),
            StyleToken::Toolbar => {
                StyleSpec::fg(Color::rgb(0xaa, 0xaa, 0xaa)).with_bg(Color::rgb(0x22, 0x22, 0x22))
            }
            StyleToken::ToolbarMode => {
                StyleSpec::fg(Color::rgb(0xff, 0xff, 0xaa)).with_bg(Color::rgb(0x22, 0x22, 0x22))
            }
            StyleToken::ToolbarOn => {
                StyleSpec::fg(Color::rgb(0xff, 0xff, 0xff)).with_bg(Color::rgb(0x22, 0x22, 0x22))
            }
            StyleToken::ToolbarOff => {
                StyleSpec::fg(Color::rgb(0x88, 0x88, 0x88)).with_bg(Color::rgb(0x22, 0x22, 0x22))
            }
            StyleToken::Aborted => StyleSpec::fg(Color::rgb(0xaa, 0xaa, 0xaa)),
            StyleToken::Text => return None,
        };
        Some(spec)
    }
}

/// Re-tag unbalanced single-character bracket tokens as [`StyleToken::Error`].
///
/// A closing bracket that does not match the innermost open bracket is
/// marked and the open bracket is consumed; opens left on the stack at the
/// end are marked too.
pub fn mark_unbalanced_brackets(mut tokens: StyledText) -> StyledText {
    fn bracket_of(text: &str) -> Option<char> {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if "([{)]}".contains(c) => Some(c),
            _ => None,
        }
    }

    let mut stack: Vec<(usize, char)> = Vec::new();
    for index in 0..tokens.len() {
        let Some(c) = bracket_of(&tokens[index].1) else {
            continue;
        };
        match c {
            '(' | '[' | '{' => stack.push((index, c)),
            _ => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((_, open)) if open == expected => {}
                    _ => tokens[index].0 = StyleToken::Error,
                }
            }
        }
    }
    for (index, _) in stack {
        tokens[index].0 = StyleToken::Error;
    }
    tokens
}
