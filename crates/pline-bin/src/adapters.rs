//! promptline adapters for the calculator REPL.

use crate::calc;
use anyhow::Result;
use core_syntax::{
    CodeAdapter, Completion, HelpContext, PromptAdapter, StyleToken, StyledText,
    mark_unbalanced_brackets,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Variable bindings shared between the evaluator and the adapters.
pub type Bindings = Rc<RefCell<HashMap<String, f64>>>;

/// Tokenizer + completion oracle over the calculator language.
pub struct CalcCode {
    bindings: Bindings,
}

impl CalcCode {
    pub fn new(bindings: Bindings) -> Self {
        Self { bindings }
    }
}

impl CodeAdapter for CalcCode {
    fn tokens(&self, text: &str) -> Result<StyledText> {
        Ok(mark_unbalanced_brackets(calc::lex(text)))
    }

    fn completions(&self, text: &str, cursor_position: usize) -> Result<Vec<Completion>> {
        let before = &text[..cursor_position.min(text.len())];
        let word_start = before
            .rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
            .map_or(0, |i| i + before[i..].chars().next().map_or(1, char::len_utf8));
        let word = &before[word_start..];
        if word.is_empty() {
            return Ok(Vec::new());
        }
        let names = calc::known_names(&self.bindings.borrow());
        Ok(names
            .into_iter()
            .filter(|name| name.starts_with(word) && name != word)
            .map(|name| {
                let suffix = name[word.len()..].to_string();
                Completion::new(name, suffix)
            })
            .collect())
    }
}

/// `In [n]:` prompt with a mode/multiline toolbar under the input.
pub struct CalcPrompt {
    statement_index: Rc<Cell<usize>>,
}

impl CalcPrompt {
    pub fn new(statement_index: Rc<Cell<usize>>) -> Self {
        Self { statement_index }
    }

    fn prefix(&self) -> String {
        format!("In [{}]: ", self.statement_index.get())
    }
}

impl PromptAdapter for CalcPrompt {
    fn prompt(&self) -> StyledText {
        vec![(StyleToken::Prompt, self.prefix())]
    }

    fn second_line_prefix(&self) -> StyledText {
        let width = self.prefix().chars().count();
        vec![(
            StyleToken::PromptSecondLine,
            format!("{:>width$}", "...: ", width = width),
        )]
    }

    fn help_tokens(&self, ctx: &HelpContext<'_>) -> StyledText {
        let mut out = StyledText::new();
        out.push((StyleToken::Text, "\n".to_string()));
        if let Some(isearch) = &ctx.isearch {
            out.extend(self.isearch_prompt(isearch));
            return out;
        }
        if !ctx.arg_text.is_empty() {
            out.extend(self.arg_prompt(ctx.arg_text));
            return out;
        }
        out.push((StyleToken::Toolbar, "  ".to_string()));
        out.push((StyleToken::ToolbarMode, format!("{:9}", ctx.mode_tag)));
        out.push((StyleToken::Toolbar, " ".to_string()));
        let multiline = if ctx.multiline {
            (StyleToken::ToolbarOn, "[multiline on] ")
        } else {
            (StyleToken::ToolbarOff, "[multiline off]")
        };
        out.push((multiline.0, multiline.1.to_string()));
        if ctx.multiline {
            out.push((StyleToken::Toolbar, " [Esc+Enter] run".to_string()));
        }
        out.push((StyleToken::Toolbar, "  ".to_string()));
        out
    }
}

/// Enter accepts unless brackets are still open or the line ends with `\`.
pub fn wants_more_input(document: &core_text::Document<'_>) -> bool {
    if !document.cursor_at_the_end() {
        return false;
    }
    let before = document.text_before_cursor();
    if before.trim_end().ends_with('\\') {
        return true;
    }
    has_unclosed_brackets(before)
}

fn has_unclosed_brackets(text: &str) -> bool {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    for c in text.chars() {
        match c {
            '"' => in_string = !in_string,
            '(' | '[' | '{' if !in_string => stack.push(c),
            ')' | ']' | '}' if !in_string => {
                stack.pop();
            }
            _ => {}
        }
    }
    !stack.is_empty()
}
