//! The demo language: a small calculator with variables.
//!
//! `let x = 2 * (3 + 4)` binds, a bare expression prints its value. The
//! lexer doubles as the display tokenizer, so the prompt shows keywords,
//! numbers, names, strings and comments in color and unbalanced brackets
//! in the error style.

use anyhow::{Result, anyhow, bail};
use core_syntax::{StyleToken, StyledText};
use std::collections::HashMap;

/// Lex `text` into styled runs covering every input byte. Brackets come
/// out as single-character tokens so the balance classifier can re-tag
/// them.
pub fn lex(text: &str) -> StyledText {
    let mut out = StyledText::new();
    let mut chars = text.char_indices().peekable();
    let push = |out: &mut StyledText, token: StyleToken, s: &str| {
        if !s.is_empty() {
            out.push((token, s.to_string()));
        }
    };
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            let end = scan(text, &mut chars, |c| c.is_whitespace());
            push(&mut out, StyleToken::Text, &text[start..end]);
        } else if c.is_ascii_digit() {
            let end = scan(text, &mut chars, |c| c.is_ascii_digit() || c == '.');
            push(&mut out, StyleToken::Number, &text[start..end]);
        } else if c.is_alphabetic() || c == '_' {
            let end = scan(text, &mut chars, |c| c.is_alphanumeric() || c == '_');
            let word = &text[start..end];
            let token = if word == "let" {
                StyleToken::Keyword
            } else {
                StyleToken::Name
            };
            push(&mut out, token, word);
        } else if c == '"' {
            chars.next();
            let mut end = start + 1;
            for (i, ch) in chars.by_ref() {
                end = i + ch.len_utf8();
                if ch == '"' {
                    break;
                }
            }
            push(&mut out, StyleToken::Str, &text[start..end]);
        } else if c == '#' {
            let end = scan(text, &mut chars, |c| c != '\n');
            push(&mut out, StyleToken::Comment, &text[start..end]);
        } else if "()[]{}".contains(c) {
            chars.next();
            push(&mut out, StyleToken::Operator, &text[start..start + c.len_utf8()]);
        } else if "+-*/%=<>!".contains(c) {
            let end = scan(text, &mut chars, |c| "+-*/%=<>!".contains(c));
            push(&mut out, StyleToken::Operator, &text[start..end]);
        } else {
            chars.next();
            push(&mut out, StyleToken::Error, &text[start..start + c.len_utf8()]);
        }
    }
    out
}

fn scan(
    text: &str,
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    keep: impl Fn(char) -> bool,
) -> usize {
    let mut end = text.len();
    while let Some(&(i, c)) = chars.peek() {
        if keep(c) {
            chars.next();
        } else {
            end = i;
            break;
        }
    }
    end
}

/// Identifiers known to the evaluator, newest binding last.
pub fn known_names(vars: &HashMap<String, f64>) -> Vec<String> {
    let mut names: Vec<String> = vars.keys().cloned().collect();
    names.sort();
    names.push("let".to_string());
    names
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Number(f64),
    Ident(String),
    Op(char),
}

fn eval_tokens(text: &str) -> Result<Vec<Tok>> {
    let mut toks = Vec::new();
    for (token, run) in lex(text) {
        match token {
            StyleToken::Text | StyleToken::Comment => {}
            StyleToken::Number => toks.push(Tok::Number(
                run.parse().map_err(|_| anyhow!("bad number {run:?}"))?,
            )),
            StyleToken::Keyword | StyleToken::Name => toks.push(Tok::Ident(run)),
            StyleToken::Operator => {
                for c in run.chars() {
                    toks.push(Tok::Op(c));
                }
            }
            _ => bail!("unexpected input {run:?}"),
        }
    }
    Ok(toks)
}

struct Parser<'a> {
    toks: &'a [Tok],
    pos: usize,
    vars: &'a HashMap<String, f64>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn eat_op(&mut self, op: char) -> bool {
        if self.peek() == Some(&Tok::Op(op)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expr(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        loop {
            if self.eat_op('+') {
                value += self.term()?;
            } else if self.eat_op('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.factor()?;
        loop {
            if self.eat_op('*') {
                value *= self.factor()?;
            } else if self.eat_op('/') {
                value /= self.factor()?;
            } else if self.eat_op('%') {
                value %= self.factor()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn factor(&mut self) -> Result<f64> {
        if self.eat_op('-') {
            return Ok(-self.factor()?);
        }
        if self.eat_op('(') {
            let value = self.expr()?;
            if !self.eat_op(')') {
                bail!("missing closing parenthesis");
            }
            return Ok(value);
        }
        match self.peek().cloned() {
            Some(Tok::Number(n)) => {
                self.pos += 1;
                Ok(n)
            }
            Some(Tok::Ident(name)) => {
                self.pos += 1;
                self.vars
                    .get(&name)
                    .copied()
                    .ok_or_else(|| anyhow!("unknown name {name:?}"))
            }
            other => bail!("expected a value, found {other:?}"),
        }
    }
}

/// Evaluate one input. Returns the printed value, `None` for bindings and
/// blank input.
pub fn evaluate(text: &str, vars: &mut HashMap<String, f64>) -> Result<Option<f64>> {
    let mut result = None;
    for line in text.lines() {
        result = evaluate_line(line, vars)?;
    }
    Ok(result)
}

fn evaluate_line(line: &str, vars: &mut HashMap<String, f64>) -> Result<Option<f64>> {
    let toks = eval_tokens(line)?;
    if toks.is_empty() {
        return Ok(None);
    }
    // `let name = expr` binds; everything else evaluates.
    if let [Tok::Ident(kw), Tok::Ident(name), Tok::Op('='), rest @ ..] = toks.as_slice() {
        if kw == "let" {
            let mut parser = Parser {
                toks: rest,
                pos: 0,
                vars,
            };
            let value = parser.expr()?;
            if parser.pos != rest.len() {
                bail!("trailing input after expression");
            }
            vars.insert(name.clone(), value);
            return Ok(None);
        }
    }
    let mut parser = Parser {
        toks: &toks,
        pos: 0,
        vars,
    };
    let value = parser.expr()?;
    if parser.pos != toks.len() {
        bail!("trailing input after expression");
    }
    Ok(Some(value))
}
