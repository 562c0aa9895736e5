//! End-to-end scenarios: raw terminal bytes through the decoder into a key
//! handler driving a line, with the renderer painting frames.

use promptline::{
    CodeAdapter, CommandLine, Completion, Decoder, DefaultPrompt, DispatchOutcome, Document,
    EmacsHandler, HelpContext, KeyEvent, KeyHandler, Line, MemoryHistory, PlainCode,
    RenderContext, Renderer, StyleSheet, StyleSpec, StyleToken, ViHandler,
};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

struct NoStyle;
impl StyleSheet for NoStyle {
    fn style_for_token(&self, _token: StyleToken) -> Option<StyleSpec> {
        None
    }
}

fn decode(bytes: &[u8]) -> Vec<KeyEvent> {
    let mut decoder = Decoder::new();
    let mut events = Vec::new();
    decoder.feed(bytes, &mut |e| events.push(e));
    decoder.flush(&mut |e| events.push(e));
    events
}

fn new_line(entries: &[&str]) -> Line {
    Line::new(
        Rc::new(RefCell::new(MemoryHistory::with_entries(
            entries.iter().copied(),
        ))),
        Rc::new(PlainCode),
    )
}

fn drive(handler: &mut dyn KeyHandler, line: &mut Line, bytes: &[u8]) -> DispatchOutcome {
    let mut last = DispatchOutcome::Continue;
    for event in decode(bytes) {
        last = handler.dispatch(event, line);
    }
    last
}

#[test]
fn emacs_insert_then_undo() {
    let mut handler = EmacsHandler::new();
    let mut line = new_line(&[]);
    drive(&mut handler, &mut line, b"hello\x1f");
    assert_eq!(line.text(), "");
    assert_eq!(line.cursor_position(), 0);
}

#[test]
fn vi_word_motion_with_count() {
    let mut handler = ViHandler::new();
    let mut line = new_line(&[]);
    drive(&mut handler, &mut line, b"one two three four");
    line.set_cursor_position(0);
    // ESC then `3w`.
    drive(&mut handler, &mut line, b"\x1b3w");
    assert_eq!(line.cursor_position(), 14);
    assert_eq!(handler.mode_tag(), "(NAV)");
}

#[test]
fn auto_indent_newline() {
    let mut handler = EmacsHandler::new();
    let mut line = new_line(&[]);
    line.auto_indent = true;
    line.multiline = true;
    drive(&mut handler, &mut line, b"    if True:");
    let outcome = drive(&mut handler, &mut line, b"\r");
    assert_eq!(outcome, DispatchOutcome::Continue);
    assert_eq!(line.text(), "    if True:\n        ");
    assert_eq!(line.cursor_position(), 21);
}

#[test]
fn history_prefix_up_down() {
    // Most recent entry last: recalling walks alpha, then algol.
    let mut handler = EmacsHandler::new();
    let mut line = new_line(&["algol", "beta", "alpha"]);
    drive(&mut handler, &mut line, b"al");
    drive(&mut handler, &mut line, b"\x10\x10\x0e");
    assert_eq!(line.text(), "alpha");
}

#[test]
fn isearch_cancel_restores_line() {
    let mut handler = EmacsHandler::new();
    let mut line = new_line(&["banana", "apple"]);
    drive(&mut handler, &mut line, b"hello");
    drive(&mut handler, &mut line, b"\x12a\x07");
    assert_eq!(line.text(), "hello");
    assert_eq!(line.cursor_position(), 5);
    assert!(!line.in_isearch());
}

#[test]
fn accept_returns_text_through_outcome() {
    let mut handler = EmacsHandler::new();
    let mut line = new_line(&[]);
    let outcome = drive(&mut handler, &mut line, b"print(1)\r");
    assert_eq!(outcome, DispatchOutcome::Accept("print(1)".to_string()));
}

#[test]
fn vi_arrow_keys_work_in_insert_mode() {
    let mut handler = ViHandler::new();
    let mut line = new_line(&[]);
    drive(&mut handler, &mut line, b"abc");
    drive(&mut handler, &mut line, b"\x1b[D\x1b[D");
    assert_eq!(line.cursor_position(), 1);
    drive(&mut handler, &mut line, b"X");
    assert_eq!(line.text(), "aXbc");
}

#[test]
fn bracket_errors_reach_the_screen() {
    // The code adapter classifies unbalanced brackets; the painted frame
    // carries the error style at input columns 2 and 3.
    struct Brackets;
    impl CodeAdapter for Brackets {
        fn tokens(&self, text: &str) -> anyhow::Result<promptline::StyledText> {
            Ok(promptline::mark_unbalanced_brackets(
                text.chars()
                    .map(|c| (StyleToken::Operator, c.to_string()))
                    .collect(),
            ))
        }
        fn completions(
            &self,
            _text: &str,
            _cursor_position: usize,
        ) -> anyhow::Result<Vec<Completion>> {
            Ok(Vec::new())
        }
    }
    let tokens = Brackets.tokens("([)]").unwrap();
    assert_eq!(tokens[2].0, StyleToken::Error);
    assert_eq!(tokens[3].0, StyleToken::Error);

    struct ErrorOnly;
    impl StyleSheet for ErrorOnly {
        fn style_for_token(&self, token: StyleToken) -> Option<StyleSpec> {
            (token == StyleToken::Error)
                .then(|| StyleSpec::fg(promptline::Color::rgb(0xff, 0, 0)))
        }
    }
    let mut renderer = Renderer::new(Vec::new(), Rc::new(ErrorOnly)).with_columns(40);
    let prompt = DefaultPrompt::new("");
    let context = RenderContext {
        code_tokens: &tokens,
        prompt: &prompt,
        document: Document::new("([)]", 4),
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
    };
    let frame = renderer.render_to_string(&context);
    let styled = frame.matches("\x1b[38;5;").count();
    assert_eq!(styled, 2);
    let plain_prefix = frame.find('(').unwrap();
    assert!(frame[..plain_prefix].find("38;5;").is_none());
}

#[test]
fn rerender_without_changes_is_free() {
    let mut renderer = Renderer::new(Vec::new(), Rc::new(NoStyle)).with_columns(40);
    let prompt = DefaultPrompt::default();
    let tokens = vec![(StyleToken::Text, "steady".to_string())];
    let help = HelpContext {
        mode_tag: "(emacs)",
        multiline: false,
        paste_mode: false,
        isearch: None,
        arg_text: "",
    };
    let context = RenderContext {
        code_tokens: &tokens,
        prompt: &prompt,
        document: Document::new("steady", 6),
        help,
        accept: false,
        abort: false,
        highlight_current_line: false,
        highlight_regions: &[],
    };
    let first = renderer.render_to_string(&context);
    assert!(!first.is_empty());
    let second = renderer.render_to_string(&context);
    assert_eq!(second, "");
}

#[test]
fn command_line_builds_with_custom_adapters() {
    // Construction-only smoke test; the interactive loop needs a tty.
    let _cl = CommandLine::new()
        .with_code(Rc::new(PlainCode))
        .with_prompt(Rc::new(DefaultPrompt::new(">>> ")))
        .with_enter_hook(|doc| doc.text_before_cursor().ends_with('\\'));
}
