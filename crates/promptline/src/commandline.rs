//! The read loop: decode → dispatch → render, once per keystroke.

use core_actions::{DispatchOutcome, EmacsHandler, KeyHandler, ViHandler};
use core_events::KeyEvent;
use core_input::Decoder;
use core_render::{RenderContext, Renderer};
use core_state::{EnterHook, History, Line, MemoryHistory};
use core_syntax::{
    CodeAdapter, DefaultPrompt, DefaultStyle, HelpContext, PlainCode, PromptAdapter, StyleSheet,
};
use core_terminal::{RawModeGuard, StdinBytes, poll_stdin};
use core_text::Document;
use std::cell::RefCell;
use std::io::{self, Write};
use std::process::Command;
use std::rc::Rc;
use std::time::Duration;
use std::{env, fs};
use tracing::{debug, warn};

/// Forces the compiler to infer `f` as higher-ranked over the `Document`
/// lifetime, matching `EnterHook`'s signature instead of a single concrete
/// lifetime picked from the closure body.
fn force_enter_hook<F>(f: F) -> F
where
    F: for<'r, 's> FnMut(&'r Document<'s>) -> bool,
{
    f
}

/// Window for telling a lone ESC from the head of an escape sequence.
const ESCAPE_TIMEOUT: Duration = Duration::from_millis(50);

/// What `read_input` does when the user aborts with ctrl_c.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnAbort {
    /// Propagate [`ReadError::Abort`].
    Raise,
    /// Return `Ok(None)`.
    ReturnNone,
    /// Restart with a fresh line.
    Retry,
}

/// What `read_input` does when the user exits with ctrl_d on an empty line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnExit {
    /// Propagate [`ReadError::Exit`].
    Raise,
    /// Return `Ok(None)`.
    ReturnNone,
}

/// The only errors that cross the `read_input` boundary.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("input aborted")]
    Abort,
    #[error("exit requested")]
    Exit,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("terminal failure: {0}")]
    Terminal(anyhow::Error),
}

/// Owned snapshot of an accepted buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedDocument {
    pub text: String,
    pub cursor_position: usize,
}

impl AcceptedDocument {
    pub fn document(&self) -> Document<'_> {
        Document::new(&self.text, self.cursor_position)
    }
}

/// Owns the terminal for a sequence of prompts.
pub struct CommandLine {
    history: Rc<RefCell<dyn History>>,
    code: Rc<dyn CodeAdapter>,
    prompt: Rc<dyn PromptAdapter>,
    style: Rc<dyn StyleSheet>,
    renderer: Renderer<io::Stdout>,
    decoder: Decoder,
    reader: StdinBytes,
    enter_hook: Option<Rc<dyn Fn(&Document<'_>) -> bool>>,
    pub vi_mode: bool,
    pub multiline: bool,
    pub auto_indent: bool,
    pub highlight_current_line: bool,
}

impl Default for CommandLine {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandLine {
    pub fn new() -> Self {
        let style: Rc<dyn StyleSheet> = Rc::new(DefaultStyle);
        Self {
            history: Rc::new(RefCell::new(MemoryHistory::new())),
            code: Rc::new(PlainCode),
            prompt: Rc::new(DefaultPrompt::default()),
            style: Rc::clone(&style),
            renderer: Renderer::new(io::stdout(), style),
            decoder: Decoder::new(),
            reader: StdinBytes::new(),
            enter_hook: None,
            vi_mode: false,
            multiline: false,
            auto_indent: true,
            highlight_current_line: false,
        }
    }

    pub fn with_history(mut self, history: Rc<RefCell<dyn History>>) -> Self {
        self.history = history;
        self
    }

    pub fn with_code(mut self, code: Rc<dyn CodeAdapter>) -> Self {
        self.code = code;
        self
    }

    pub fn with_prompt(mut self, prompt: Rc<dyn PromptAdapter>) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_style(mut self, style: Rc<dyn StyleSheet>) -> Self {
        self.style = Rc::clone(&style);
        self.renderer = Renderer::new(io::stdout(), style);
        self
    }

    /// Install the language-aware enter behavior applied to every line.
    pub fn with_enter_hook(mut self, hook: impl Fn(&Document<'_>) -> bool + 'static) -> Self {
        self.enter_hook = Some(Rc::new(hook));
        self
    }

    /// Read one line from the user.
    ///
    /// Returns the accepted document, `Ok(None)` under the return-none
    /// policies, or a [`ReadError`]. Raw mode is restored on every path.
    pub fn read_input(
        &mut self,
        on_abort: OnAbort,
        on_exit: OnExit,
    ) -> Result<Option<AcceptedDocument>, ReadError> {
        loop {
            match self.read_once()? {
                LineOutcome::Accepted(doc) => return Ok(Some(doc)),
                LineOutcome::Aborted => match on_abort {
                    OnAbort::Raise => return Err(ReadError::Abort),
                    OnAbort::ReturnNone => return Ok(None),
                    OnAbort::Retry => continue,
                },
                LineOutcome::Exited => match on_exit {
                    OnExit::Raise => return Err(ReadError::Exit),
                    OnExit::ReturnNone => return Ok(None),
                },
            }
        }
    }

    /// Drive prompts until exit, handing each accepted line to `on_line`.
    pub fn start_repl(&mut self, mut on_line: impl FnMut(&str)) -> Result<(), ReadError> {
        loop {
            match self.read_input(OnAbort::Retry, OnExit::ReturnNone)? {
                Some(doc) => {
                    if !doc.text.trim().is_empty() {
                        on_line(&doc.text);
                    }
                }
                None => return Ok(()),
            }
        }
    }

    fn read_once(&mut self) -> Result<LineOutcome, ReadError> {
        let mut guard = RawModeGuard::new().map_err(ReadError::Terminal)?;
        let mut line = Line::new(Rc::clone(&self.history), Rc::clone(&self.code));
        line.multiline = self.multiline;
        line.auto_indent = self.auto_indent;
        if let Some(hook) = &self.enter_hook {
            let hook = Rc::clone(hook);
            line.set_enter_hook(Box::new(force_enter_hook(move |doc| hook(doc))) as EnterHook);
        }
        let mut handler: Box<dyn KeyHandler> = if self.vi_mode {
            Box::new(ViHandler::new())
        } else {
            Box::new(EmacsHandler::new())
        };

        self.renderer.invalidate();
        self.render_line(&line, handler.mode_tag(), false, false)?;

        let mut buffer = [0u8; 1024];
        loop {
            let n = self.reader.read_chunk(&mut buffer)?;
            if n == 0 {
                debug!(target: "runtime", "stdin_eof");
                self.render_line(&line, handler.mode_tag(), false, true)?;
                return Ok(LineOutcome::Exited);
            }
            let mut events: Vec<KeyEvent> = Vec::new();
            self.decoder.feed(&buffer[..n], &mut |e| events.push(e));
            if self.decoder.is_pending() && !poll_stdin(ESCAPE_TIMEOUT)? {
                self.decoder.flush(&mut |e| events.push(e));
            }
            for event in events {
                match handler.dispatch(event, &mut line) {
                    DispatchOutcome::Continue => {
                        self.render_line(&line, handler.mode_tag(), false, false)?;
                    }
                    DispatchOutcome::Accept(text) => {
                        self.render_line(&line, handler.mode_tag(), true, false)?;
                        if let Err(error) = self.history.borrow_mut().append(&text) {
                            warn!(target: "runtime", %error, "history_append_failed");
                        }
                        let cursor_position = line.cursor_position();
                        return Ok(LineOutcome::Accepted(AcceptedDocument {
                            text,
                            cursor_position,
                        }));
                    }
                    DispatchOutcome::Abort => {
                        self.render_line(&line, handler.mode_tag(), false, true)?;
                        return Ok(LineOutcome::Aborted);
                    }
                    DispatchOutcome::Exit => {
                        self.render_line(&line, handler.mode_tag(), false, true)?;
                        return Ok(LineOutcome::Exited);
                    }
                    DispatchOutcome::ClearScreen => {
                        self.renderer.clear().map_err(ReadError::Terminal)?;
                        self.render_line(&line, handler.mode_tag(), false, false)?;
                    }
                    DispatchOutcome::ListCompletions(completions) => {
                        self.renderer
                            .render_completions(&completions)
                            .map_err(ReadError::Terminal)?;
                        self.render_line(&line, handler.mode_tag(), false, false)?;
                    }
                    DispatchOutcome::OpenEditor => {
                        self.open_in_editor(&mut guard, &mut line)?;
                        self.renderer.invalidate();
                        self.render_line(&line, handler.mode_tag(), false, false)?;
                    }
                }
            }
        }
    }

    fn render_line(
        &mut self,
        line: &Line,
        mode_tag: &str,
        accept: bool,
        abort: bool,
    ) -> Result<(), ReadError> {
        let tokens = line.code_tokens();
        let help = HelpContext {
            mode_tag,
            multiline: line.multiline,
            paste_mode: line.paste_mode,
            isearch: line.isearch_display(),
            arg_text: line.arg_prompt_text(),
        };
        let context = RenderContext {
            code_tokens: &tokens,
            prompt: &*self.prompt,
            document: line.document(),
            help,
            accept,
            abort,
            highlight_current_line: self.highlight_current_line,
            highlight_regions: &[],
        };
        self.renderer.render(&context).map_err(ReadError::Terminal)
    }

    /// Suspend raw mode, hand the buffer to `$EDITOR`, and read it back.
    fn open_in_editor(
        &mut self,
        guard: &mut RawModeGuard,
        line: &mut Line,
    ) -> Result<(), ReadError> {
        let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
        let mut file = tempfile::Builder::new()
            .prefix("promptline-")
            .suffix(".txt")
            .tempfile()?;
        file.write_all(line.text().as_bytes())?;
        file.flush()?;

        guard.suspend().map_err(ReadError::Terminal)?;
        let status = Command::new(&editor).arg(file.path()).status();
        guard.resume().map_err(ReadError::Terminal)?;

        match status {
            Ok(status) if status.success() => {
                let mut content = fs::read_to_string(file.path())?;
                if content.ends_with('\n') {
                    content.pop();
                }
                line.set_text(content);
            }
            Ok(status) => {
                warn!(target: "runtime", editor = %editor, ?status, "editor_exited_nonzero");
            }
            Err(error) => {
                warn!(target: "runtime", editor = %editor, %error, "editor_spawn_failed");
            }
        }
        Ok(())
    }
}

enum LineOutcome {
    Accepted(AcceptedDocument),
    Aborted,
    Exited,
}
