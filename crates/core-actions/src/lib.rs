//! Key handlers: map decoded key events onto edit-buffer operations.
//!
//! Dispatch is result-valued: every handled event yields a
//! [`DispatchOutcome`] and nothing else escapes a handler, so a misbehaving
//! binding can never wedge the read loop. The orchestrator matches on the
//! outcome; `Continue` means "repaint and read on".

use core_events::KeyEvent;
use core_state::Line;
use core_syntax::Completion;

mod common;
pub mod emacs;
pub mod vi;

pub use emacs::EmacsHandler;
pub use vi::{ViHandler, ViMode};

/// Result of dispatching a single key event.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Keep reading input.
    Continue,
    /// The user accepted the line.
    Accept(String),
    /// The user cancelled the line (ctrl_c).
    Abort,
    /// The user asked to leave (ctrl_d on an empty line).
    Exit,
    /// Erase the screen and repaint (ctrl_l); the buffer is untouched.
    ClearScreen,
    /// Print the completion candidates below the prompt (second tab).
    ListCompletions(Vec<Completion>),
    /// Suspend the terminal and edit the buffer in `$EDITOR`.
    OpenEditor,
}

impl DispatchOutcome {
    /// True for the outcomes that end the current `read_input` call.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchOutcome::Accept(_) | DispatchOutcome::Abort | DispatchOutcome::Exit
        )
    }
}

/// A keybinding flavor driving one [`Line`] for the duration of a
/// `read_input` call.
pub trait KeyHandler {
    fn dispatch(&mut self, event: KeyEvent, line: &mut Line) -> DispatchOutcome;

    /// Short tag for the toolbar, e.g. `(emacs)` or `(NAV)`.
    fn mode_tag(&self) -> &'static str;
}
