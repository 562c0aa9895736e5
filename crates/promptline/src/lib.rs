//! Interactive terminal line editing.
//!
//! The building blocks live in the `core-*` crates; this facade wires them
//! into a [`CommandLine`]: construct one, plug in adapters for your
//! language (tokens, completions, prompt, style), and call
//! [`CommandLine::read_input`] in a loop, or [`CommandLine::start_repl`]
//! for the common shape.

mod commandline;

pub use commandline::{AcceptedDocument, CommandLine, OnAbort, OnExit, ReadError};
pub use core_actions::{DispatchOutcome, EmacsHandler, KeyHandler, ViHandler, ViMode};
pub use core_config::Config;
pub use core_events::{Key, KeyEvent};
pub use core_input::Decoder;
pub use core_render::{HighlightRegion, RenderContext, Renderer};
pub use core_state::{
    ClipboardData, ClipboardKind, EnterHook, FileHistory, History, Line, MemoryHistory, WordKind,
};
pub use core_syntax::{
    CellAttrs, CodeAdapter, Color, Completion, DefaultPrompt, DefaultStyle, HelpContext,
    IsearchDisplay, PlainCode, PromptAdapter, StyleSheet, StyleSpec, StyleToken, StyledText,
    mark_unbalanced_brackets,
};
pub use core_text::Document;
