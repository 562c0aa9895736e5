//! Key event types shared by the decoder and the key handlers.
//!
//! One decoded atomic user action is a [`KeyEvent`]: either a named key or a
//! printable scalar. Control keys carry their letter (`Key::Ctrl('a')` for
//! ctrl_a); tab, enter and carriage return arrive as `ctrl_i`, `ctrl_j` and
//! `ctrl_m`, which the handlers alias where needed.

use std::fmt;

/// A named (non-printable) key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// ctrl_a .. ctrl_z, stored as the lowercase letter.
    Ctrl(char),
    CtrlUnderscore,
    Escape,
    Backspace,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    /// F1 .. F12.
    F(u8),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Ctrl(c) => write!(f, "ctrl_{c}"),
            Key::CtrlUnderscore => write!(f, "ctrl_underscore"),
            Key::Escape => write!(f, "escape"),
            Key::Backspace => write!(f, "backspace"),
            Key::Delete => write!(f, "delete"),
            Key::Home => write!(f, "home"),
            Key::End => write!(f, "end"),
            Key::PageUp => write!(f, "page_up"),
            Key::PageDown => write!(f, "page_down"),
            Key::Up => write!(f, "arrow_up"),
            Key::Down => write!(f, "arrow_down"),
            Key::Left => write!(f, "arrow_left"),
            Key::Right => write!(f, "arrow_right"),
            Key::F(n) => write!(f, "F{n}"),
        }
    }
}

/// One decoded user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEvent {
    Key(Key),
    Char(char),
}

impl KeyEvent {
    pub fn ctrl(c: char) -> Self {
        KeyEvent::Key(Key::Ctrl(c))
    }

    pub fn is_enter(&self) -> bool {
        matches!(self, KeyEvent::Key(Key::Ctrl('j' | 'm')))
    }

    pub fn is_tab(&self) -> bool {
        matches!(self, KeyEvent::Key(Key::Ctrl('i')))
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyEvent::Key(k) => k.fmt(f),
            KeyEvent::Char(c) => write!(f, "{c:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names() {
        assert_eq!(Key::Ctrl('a').to_string(), "ctrl_a");
        assert_eq!(Key::CtrlUnderscore.to_string(), "ctrl_underscore");
        assert_eq!(Key::F(5).to_string(), "F5");
        assert_eq!(Key::Up.to_string(), "arrow_up");
    }

    #[test]
    fn enter_and_tab_aliases() {
        assert!(KeyEvent::ctrl('j').is_enter());
        assert!(KeyEvent::ctrl('m').is_enter());
        assert!(KeyEvent::ctrl('i').is_tab());
        assert!(!KeyEvent::Char('i').is_tab());
    }
}
