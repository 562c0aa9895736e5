//! VT100 escape codes emitted by the renderer.

pub const ERASE_SCREEN: &str = "\x1b[2J";
pub const ERASE_END_OF_LINE: &str = "\x1b[K";
pub const ERASE_DOWN: &str = "\x1b[J";
pub const CARRIAGE_RETURN: &str = "\r";
pub const NEWLINE: &str = "\n";
pub const CRLF: &str = "\r\n";
pub const HIDE_CURSOR: &str = "\x1b[?25l";
pub const DISPLAY_CURSOR: &str = "\x1b[?25h";
pub const RESET_ATTRIBUTES: &str = "\x1b[0m";

/// Absolute cursor placement (1-based on the wire; callers pass 0-based).
pub fn cursor_goto(row: usize, column: usize) -> String {
    format!("\x1b[{};{}H", row, column)
}

fn cursor_move(amount: usize, suffix: char) -> String {
    match amount {
        0 => String::new(),
        1 => format!("\x1b[{suffix}"),
        n => format!("\x1b[{n}{suffix}"),
    }
}

pub fn cursor_up(amount: usize) -> String {
    cursor_move(amount, 'A')
}

pub fn cursor_down(amount: usize) -> String {
    cursor_move(amount, 'B')
}

pub fn cursor_forward(amount: usize) -> String {
    cursor_move(amount, 'C')
}

pub fn cursor_backward(amount: usize) -> String {
    cursor_move(amount, 'D')
}
