//! RGB → xterm-256 palette mapping.
//!
//! The lookup table (6x6x6 color cube plus the 24-step gray ramp; the 16
//! system colors are skipped because their values vary between terminals)
//! is built on first use and owned by the renderer; resolved indices are
//! memoized per RGB value.

use ahash::AHashMap;
use core_syntax::{CellAttrs, Color, StyleSpec};

const CUBE_STEPS: [u8; 6] = [0x00, 0x5f, 0x87, 0xaf, 0xd7, 0xff];

/// Lazily built color table with a memo of resolved indices.
#[derive(Debug, Default)]
pub struct ColorCache {
    table: Vec<(u8, (u8, u8, u8))>,
    memo: AHashMap<Color, u8>,
}

impl ColorCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_table(&mut self) {
        if !self.table.is_empty() {
            return;
        }
        self.table.reserve(240);
        for (ri, r) in CUBE_STEPS.iter().enumerate() {
            for (gi, g) in CUBE_STEPS.iter().enumerate() {
                for (bi, b) in CUBE_STEPS.iter().enumerate() {
                    let index = 16 + 36 * ri + 6 * gi + bi;
                    self.table.push((index as u8, (*r, *g, *b)));
                }
            }
        }
        for i in 0..24u8 {
            let v = 8 + i * 10;
            self.table.push((232 + i, (v, v, v)));
        }
    }

    /// Nearest palette index by squared RGB distance.
    pub fn index_for(&mut self, color: Color) -> u8 {
        if let Some(&index) = self.memo.get(&color) {
            return index;
        }
        self.ensure_table();
        let mut best = (u32::MAX, 0u8);
        for &(index, (r, g, b)) in &self.table {
            let dr = i32::from(color.r) - i32::from(r);
            let dg = i32::from(color.g) - i32::from(g);
            let db = i32::from(color.b) - i32::from(b);
            let dist = (dr * dr + dg * dg + db * db) as u32;
            if dist < best.0 {
                best = (dist, index);
            }
        }
        self.memo.insert(color, best.1);
        best.1
    }

    /// SGR prefix selecting the style's colors and attributes.
    pub fn color_string(&mut self, spec: &StyleSpec) -> String {
        let mut out = String::new();
        if let Some(fg) = spec.fg {
            out.push_str(&format!("\x1b[38;5;{}m", self.index_for(fg)));
        }
        if let Some(bg) = spec.bg {
            out.push_str(&format!("\x1b[48;5;{}m", self.index_for(bg)));
        }
        if spec.attrs.contains(CellAttrs::BOLD) {
            out.push_str("\x1b[1m");
        }
        if spec.attrs.contains(CellAttrs::UNDERLINE) {
            out.push_str("\x1b[4m");
        }
        out
    }
}
