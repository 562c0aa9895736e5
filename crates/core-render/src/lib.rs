//! Screen composition and differential VT100 painting.

pub mod codes;
pub mod palette;
pub mod renderer;
pub mod screen;

pub use palette::ColorCache;
pub use renderer::{HighlightRegion, RenderContext, Renderer};
pub use screen::Screen;
