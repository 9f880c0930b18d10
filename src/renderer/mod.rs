//! Renderer - cell grid and differential output
//!
//! Paintable components draw into a [`Buffer`]; [`DiffRenderer`] turns the
//! difference from the last frame into one ANSI string for the platform.

mod buffer;
mod diff;

pub use buffer::{Attr, Buffer, Cell, CellStyle, Color};
pub use diff::DiffRenderer;
