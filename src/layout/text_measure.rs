//! Text Measurement
//!
//! Display width of text in terminal cells, via `unicode-width`:
//! - ASCII printable: 1 cell
//! - CJK and most emoji: 2 cells
//! - Combining marks and control characters: 0 cells

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::types::Size;

/// Width of a single line, saturating at `u16::MAX`.
pub fn string_width(s: &str) -> u16 {
    s.width().min(u16::MAX as usize) as u16
}

/// Width of one character. Control characters count as zero.
pub fn char_width(c: char) -> u16 {
    c.width().unwrap_or(0) as u16
}

/// Unwrapped size of text: widest line by number of lines.
///
/// Empty text measures as zero.
pub fn measure_text(text: &str) -> Size {
    if text.is_empty() {
        return Size::ZERO;
    }
    let mut width = 0u16;
    let mut height = 0u16;
    for line in text.split('\n') {
        width = width.max(string_width(line));
        height = height.saturating_add(1);
    }
    Size::new(width, height)
}

/// Cut text to fit `width` cells without splitting a wide character.
pub fn truncate_text(text: &str, width: u16) -> String {
    let mut out = String::new();
    let mut used = 0u16;
    for c in text.chars() {
        let w = char_width(c);
        if used.saturating_add(w) > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}
