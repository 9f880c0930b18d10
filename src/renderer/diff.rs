//! Differential renderer.
//!
//! Compares the new frame to the previous one and only emits cells that
//! changed. The output is one ANSI string per frame, handed to
//! `Platform::write_string` in a single call.
//!
//! # Algorithm
//!
//! 1. Wrap output in a synchronized-update block
//! 2. For each cell: skip it if the previous frame has the same cell,
//!    otherwise move the cursor (only when not already there) and write it
//!    with the minimal SGR change
//! 3. Store the frame for the next comparison
//!
//! A size change, or [`DiffRenderer::invalidate`], forces a full redraw.

use std::fmt::Write;

use super::buffer::{Attr, Buffer, Cell, CellStyle, Color};

const BEGIN_SYNC: &str = "\x1b[?2026h";
const END_SYNC: &str = "\x1b[?2026l";

pub struct DiffRenderer {
    previous: Option<Buffer>,
}

impl DiffRenderer {
    pub fn new() -> Self {
        Self { previous: None }
    }

    /// Render `buffer`, returning the escape sequence to write, or `None`
    /// when nothing changed.
    pub fn render(&mut self, buffer: &Buffer) -> Option<String> {
        let full = !matches!(
            &self.previous,
            Some(prev) if prev.width() == buffer.width() && prev.height() == buffer.height()
        );

        let mut out = String::new();
        let mut cursor: Option<(u16, u16)> = None;
        let mut style: Option<CellStyle> = None;
        let mut changed = false;

        for y in 0..buffer.height() {
            for x in 0..buffer.width() {
                let Some(cell) = buffer.get(x, y) else { continue };
                if cell.ch == '\0' {
                    // Continuation of a wide character; already written.
                    continue;
                }
                if !full {
                    let prev = self.previous.as_ref().and_then(|p| p.get(x, y));
                    if prev == Some(cell) {
                        continue;
                    }
                }
                if !changed {
                    out.push_str(BEGIN_SYNC);
                    if full {
                        out.push_str("\x1b[0m\x1b[2J");
                    }
                    changed = true;
                }
                if cursor != Some((x, y)) {
                    let _ = write!(out, "\x1b[{};{}H", y + 1, x + 1);
                }
                if style != Some(cell.style) {
                    push_style(&mut out, &cell.style);
                    style = Some(cell.style);
                }
                out.push(cell.ch);
                let w = crate::layout::char_width(cell.ch).max(1);
                cursor = Some((x + w, y));
            }
        }

        self.previous = Some(buffer.clone());
        if !changed {
            return None;
        }
        out.push_str("\x1b[0m");
        out.push_str(END_SYNC);
        Some(out)
    }

    /// Forget the previous frame so the next render is a full redraw.
    pub fn invalidate(&mut self) {
        self.previous = None;
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }
}

impl Default for DiffRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn push_style(out: &mut String, style: &CellStyle) {
    out.push_str("\x1b[0");
    for (flag, code) in [
        (Attr::BOLD, "1"),
        (Attr::DIM, "2"),
        (Attr::ITALIC, "3"),
        (Attr::UNDERLINE, "4"),
        (Attr::INVERSE, "7"),
        (Attr::STRIKETHROUGH, "9"),
    ] {
        if style.attrs.contains(flag) {
            out.push(';');
            out.push_str(code);
        }
    }
    push_color(out, style.fg, 38);
    push_color(out, style.bg, 48);
    out.push('m');
}

fn push_color(out: &mut String, color: Color, base: u8) {
    match color {
        Color::Reset => {}
        Color::Indexed(i) => {
            let _ = write!(out, ";{base};5;{i}");
        }
        Color::Rgb(r, g, b) => {
            let _ = write!(out, ";{base};2;{r};{g};{b}");
        }
    }
}
