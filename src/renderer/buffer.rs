//! Styled cell grid that paintable components draw into.

use crate::layout::char_width;
use crate::types::Rect;

bitflags::bitflags! {
    /// Text attributes. Combine with `|`: `Attr::BOLD | Attr::UNDERLINE`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attr: u8 {
        const NONE = 0;
        const BOLD = 1 << 0;
        const DIM = 1 << 1;
        const ITALIC = 1 << 2;
        const UNDERLINE = 1 << 3;
        const INVERSE = 1 << 4;
        const STRIKETHROUGH = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Terminal default.
    #[default]
    Reset,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CellStyle {
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attr,
}

impl CellStyle {
    pub fn fg(mut self, color: Color) -> Self {
        self.fg = color;
        self
    }

    pub fn bg(mut self, color: Color) -> Self {
        self.bg = color;
        self
    }

    pub fn attrs(mut self, attrs: Attr) -> Self {
        self.attrs = attrs;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub ch: char,
    pub style: CellStyle,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: CellStyle::default(),
        }
    }
}

/// Row-major grid of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl Buffer {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn area(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = cell;
        }
    }

    /// Write `text` starting at (x, y), clipped to the buffer and to
    /// `max_width` cells. Returns the number of cells used.
    pub fn set_string(&mut self, x: u16, y: u16, text: &str, style: CellStyle, max_width: u16) -> u16 {
        let mut used = 0u16;
        for ch in text.chars() {
            let w = char_width(ch);
            if w == 0 {
                continue;
            }
            if used.saturating_add(w) > max_width {
                break;
            }
            let cx = x.saturating_add(used);
            self.set(cx, y, Cell { ch, style });
            // Wide characters own the next cell too.
            if w == 2 {
                self.set(cx.saturating_add(1), y, Cell { ch: '\0', style });
            }
            used += w;
        }
        used
    }

    pub fn fill(&mut self, area: Rect, cell: Cell) {
        let Some(area) = area.intersect(&self.area()) else { return };
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                self.set(x, y, cell);
            }
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }

    /// One line of plain text per row (wide-char continuation cells skipped).
    pub fn to_lines(&self) -> Vec<String> {
        (0..self.height)
            .map(|y| {
                (0..self.width)
                    .filter_map(|x| self.get(x, y))
                    .filter(|c| c.ch != '\0')
                    .map(|c| c.ch)
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_string_clips() {
        let mut buf = Buffer::new(5, 1);
        let used = buf.set_string(1, 0, "hello", CellStyle::default(), 10);
        assert_eq!(used, 4);
        assert_eq!(buf.to_lines(), vec![" hell"]);
    }

    #[test]
    fn test_set_string_wide() {
        let mut buf = Buffer::new(6, 1);
        buf.set_string(0, 0, "日本x", CellStyle::default(), 6);
        assert_eq!(buf.get(0, 0).unwrap().ch, '日');
        assert_eq!(buf.get(1, 0).unwrap().ch, '\0');
        assert_eq!(buf.to_lines(), vec!["日本x "]);
    }

    #[test]
    fn test_fill_intersects() {
        let mut buf = Buffer::new(4, 2);
        let cell = Cell { ch: '#', style: CellStyle::default() };
        buf.fill(Rect::new(2, 1, 10, 10), cell);
        assert_eq!(buf.to_lines(), vec!["    ", "  ##"]);
        buf.clear();
        assert_eq!(buf.to_lines(), vec!["    ", "    "]);
    }

    #[test]
    fn test_out_of_bounds_ignored() {
        let mut buf = Buffer::new(2, 2);
        buf.set(5, 5, Cell::default());
        assert!(buf.get(2, 0).is_none());
    }
}
