//! Escape sequence decoder for terminal input.
//!
//! Turns raw stdin bytes into platform-neutral [`RawInput`] events:
//! - Control bytes (Enter, Tab, Backspace, Ctrl+letter)
//! - CSI sequences (arrows, Home/End, Insert/Delete, PageUp/Down, F1-F12,
//!   modifier-qualified forms such as `ESC [ 1 ; 5 A`)
//! - SS3 sequences (F1-F4 and application-mode arrows)
//! - Legacy X10 mouse (`ESC [ M Cb Cx Cy`, fixed length)
//! - SGR mouse (`ESC [ < Pb ; Px ; Py M/m`, variable length)
//! - Kitty keyboard protocol (`CSI codepoint ; mods ; state u`)
//! - Bracketed paste, focus in/out reports, Alt+key, UTF-8
//!
//! Sequences split across reads are held until more bytes arrive. A sequence
//! that still has no terminator after [`MAX_LOOKAHEAD`] bytes is discarded.
//! Bracketed paste bodies are held up to [`MAX_PASTE`] bytes.

use serde::{Deserialize, Serialize};

use crate::types::Size;

/// Longest escape sequence we are willing to buffer while waiting for its final byte.
pub const MAX_LOOKAHEAD: usize = 32;

/// Largest bracketed paste body held while waiting for its end marker.
pub const MAX_PASTE: usize = 1 << 20;

const PASTE_START: &[u8] = b"\x1b[200~";
const PASTE_END: &[u8] = b"\x1b[201~";

// =============================================================================
// Types
// =============================================================================

/// A decoded input event, free of any UI meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawInput {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(Size),
    Paste(String),
    Focus(bool),
    Signal(SignalKind),
}

/// Process-level signals surfaced by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    Interrupt,
    Terminate,
    Suspend,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifier,
    pub state: KeyState,
}

impl KeyEvent {
    pub fn new(code: KeyCode, modifiers: Modifier) -> Self {
        Self {
            code,
            modifiers,
            state: KeyState::Press,
        }
    }

    pub fn is_press(&self) -> bool {
        self.state != KeyState::Release
    }
}

/// Key state (Kitty keyboard protocol reports repeats and releases).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Press,
    Repeat,
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Char(char),
    Enter,
    Tab,
    Backspace,
    Escape,
    Delete,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    F(u8),
    Null,
}

bitflags::bitflags! {
    /// Keyboard modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Modifier: u8 {
        const NONE  = 0;
        const SHIFT = 1 << 0;
        const ALT   = 1 << 1;
        const CTRL  = 1 << 2;
        const SUPER = 1 << 3;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseEvent {
    pub kind: MouseKind,
    pub x: u16,
    pub y: u16,
    pub modifiers: Modifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseKind {
    Press(MouseButton),
    Release(MouseButton),
    Move,
    ScrollUp,
    ScrollDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

// =============================================================================
// Decoder
// =============================================================================

/// Incremental decoder. Feed it whatever the platform read returned.
#[derive(Debug)]
pub struct InputDecoder {
    pending: Vec<u8>,
}

impl InputDecoder {
    pub fn new() -> Self {
        Self { pending: Vec::with_capacity(64) }
    }

    /// Decode as many complete events as the buffered bytes allow.
    /// Incomplete trailing sequences stay buffered for the next call.
    pub fn feed(&mut self, data: &[u8]) -> Vec<RawInput> {
        self.pending.extend_from_slice(data);
        let mut events = Vec::new();

        while !self.pending.is_empty() {
            match self.next_step() {
                Step::Event(ev) => events.push(ev),
                Step::Skip => {}
                Step::Incomplete => break,
            }
        }

        events
    }

    /// True when bytes are held waiting for the rest of a sequence.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Resolve held bytes after the poll timeout expired with no more input.
    ///
    /// Only a lone ESC (the Escape key) or ESC plus one printable byte (Alt+key)
    /// is resolved here. Longer partial sequences such as an open paste or a
    /// CSI missing its final byte stay pending until more bytes arrive.
    pub fn flush_pending(&mut self) -> Vec<RawInput> {
        let code = match self.pending.as_slice() {
            [0x1B] => key(KeyCode::Escape, Modifier::NONE),
            [0x1B, b @ 0x20..=0x7E] => {
                key(KeyCode::Char(*b as char), Modifier::ALT)
            }
            _ => return Vec::new(),
        };
        self.pending.clear();
        vec![code]
    }

    fn next_step(&mut self) -> Step {
        let first = self.pending[0];

        match first {
            0x1B => self.decode_escape(),
            0x00 => self.emit(1, key(KeyCode::Null, Modifier::CTRL)),
            0x08 | 0x7F => self.emit(1, key(KeyCode::Backspace, Modifier::NONE)),
            0x09 => self.emit(1, key(KeyCode::Tab, Modifier::NONE)),
            0x0A | 0x0D => self.emit(1, key(KeyCode::Enter, Modifier::NONE)),
            0x01..=0x1A => {
                let ch = (first + b'a' - 1) as char;
                self.emit(1, key(KeyCode::Char(ch), Modifier::CTRL))
            }
            0x1C..=0x1F => {
                self.consume(1);
                Step::Skip
            }
            0x20..=0x7E => self.emit(1, key(KeyCode::Char(first as char), Modifier::NONE)),
            0x80..=0xFF => self.decode_utf8(),
        }
    }

    fn decode_escape(&mut self) -> Step {
        if self.pending.len() < 2 {
            return Step::Incomplete;
        }

        match self.pending[1] {
            b'[' => self.decode_csi(),
            b'O' => self.decode_ss3(),
            0x1B => self.emit(2, key(KeyCode::Escape, Modifier::ALT)),
            0x20..=0x7E => {
                let ch = self.pending[1] as char;
                self.emit(2, key(KeyCode::Char(ch), Modifier::ALT))
            }
            _ => self.emit(1, key(KeyCode::Escape, Modifier::NONE)),
        }
    }

    fn decode_csi(&mut self) -> Step {
        if self.pending.len() < 3 {
            return Step::Incomplete;
        }

        // The byte right after `ESC [` picks the mouse encoding.
        match self.pending[2] {
            b'<' => return self.decode_sgr_mouse(),
            b'M' => return self.decode_x10_mouse(),
            b'I' => return self.emit(3, RawInput::Focus(true)),
            b'O' => return self.emit(3, RawInput::Focus(false)),
            _ => {}
        }

        if self.pending.starts_with(PASTE_START) {
            return self.decode_paste();
        }

        let Some(end) = self.find_final(2, |b| (0x40..=0x7E).contains(&b)) else {
            return self.wait_or_drop();
        };

        let final_byte = self.pending[end];
        let params = parse_params(&self.pending[2..end]);
        self.consume(end + 1);

        if final_byte == b'u' {
            return Step::Event(kitty_key(&params));
        }

        let modifiers = match params.get(1) {
            Some(&p) if p > 0 => decode_modifier(p),
            _ => Modifier::NONE,
        };

        let code = match final_byte {
            b'Z' => return Step::Event(key(KeyCode::Tab, Modifier::SHIFT)),
            b'~' => tilde_key(params.first().copied().unwrap_or(0)),
            other => letter_key(other),
        };

        match code {
            Some(code) => Step::Event(key(code, modifiers)),
            None => Step::Skip,
        }
    }

    fn decode_ss3(&mut self) -> Step {
        if self.pending.len() < 3 {
            return Step::Incomplete;
        }

        let letter = self.pending[2];
        self.consume(3);
        match letter_key(letter) {
            Some(code) => Step::Event(key(code, Modifier::NONE)),
            None => Step::Skip,
        }
    }

    fn decode_sgr_mouse(&mut self) -> Step {
        // ESC [ < Pb ; Px ; Py M/m
        let Some(end) = self.find_final(3, |b| b == b'M' || b == b'm') else {
            return self.wait_or_drop();
        };

        let is_release = self.pending[end] == b'm';
        let parts = parse_params(&self.pending[3..end]);
        self.consume(end + 1);

        if parts.len() < 3 {
            return Step::Skip;
        }

        let cb = parts[0];
        let x = (parts[1] as u16).saturating_sub(1);
        let y = (parts[2] as u16).saturating_sub(1);
        let base = cb & 3;

        let kind = if cb & 64 != 0 {
            if base == 1 { MouseKind::ScrollDown } else { MouseKind::ScrollUp }
        } else if cb & 32 != 0 {
            MouseKind::Move
        } else if is_release {
            MouseKind::Release(button_from(base))
        } else {
            MouseKind::Press(button_from(base))
        };

        Step::Event(RawInput::Mouse(MouseEvent {
            kind,
            x,
            y,
            modifiers: mouse_modifiers(cb),
        }))
    }

    fn decode_x10_mouse(&mut self) -> Step {
        // ESC [ M Cb Cx Cy (6 bytes)
        if self.pending.len() < 6 {
            return Step::Incomplete;
        }

        let cb = self.pending[3].wrapping_sub(32) as u32;
        let x = self.pending[4].wrapping_sub(33) as u16;
        let y = self.pending[5].wrapping_sub(33) as u16;
        self.consume(6);

        let base = cb & 3;
        let kind = if cb & 64 != 0 {
            if base == 0 { MouseKind::ScrollUp } else { MouseKind::ScrollDown }
        } else if cb & 32 != 0 {
            MouseKind::Move
        } else if base == 3 {
            // X10 does not say which button was released.
            MouseKind::Release(MouseButton::Left)
        } else {
            MouseKind::Press(button_from(base))
        };

        Step::Event(RawInput::Mouse(MouseEvent {
            kind,
            x,
            y,
            modifiers: mouse_modifiers(cb),
        }))
    }

    fn decode_paste(&mut self) -> Step {
        let body_start = PASTE_START.len();
        let Some(rel) = self.pending[body_start..]
            .windows(PASTE_END.len())
            .position(|w| w == PASTE_END)
        else {
            if self.pending.len() - body_start > MAX_PASTE {
                log::warn!("paste exceeded {MAX_PASTE} bytes without an end marker, delivering as is");
                let text = String::from_utf8_lossy(&self.pending[body_start..]).into_owned();
                self.consume(self.pending.len());
                return Step::Event(RawInput::Paste(text));
            }
            return Step::Incomplete;
        };

        let body_end = body_start + rel;
        let text = String::from_utf8_lossy(&self.pending[body_start..body_end]).into_owned();
        self.consume(body_end + PASTE_END.len());
        Step::Event(RawInput::Paste(text))
    }

    fn decode_utf8(&mut self) -> Step {
        let first = self.pending[0];
        let expected_len = if first & 0xE0 == 0xC0 {
            2
        } else if first & 0xF0 == 0xE0 {
            3
        } else if first & 0xF8 == 0xF0 {
            4
        } else {
            self.consume(1);
            return Step::Skip;
        };

        if self.pending.len() < expected_len {
            return Step::Incomplete;
        }

        let decoded = std::str::from_utf8(&self.pending[..expected_len])
            .ok()
            .and_then(|s| s.chars().next());
        match decoded {
            Some(ch) => self.emit(expected_len, key(KeyCode::Char(ch), Modifier::NONE)),
            None => {
                self.consume(1);
                Step::Skip
            }
        }
    }

    /// Scan forward from `start` for the first byte satisfying `is_final`.
    fn find_final(&self, start: usize, is_final: impl Fn(u8) -> bool) -> Option<usize> {
        self.pending
            .iter()
            .enumerate()
            .skip(start)
            .take(MAX_LOOKAHEAD.saturating_sub(start))
            .find(|(_, b)| is_final(**b))
            .map(|(i, _)| i)
    }

    /// No terminator yet: wait for more bytes, unless lookahead is exhausted.
    fn wait_or_drop(&mut self) -> Step {
        if self.pending.len() < MAX_LOOKAHEAD {
            return Step::Incomplete;
        }
        log::debug!("discarding unterminated escape sequence");
        self.consume(MAX_LOOKAHEAD);
        Step::Skip
    }

    fn emit(&mut self, n: usize, event: RawInput) -> Step {
        self.consume(n);
        Step::Event(event)
    }

    fn consume(&mut self, n: usize) {
        self.pending.drain(..n.min(self.pending.len()));
    }
}

impl Default for InputDecoder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Helpers
// =============================================================================

enum Step {
    Event(RawInput),
    Skip,
    Incomplete,
}

fn key(code: KeyCode, modifiers: Modifier) -> RawInput {
    RawInput::Key(KeyEvent::new(code, modifiers))
}

/// Final letters shared by CSI and SS3 sequences.
fn letter_key(letter: u8) -> Option<KeyCode> {
    Some(match letter {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        _ => return None,
    })
}

/// Numeric parameters shared by every CSI terminator family (`1;5`, `15`, `0;10;20`).
fn parse_params(bytes: &[u8]) -> Vec<u32> {
    if bytes.is_empty() {
        return Vec::new();
    }
    String::from_utf8_lossy(bytes)
        .split(';')
        .map(|s| s.split(':').next().unwrap_or("").parse::<u32>().unwrap_or(0))
        .collect()
}

fn tilde_key(param: u32) -> Option<KeyCode> {
    let code = match param {
        1 | 7 => KeyCode::Home,
        2 => KeyCode::Insert,
        3 => KeyCode::Delete,
        4 | 8 => KeyCode::End,
        5 => KeyCode::PageUp,
        6 => KeyCode::PageDown,
        11..=15 => KeyCode::F((param - 10) as u8),
        17..=21 => KeyCode::F((param - 11) as u8),
        23 | 24 => KeyCode::F((param - 12) as u8),
        _ => return None,
    };
    Some(code)
}

fn kitty_key(params: &[u32]) -> RawInput {
    let codepoint = params.first().copied().unwrap_or(0);
    let modifiers = params.get(1).map(|&p| decode_modifier(p)).unwrap_or(Modifier::NONE);
    let state = match params.get(2) {
        Some(2) => KeyState::Repeat,
        Some(3) => KeyState::Release,
        _ => KeyState::Press,
    };

    let code = match codepoint {
        9 => KeyCode::Tab,
        13 => KeyCode::Enter,
        27 => KeyCode::Escape,
        127 => KeyCode::Backspace,
        cp => char::from_u32(cp).map(KeyCode::Char).unwrap_or(KeyCode::Null),
    };

    RawInput::Key(KeyEvent { code, modifiers, state })
}

fn button_from(base: u32) -> MouseButton {
    match base {
        0 => MouseButton::Left,
        1 => MouseButton::Middle,
        _ => MouseButton::Right,
    }
}

fn mouse_modifiers(cb: u32) -> Modifier {
    let mut modifiers = Modifier::NONE;
    modifiers.set(Modifier::SHIFT, cb & 4 != 0);
    modifiers.set(Modifier::ALT, cb & 8 != 0);
    modifiers.set(Modifier::CTRL, cb & 16 != 0);
    modifiers
}

/// CSI modifier parameter: 1 + bitmask of shift/alt/ctrl/super.
fn decode_modifier(param: u32) -> Modifier {
    let mask = param.saturating_sub(1);
    let mut modifiers = Modifier::NONE;
    modifiers.set(Modifier::SHIFT, mask & 1 != 0);
    modifiers.set(Modifier::ALT, mask & 2 != 0);
    modifiers.set(Modifier::CTRL, mask & 4 != 0);
    modifiers.set(Modifier::SUPER, mask & 8 != 0);
    modifiers
}

// =============================================================================
// Tests
// =============================================================================
