//! Keymap - RawInput to Action translation
//!
//! Resolution order for a key press, first match wins:
//!
//! 1. Ad hoc bindings (explicit, modifier-qualified chords)
//! 2. The named-context stack, innermost context first
//! 3. The global default table
//!
//! A printable character that nothing claimed becomes `InputChar`.
//! Anything else produces no action; that is a no-op, not an error.
//!
//! # Example
//!
//! ```ignore
//! let mut keymap = Keymap::with_defaults();
//! keymap.define_context("list", [(KeyChord::parse("j")?, ActionType::MoveDown)]);
//! keymap.push_context("list");
//! let action = keymap.translate(&raw);
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::action::{Action, ActionType, Payload};
use crate::types::Point;

use super::parser::{KeyCode, KeyEvent, Modifier, MouseKind, RawInput, SignalKind};

// =============================================================================
// KEY CHORD
// =============================================================================

/// A key plus the exact modifier set required to trigger a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyChord {
    pub code: KeyCode,
    pub modifiers: Modifier,
}

impl KeyChord {
    pub const fn new(code: KeyCode, modifiers: Modifier) -> Self {
        Self { code, modifiers }
    }

    pub const fn plain(code: KeyCode) -> Self {
        Self::new(code, Modifier::NONE)
    }

    pub const fn ctrl(ch: char) -> Self {
        Self::new(KeyCode::Char(ch), Modifier::CTRL)
    }

    /// Normalized chord for an incoming event. Uppercase letters already carry
    /// shift in the character, so the SHIFT bit is dropped for them.
    pub fn from_event(event: &KeyEvent) -> Self {
        let mut modifiers = event.modifiers;
        if let KeyCode::Char(c) = event.code {
            if !c.is_ascii_lowercase() {
                modifiers.remove(Modifier::SHIFT);
            }
        }
        Self::new(event.code, modifiers)
    }

    /// Parse `"ctrl+shift+tab"`, `"alt+x"`, `"f5"`, `"enter"`, `"j"`.
    pub fn parse(text: &str) -> Option<Self> {
        let mut modifiers = Modifier::NONE;
        let parts: Vec<&str> = text.split('+').map(str::trim).collect();
        let (key_part, mods) = parts.split_last()?;

        for m in mods {
            match m.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers |= Modifier::CTRL,
                "alt" | "meta" => modifiers |= Modifier::ALT,
                "shift" => modifiers |= Modifier::SHIFT,
                "super" | "cmd" => modifiers |= Modifier::SUPER,
                _ => return None,
            }
        }

        let lower = key_part.to_ascii_lowercase();
        let code = match lower.as_str() {
            "enter" | "return" => KeyCode::Enter,
            "tab" => KeyCode::Tab,
            "backspace" => KeyCode::Backspace,
            "esc" | "escape" => KeyCode::Escape,
            "delete" | "del" => KeyCode::Delete,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            "pageup" => KeyCode::PageUp,
            "pagedown" => KeyCode::PageDown,
            "insert" => KeyCode::Insert,
            "space" => KeyCode::Char(' '),
            f if f.len() > 1 && f.starts_with('f') => KeyCode::F(f[1..].parse().ok()?),
            _ => {
                let mut chars = key_part.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                KeyCode::Char(c)
            }
        };

        Some(Self::new(code, modifiers))
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(Modifier::CTRL) {
            write!(f, "ctrl+")?;
        }
        if self.modifiers.contains(Modifier::ALT) {
            write!(f, "alt+")?;
        }
        if self.modifiers.contains(Modifier::SHIFT) {
            write!(f, "shift+")?;
        }
        if self.modifiers.contains(Modifier::SUPER) {
            write!(f, "super+")?;
        }
        match self.code {
            KeyCode::Char(' ') => write!(f, "space"),
            KeyCode::Char(c) => write!(f, "{c}"),
            KeyCode::F(n) => write!(f, "f{n}"),
            other => write!(f, "{}", format!("{other:?}").to_ascii_lowercase()),
        }
    }
}

// =============================================================================
// KEYMAP
// =============================================================================

type BindingTable = HashMap<KeyChord, ActionType>;

/// Context-sensitive key table.
#[derive(Debug, Clone, Default)]
pub struct Keymap {
    ad_hoc: BindingTable,
    contexts: HashMap<String, BindingTable>,
    context_stack: Vec<String>,
    defaults: BindingTable,
}

impl Keymap {
    /// Empty keymap: only character input is produced.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keymap preloaded with the standard navigation and editing table.
    pub fn with_defaults() -> Self {
        let mut keymap = Self::new();
        keymap.defaults = default_bindings();
        keymap
    }

    /// Explicit binding checked before any context.
    pub fn bind(&mut self, chord: KeyChord, action: ActionType) {
        self.ad_hoc.insert(chord, action);
    }

    pub fn unbind(&mut self, chord: &KeyChord) -> Option<ActionType> {
        self.ad_hoc.remove(chord)
    }

    pub fn bind_default(&mut self, chord: KeyChord, action: ActionType) {
        self.defaults.insert(chord, action);
    }

    /// Register (or extend) a named context's bindings.
    pub fn define_context(
        &mut self,
        name: impl Into<String>,
        bindings: impl IntoIterator<Item = (KeyChord, ActionType)>,
    ) {
        self.contexts.entry(name.into()).or_default().extend(bindings);
    }

    /// Activate a context. Unknown names are allowed and simply bind nothing.
    pub fn push_context(&mut self, name: impl Into<String>) {
        self.context_stack.push(name.into());
    }

    pub fn pop_context(&mut self) -> Option<String> {
        self.context_stack.pop()
    }

    pub fn active_contexts(&self) -> &[String] {
        &self.context_stack
    }

    /// Action bound to a chord, honoring precedence. Does not synthesize `InputChar`.
    pub fn lookup(&self, chord: &KeyChord) -> Option<ActionType> {
        if let Some(action) = self.ad_hoc.get(chord) {
            return Some(*action);
        }
        for name in self.context_stack.iter().rev() {
            if let Some(action) = self.contexts.get(name).and_then(|t| t.get(chord)) {
                return Some(*action);
            }
        }
        self.defaults.get(chord).copied()
    }

    /// Map decoded input to an action. `None` means "nothing to do".
    pub fn translate(&self, input: &RawInput) -> Option<Action> {
        let action = match input {
            RawInput::Key(event) => self.translate_key(event)?,
            RawInput::Mouse(mouse) => {
                let position = Point::new(mouse.x, mouse.y);
                let (action_type, button) = match mouse.kind {
                    MouseKind::Press(b) => (ActionType::MouseDown, Some(b)),
                    MouseKind::Release(b) => (ActionType::MouseUp, Some(b)),
                    MouseKind::Move => (ActionType::MouseMove, None),
                    MouseKind::ScrollUp => (ActionType::ScrollUp, None),
                    MouseKind::ScrollDown => (ActionType::ScrollDown, None),
                };
                Action::new(action_type).with_payload(Payload::Mouse { position, button })
            }
            RawInput::Resize(size) => Action::new(ActionType::Resize).with_payload(Payload::Size(*size)),
            RawInput::Paste(text) => Action::new(ActionType::Paste).with_payload(Payload::Text(text.clone())),
            RawInput::Focus(true) => Action::new(ActionType::FocusGained),
            RawInput::Focus(false) => Action::new(ActionType::FocusLost),
            RawInput::Signal(SignalKind::Interrupt | SignalKind::Terminate) => Action::new(ActionType::Quit),
            RawInput::Signal(SignalKind::Suspend) => Action::new(ActionType::Suspend),
        };
        Some(action.with_source("input"))
    }

    fn translate_key(&self, event: &KeyEvent) -> Option<Action> {
        if !event.is_press() {
            return None;
        }

        let chord = KeyChord::from_event(event);
        if let Some(action_type) = self.lookup(&chord) {
            return Some(Action::new(action_type).with_payload(Payload::Key(event.clone())));
        }

        match event.code {
            KeyCode::Char(c)
                if !c.is_control()
                    && !event.modifiers.intersects(Modifier::CTRL | Modifier::ALT | Modifier::SUPER) =>
            {
                Some(Action::input_char(c))
            }
            _ => None,
        }
    }
}

fn default_bindings() -> BindingTable {
    use ActionType::*;
    let plain = KeyChord::plain;
    [
        (plain(KeyCode::Tab), FocusNext),
        (KeyChord::new(KeyCode::Tab, Modifier::SHIFT), FocusPrev),
        (plain(KeyCode::Up), MoveUp),
        (plain(KeyCode::Down), MoveDown),
        (plain(KeyCode::Left), MoveLeft),
        (plain(KeyCode::Right), MoveRight),
        (KeyChord::new(KeyCode::Up, Modifier::ALT), FocusUp),
        (KeyChord::new(KeyCode::Down, Modifier::ALT), FocusDown),
        (KeyChord::new(KeyCode::Left, Modifier::ALT), FocusLeft),
        (KeyChord::new(KeyCode::Right, Modifier::ALT), FocusRight),
        (plain(KeyCode::Home), MoveHome),
        (plain(KeyCode::End), MoveEnd),
        (plain(KeyCode::PageUp), PageUp),
        (plain(KeyCode::PageDown), PageDown),
        (plain(KeyCode::Enter), Submit),
        (plain(KeyCode::Escape), Cancel),
        (plain(KeyCode::Backspace), DeleteBackward),
        (plain(KeyCode::Delete), DeleteForward),
        (plain(KeyCode::F(1)), ToggleHelp),
        (KeyChord::ctrl('c'), Quit),
        (KeyChord::ctrl('z'), Undo),
        (KeyChord::ctrl('y'), Redo),
        (KeyChord::ctrl('a'), SelectAll),
        (KeyChord::ctrl('x'), Cut),
        (KeyChord::ctrl('v'), Paste),
        (KeyChord::ctrl('l'), Redraw),
    ]
    .into_iter()
    .collect()
}
