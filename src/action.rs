//! Actions - semantic intents
//!
//! An [`Action`] is an already-interpreted intent: "focus next", "insert 'a'",
//! "click at (3, 4)". Human key presses and automation calls both end up here,
//! so the rest of the engine never sees raw bytes.
//!
//! The catalog of [`ActionType`]s is closed. Extensibility lives in the
//! [`Payload`] (including an arbitrary JSON value) and in the target id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::input::{KeyEvent, MouseButton};
use crate::types::{Direction, Point, Size};

// =============================================================================
// ACTION TYPES
// =============================================================================

/// Broad grouping of action types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionCategory {
    Navigation,
    Editing,
    Selection,
    Mouse,
    View,
    Window,
    System,
    Automation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    // Navigation
    FocusNext,
    FocusPrev,
    FocusFirst,
    FocusLast,
    FocusUp,
    FocusDown,
    FocusLeft,
    FocusRight,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MoveHome,
    MoveEnd,
    PageUp,
    PageDown,

    // Editing
    InputChar,
    DeleteBackward,
    DeleteForward,
    Submit,
    Cancel,
    Paste,
    Cut,
    Copy,
    Undo,
    Redo,

    // Selection
    Select,
    SelectAll,
    ToggleSelect,
    ClearSelection,

    // Mouse
    Click,
    MouseDown,
    MouseUp,
    MouseMove,
    ScrollUp,
    ScrollDown,

    // View
    Redraw,
    ToggleHelp,
    OpenModal,
    CloseModal,

    // Window
    Resize,
    FocusGained,
    FocusLost,

    // System
    Quit,
    Suspend,
    Tick,

    // Automation
    SetValue,
    Invoke,
}

impl ActionType {
    pub fn category(self) -> ActionCategory {
        use ActionType::*;
        match self {
            FocusNext | FocusPrev | FocusFirst | FocusLast | FocusUp | FocusDown | FocusLeft
            | FocusRight | MoveUp | MoveDown | MoveLeft | MoveRight | MoveHome | MoveEnd
            | PageUp | PageDown => ActionCategory::Navigation,
            InputChar | DeleteBackward | DeleteForward | Submit | Cancel | Paste | Cut | Copy
            | Undo | Redo => ActionCategory::Editing,
            Select | SelectAll | ToggleSelect | ClearSelection => ActionCategory::Selection,
            Click | MouseDown | MouseUp | MouseMove | ScrollUp | ScrollDown => {
                ActionCategory::Mouse
            }
            Redraw | ToggleHelp | OpenModal | CloseModal => ActionCategory::View,
            Resize | FocusGained | FocusLost => ActionCategory::Window,
            Quit | Suspend | Tick => ActionCategory::System,
            SetValue | Invoke => ActionCategory::Automation,
        }
    }

    /// Geometric focus move for `FocusUp`..`FocusRight`.
    pub fn focus_direction(self) -> Option<Direction> {
        match self {
            ActionType::FocusUp => Some(Direction::Up),
            ActionType::FocusDown => Some(Direction::Down),
            ActionType::FocusLeft => Some(Direction::Left),
            ActionType::FocusRight => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Up => ActionType::FocusUp,
            Direction::Down => ActionType::FocusDown,
            Direction::Left => ActionType::FocusLeft,
            Direction::Right => ActionType::FocusRight,
        }
    }

    /// Undo/redo move history themselves and must not be recorded as edits.
    pub fn is_history(self) -> bool {
        matches!(self, ActionType::Undo | ActionType::Redo)
    }
}

// =============================================================================
// PAYLOAD
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    #[default]
    None,
    Char(char),
    Text(String),
    Point(Point),
    Mouse {
        position: Point,
        button: Option<MouseButton>,
    },
    Size(Size),
    Direction(Direction),
    Key(KeyEvent),
    Value(serde_json::Value),
}

impl Payload {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Payload::None => "none",
            Payload::Char(_) => "char",
            Payload::Text(_) => "text",
            Payload::Point(_) => "point",
            Payload::Mouse { .. } => "mouse",
            Payload::Size(_) => "size",
            Payload::Direction(_) => "direction",
            Payload::Key(_) => "key",
            Payload::Value(_) => "value",
        }
    }

    /// Position carried by point or mouse payloads.
    pub fn position(&self) -> Option<Point> {
        match self {
            Payload::Point(p) => Some(*p),
            Payload::Mouse { position, .. } => Some(*position),
            _ => None,
        }
    }
}

// =============================================================================
// ACTION
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Action {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            payload: Payload::None,
            source: None,
            target: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Character input addressed to no one in particular.
    pub fn input_char(ch: char) -> Self {
        Self::new(ActionType::InputChar).with_payload(Payload::Char(ch))
    }

    pub fn expect_char(&self) -> Result<char> {
        match &self.payload {
            Payload::Char(c) => Ok(*c),
            other => Err(self.payload_mismatch("char", other)),
        }
    }

    pub fn expect_text(&self) -> Result<&str> {
        match &self.payload {
            Payload::Text(t) => Ok(t),
            other => Err(self.payload_mismatch("text", other)),
        }
    }

    pub fn expect_position(&self) -> Result<Point> {
        self.payload
            .position()
            .ok_or_else(|| self.payload_mismatch("point", &self.payload))
    }

    pub fn expect_value(&self) -> Result<&serde_json::Value> {
        match &self.payload {
            Payload::Value(v) => Ok(v),
            other => Err(self.payload_mismatch("value", other)),
        }
    }

    fn payload_mismatch(&self, expected: &'static str, actual: &Payload) -> EngineError {
        EngineError::InvalidPayload {
            expected,
            actual: format!("{} for {:?}", actual.kind_name(), self.action_type),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_builder() {
        let action = Action::input_char('a').with_target("field1").with_source("keyboard");
        assert_eq!(action.action_type, ActionType::InputChar);
        assert_eq!(action.target.as_deref(), Some("field1"));
        assert_eq!(action.source.as_deref(), Some("keyboard"));
        assert_eq!(action.expect_char().unwrap(), 'a');
    }

    #[test]
    fn test_payload_mismatch() {
        let action = Action::new(ActionType::InputChar).with_payload(Payload::Text("ab".into()));
        let err = action.expect_char().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPayload);
    }

    #[test]
    fn test_type_serializes_snake_case() {
        let json = serde_json::to_value(ActionType::InputChar).unwrap();
        assert_eq!(json, serde_json::json!("input_char"));
    }

    #[test]
    fn test_action_json_round_trip() {
        let action = Action::new(ActionType::Click)
            .with_payload(Payload::Point(Point::new(3, 4)))
            .with_target("ok");
        let text = serde_json::to_string(&action).unwrap();
        let back: Action = serde_json::from_str(&text).unwrap();
        assert_eq!(back, action);
    }

    #[test]
    fn test_categories() {
        assert_eq!(ActionType::FocusUp.category(), ActionCategory::Navigation);
        assert_eq!(ActionType::Click.category(), ActionCategory::Mouse);
        assert_eq!(ActionType::Invoke.category(), ActionCategory::Automation);
        assert_eq!(ActionType::FocusUp.focus_direction(), Some(Direction::Up));
        assert_eq!(ActionType::from_direction(Direction::Left), ActionType::FocusLeft);
    }
}
