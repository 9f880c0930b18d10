//! Focus scopes and traps.

use serde::{Deserialize, Serialize};

/// A navigation domain: one subtree with its own focus.
///
/// Scopes live on a stack inside [`super::FocusManager`]; only the top one is
/// active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusScope {
    pub id: String,
    pub root_id: String,
    /// Focusable ids under `root_id`, in tree order.
    pub focusables: Vec<String>,
    pub focused: Option<String>,
    /// Ancestor chain from `root_id` down to `focused`.
    pub focus_path: Vec<String>,
    pub active: bool,
    pub modal: bool,
}

impl FocusScope {
    pub fn new(id: impl Into<String>, root_id: impl Into<String>, modal: bool) -> Self {
        Self {
            id: id.into(),
            root_id: root_id.into(),
            focusables: Vec::new(),
            focused: None,
            focus_path: Vec::new(),
            active: false,
            modal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapKind {
    Modal,
    Popup,
    Menu,
}

/// Restricts navigation to the subtree under `root` while it is the top of
/// the trap stack. Activity is derived from stack position, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusTrap {
    pub id: String,
    pub kind: TrapKind,
    pub root: String,
}

impl FocusTrap {
    pub fn new(id: impl Into<String>, kind: TrapKind, root: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            root: root.into(),
        }
    }

    pub fn modal(id: impl Into<String>, root: impl Into<String>) -> Self {
        Self::new(id, TrapKind::Modal, root)
    }
}
