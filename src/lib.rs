//! # spark-runtime
//!
//! Runtime engine for terminal UIs.
//!
//! ## Architecture
//!
//! Five subsystems composed by one runtime loop:
//! ```text
//! Platform bytes → InputDecoder → Keymap → Dispatcher → components
//!                                              │
//!                          StateTracker ◄──────┘ (before/after each action)
//!
//! Element tree → LayoutEngine → FocusManager geometry
//!                     │
//!                     └──► paint → Buffer → DiffRenderer → Platform
//! ```
//!
//! Every subsystem is an explicit instance owned by [`Runtime`]; there is no
//! global state, so several runtimes (or tests) can run side by side.
//!
//! ## Modules
//!
//! - [`layout`] - Flexbox measure/arrange with absolute positioning and caching
//! - [`focus`] - Focus scopes, traps, sequential and spatial navigation
//! - [`dispatch`] - Priority-ordered action routing and composable async units
//! - [`input`] - Terminal byte decoding and key bindings
//! - [`state`] - Snapshots, diffs, undo/redo
//! - [`runtime`] - The update/render loop, task spawner, recovery, automation
//! - [`platform`] - Terminal and headless I/O backends
//! - [`renderer`] - Cell buffer and differential ANSI output

pub mod action;
pub mod component;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod focus;
pub mod input;
pub mod layout;
pub mod platform;
pub mod renderer;
pub mod runtime;
pub mod state;
pub mod types;

// Re-export commonly used items
pub use types::*;

pub use action::{Action, ActionCategory, ActionType, Payload};

pub use component::{
    ActionTarget, Component, ComponentTarget, Element, Focusable, Measurable, Paintable,
};

pub use config::{PanicPolicy, RuntimeConfig};

pub use error::{EngineError, ErrorKind, Result};

pub use dispatch::{
    Dispatcher, Handler, Unit, UnitRef, bounded, concurrent, fallback, retry, sequential, timeout,
    unit_fn,
};

pub use focus::{FocusManager, FocusNode, FocusScope, FocusTrap, TrapKind};

pub use input::{InputDecoder, KeyChord, KeyCode, KeyEvent, Keymap, Modifier, RawInput};

pub use layout::{
    Constraints, Dimension, Layout, LayoutEngine, LayoutNode, LayoutTree, Style, compute_layout,
};

pub use platform::{HeadlessPlatform, Platform, TerminalPlatform};

pub use renderer::{Buffer, CellStyle, Color, DiffRenderer};

pub use runtime::{Automation, Runtime, Selector, TaskSpawner};

pub use state::{ChangeKind, ComponentState, Diff, Snapshot, StateChange, StateTracker, compute_diff};
