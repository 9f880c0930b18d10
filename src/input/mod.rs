//! Input - terminal bytes to semantic actions
//!
//! ```text
//! stdin bytes ──► InputDecoder ──► RawInput ──► Keymap ──► Action
//!                  (parser.rs)                 (keymap.rs)
//! ```
//!
//! [`InputReader`] runs the decoder on a blocking task and hands decoded
//! events to the main loop through a bounded queue.

pub mod keymap;
pub mod parser;
pub mod reader;

pub use keymap::{KeyChord, Keymap};
pub use parser::{
    InputDecoder, KeyCode, KeyEvent, KeyState, Modifier, MouseButton, MouseEvent, MouseKind,
    RawInput, SignalKind,
};
pub use reader::{Backpressure, InputReader};
