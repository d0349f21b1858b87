//! # Editor
//!
//! The in-memory side of a lesson page: [`EditorState`] owns the block list
//! and is the only place it changes. [`EditCommand`] mirrors each operation as
//! data, and [`focus`] wires Enter-key flow between inline fields.

mod command;
pub mod focus;
mod state;

pub use command::{CommandOutcome, EditCommand};
pub use focus::{inline_bindings, FocusRequest, InlineBinding, NextControl};
pub use state::{EditorState, MoveDirection, PanelField, SelectOptions, SidePanelForm};
