//! Block-document editing engine for lesson pages.
//!
//! A page is an ordered list of typed blocks. The [`registry`] describes every
//! block variant, the [`editor`] owns the live document and its edit
//! operations, and [`sync::EditorSession`] loads, resolves, saves and
//! publishes it against the [`store`] contracts.

pub mod config;
pub mod editor;
pub mod errors;
pub mod models;
pub mod notify;
pub mod registry;
pub mod store;
pub mod sync;


pub use config::AppConfig;
pub use editor::{EditCommand, EditorState};
pub use errors::{EditorError, Result};
pub use models::{Block, BlockId, DataField, Document, Reference};
pub use registry::{BlockKind, Registry};
pub use sync::{EditorSession, ImportMode};
