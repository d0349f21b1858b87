//! Block type registry.
//!
//! Every block variant is described by one self-contained [`BlockSpec`]. The
//! built-in variants form the closed [`BlockKind`] set; the string-keyed
//! [`Registry`] is what documents are checked against, so a stored block whose
//! tag is no longer compiled in renders as an isolated placeholder instead of
//! failing the whole page.

mod kinds;
mod render;

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::debug;

use crate::errors::{EditorError, Result};
use crate::models::{Block, Values};

pub use kinds::BlockKind;
pub use render::{Rendered, RenderedBlock};

/* ----------------------------- descriptors --------------------------- */

/// Entry of the "insert new block" menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickInsertEntry {
    pub tag: String,
    pub title: String,
    pub subtitle: String,
    pub icon: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    LongText,
    Url,
    Number,
    Toggle,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: &str, label: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind,
        }
    }
}

/// Property-editing surface bound to a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidePanel {
    pub title: String,
    pub fields: Vec<FieldSpec>,
}

/// How to search server components for a block type and how to project a
/// chosen record into the block's `values`.
#[derive(Debug, Clone)]
pub struct ImportDescriptor {
    pub component_type: String,
    pub search_label: String,
    pub project: fn(&Value) -> Values,
}

impl ImportDescriptor {
    pub fn project(&self, record: &Value) -> Values {
        (self.project)(record)
    }
}

/// Content skeletons for new blocks.
#[derive(Debug, Clone, Default)]
pub struct InitialContent {
    pub empty: Values,
    pub default: Option<Values>,
}

impl InitialContent {
    /// Seed used for freshly inserted blocks: the example content when there
    /// is one, the blank skeleton otherwise.
    pub fn seed(&self) -> Values {
        self.default.clone().unwrap_or_else(|| self.empty.clone())
    }

    /// `values` laid over the blank skeleton, so every skeleton key exists.
    pub fn complete(&self, values: Values) -> Values {
        let mut complete = self.empty.clone();
        complete.extend(values);
        complete
    }
}

#[derive(Debug, Clone)]
pub struct BlockSpec {
    pub tag: String,
    pub render: fn(&Block) -> RenderedBlock,
    pub quick_insert: QuickInsertEntry,
    pub side_panel: Option<SidePanel>,
    pub import: Option<ImportDescriptor>,
    pub initial: InitialContent,
    /// Inline-editable fields in focus order.
    pub inline_fields: Vec<String>,
}

impl BlockSpec {
    pub fn is_static_only(&self) -> bool {
        self.side_panel.is_none()
    }
}

/* ------------------------------- registry ---------------------------- */

/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct Registry {
    specs: Vec<BlockSpec>,
    index: HashMap<String, usize>,
}

static STANDARD: OnceCell<Registry> = OnceCell::new();

impl Registry {
    /// Build a registry, failing on the first duplicated tag.
    pub fn new(specs: Vec<BlockSpec>) -> Result<Self> {
        let mut index = HashMap::with_capacity(specs.len());
        for (position, spec) in specs.iter().enumerate() {
            if index.insert(spec.tag.clone(), position).is_some() {
                return Err(EditorError::DuplicateBlockType(spec.tag.clone()));
            }
        }

        debug!("Registered {} block types", specs.len());
        Ok(Self { specs, index })
    }

    /// Registry of every built-in [`BlockKind`].
    pub fn builtin() -> Result<Self> {
        Self::new(BlockKind::ALL.iter().map(|kind| kind.spec()).collect())
    }

    /// Process-wide built-in registry, built on first use.
    pub fn standard() -> Result<&'static Registry> {
        STANDARD.get_or_try_init(Self::builtin)
    }

    pub fn lookup(&self, tag: &str) -> Option<&BlockSpec> {
        self.index.get(tag).map(|&i| &self.specs[i])
    }

    pub fn require(&self, tag: &str) -> Result<&BlockSpec> {
        self.lookup(tag)
            .ok_or_else(|| EditorError::unknown_block_type(tag))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.index.contains_key(tag)
    }

    pub fn specs(&self) -> impl Iterator<Item = &BlockSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Menu entries in registration order.
    pub fn quick_insert_menu(&self) -> Vec<&QuickInsertEntry> {
        self.specs.iter().map(|spec| &spec.quick_insert).collect()
    }

    pub fn render(&self, block: &Block) -> Rendered {
        match self.lookup(&block.block_type) {
            Some(spec) => {
                let mut rendered = (spec.render)(block);
                rendered.read_only = block.data.is_static || spec.is_static_only();
                Rendered::Block(rendered)
            }
            None => Rendered::Unknown {
                block_id: block.id.clone(),
                tag: block.block_type.clone(),
            },
        }
    }

    pub fn render_document(&self, blocks: &[Block]) -> Vec<Rendered> {
        blocks.iter().map(|block| self.render(block)).collect()
    }
}
