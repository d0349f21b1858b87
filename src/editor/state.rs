//! # Editor State
//!
//! Owns the live document of one open page together with its cursors,
//! validation errors, dirty/publication flags and the template cache.
//!
//! All mutation goes through the methods below. An operation that names a
//! block id not present in the document fails with
//! [`EditorError::BlockNotFound`] and leaves the state untouched.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::focus::{FocusRequest, InlineBinding, NextControl};
use crate::errors::{EditorError, Result};
use crate::models::{
    Block, BlockError, BlockId, DataField, Document, PublicationStatus, RecordId, Reference,
    Template, Values,
};
use crate::registry::{FieldSpec, QuickInsertEntry, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOptions {
    /// Ask for input focus on the destination block. The named field is used
    /// when the destination declares it inline, its first inline field
    /// otherwise.
    #[serde(default)]
    pub focus_first_input_fieldname: Option<String>,
}

impl SelectOptions {
    pub fn focus<T: Into<String>>(field: T) -> Self {
        Self {
            focus_first_input_fieldname: Some(field.into()),
        }
    }
}

/// Side panel fields seeded from a block's current values.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelField {
    pub spec: FieldSpec,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SidePanelForm {
    pub block_id: BlockId,
    pub title: String,
    pub fields: Vec<PanelField>,
}

#[derive(Debug, Clone, Default)]
pub struct EditorState {
    blocks: Vec<Block>,
    selected_id: Option<BlockId>,
    hovered_id: Option<BlockId>,
    errors: Vec<BlockError>,
    dirty: bool,
    publication_status: PublicationStatus,
    templates: Vec<Template>,
    focus: Option<FocusRequest>,
}

impl EditorState {
    pub fn new() -> Self {
        Self::default()
    }

    /* ------------------------------ readers ------------------------------ */

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| &b.id == id)
    }

    pub fn selected_id(&self) -> Option<&BlockId> {
        self.selected_id.as_ref()
    }

    pub fn hovered_id(&self) -> Option<&BlockId> {
        self.hovered_id.as_ref()
    }

    pub fn errors(&self) -> &[BlockError] {
        &self.errors
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn publication_status(&self) -> PublicationStatus {
        self.publication_status
    }

    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn focus_request(&self) -> Option<&FocusRequest> {
        self.focus.as_ref()
    }

    /// Hand the pending focus request to the presentation layer.
    pub fn take_focus_request(&mut self) -> Option<FocusRequest> {
        self.focus.take()
    }

    /// Snapshot for save/publish, stamped with the current time.
    pub fn to_document(&self) -> Document {
        Document::new(self.blocks.clone())
    }

    fn position(&self, id: &BlockId) -> Result<usize> {
        self.blocks
            .iter()
            .position(|b| &b.id == id)
            .ok_or_else(|| EditorError::BlockNotFound(id.clone()))
    }

    /* ---------------------------- block edits ---------------------------- */

    /// Insert a new block seeded from its type's initial content, right after
    /// `after` or at the end. The new block becomes the selection.
    pub fn add_block(
        &mut self,
        registry: &Registry,
        block_type: &str,
        after: Option<&BlockId>,
    ) -> Result<BlockId> {
        let spec = registry.require(block_type)?;
        let index = match after {
            Some(id) => self.position(id)? + 1,
            None => self.blocks.len(),
        };

        let block = Block::new(block_type, DataField::inline(spec.initial.seed()));
        let id = block.id.clone();
        self.blocks.insert(index, block);
        self.selected_id = Some(id.clone());
        self.dirty = true;

        debug!("Added {} block {} at {}", block_type, id, index);
        Ok(id)
    }

    /// Insertion callback of the quick insert menu.
    pub fn insert_from_menu(
        &mut self,
        registry: &Registry,
        entry: &QuickInsertEntry,
        after: Option<&BlockId>,
    ) -> Result<BlockId> {
        self.add_block(registry, &entry.tag, after)
    }

    /// Replace a block's whole `DataField`. Callers carry unrelated
    /// sub-fields forward themselves; see [`Self::patch_block_values`] for a
    /// merging alternative. Static blocks are rejected.
    pub fn update_block_field(&mut self, id: &BlockId, data: DataField) -> Result<()> {
        let index = self.editable_position(id)?;
        self.blocks[index].data = data;
        self.dirty = true;
        Ok(())
    }

    /// Merge `patch` into a block's `values`; a `null` member removes the key.
    pub fn patch_block_values(&mut self, id: &BlockId, patch: &Values) -> Result<()> {
        let index = self.editable_position(id)?;
        let values = &mut self.blocks[index].data.values;
        for (key, value) in patch {
            if value.is_null() {
                values.remove(key);
            } else {
                values.insert(key.clone(), value.clone());
            }
        }
        self.dirty = true;
        Ok(())
    }

    fn editable_position(&self, id: &BlockId) -> Result<usize> {
        let index = self.position(id)?;
        if self.blocks[index].data.is_static {
            return Err(EditorError::StaticBlock(id.clone()));
        }
        Ok(index)
    }

    /// Errors that reference the removed block are left in place until the
    /// next publish attempt clears the list.
    pub fn remove_block(&mut self, id: &BlockId) -> Result<Block> {
        let index = self.position(id)?;
        let removed = self.blocks.remove(index);

        if self.selected_id.as_ref() == Some(id) {
            self.selected_id = None;
        }
        if self.hovered_id.as_ref() == Some(id) {
            self.hovered_id = None;
        }
        if self.focus.as_ref().map(|f| &f.block_id) == Some(id) {
            self.focus = None;
        }
        self.dirty = true;

        debug!("Removed block {}", id);
        Ok(removed)
    }

    /// Swap with the neighbour in `direction`; no-op at either end.
    pub fn move_block(&mut self, id: &BlockId, direction: MoveDirection) -> Result<()> {
        let index = self.position(id)?;
        let target = match direction {
            MoveDirection::Up if index > 0 => index - 1,
            MoveDirection::Down if index + 1 < self.blocks.len() => index + 1,
            _ => return Ok(()),
        };

        self.blocks.swap(index, target);
        self.dirty = true;
        Ok(())
    }

    /// Deep copy under a fresh id, inserted right after the source.
    pub fn duplicate_block(&mut self, id: &BlockId) -> Result<BlockId> {
        let index = self.position(id)?;
        let source = &self.blocks[index];
        let copy = Block::new(source.block_type.clone(), source.data.clone());
        let copy_id = copy.id.clone();

        self.blocks.insert(index + 1, copy);
        self.dirty = true;
        Ok(copy_id)
    }

    /// Turn a live or template-imported block into plain inline content.
    pub fn detach_block(&mut self, id: &BlockId) -> Result<()> {
        let index = self.position(id)?;
        let data = &mut self.blocks[index].data;
        data.obj = None;
        data.is_static = false;
        data.reference = Reference::None;
        self.dirty = true;
        Ok(())
    }

    /* ----------------------------- selection ----------------------------- */

    pub fn select_block(&mut self, id: &BlockId) -> Result<()> {
        self.position(id)?;
        self.selected_id = Some(id.clone());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected_id = None;
        self.focus = None;
    }

    pub fn hover_block(&mut self, id: Option<&BlockId>) -> Result<()> {
        if let Some(id) = id {
            self.position(id)?;
        }
        self.hovered_id = id.cloned();
        Ok(())
    }

    /// Move the selection to the block after `id`. With a focus option the
    /// destination also gets a [`FocusRequest`] for one of its inline fields;
    /// static blocks and blocks without inline fields get none. Returns the
    /// new selection, or `None` when `id` is the last block.
    pub fn select_next_block(
        &mut self,
        registry: &Registry,
        id: &BlockId,
        options: SelectOptions,
    ) -> Result<Option<BlockId>> {
        let index = self.position(id)?;
        let Some(next) = self.blocks.get(index + 1) else {
            return Ok(None);
        };
        let next_id = next.id.clone();

        if let Some(hint) = options.focus_first_input_fieldname {
            self.focus = focus_target(registry, next, &hint).map(|field| FocusRequest {
                block_id: next_id.clone(),
                field,
            });
        }
        self.selected_id = Some(next_id.clone());
        Ok(Some(next_id))
    }

    pub fn select_previous_block(&mut self, id: &BlockId) -> Result<Option<BlockId>> {
        let index = self.position(id)?;
        if index == 0 {
            return Ok(None);
        }

        let previous = self.blocks[index - 1].id.clone();
        self.selected_id = Some(previous.clone());
        Ok(Some(previous))
    }

    /// Enter inside an inline field: hand focus to the binding's next control.
    pub fn follow_next_control(&mut self, binding: &InlineBinding) -> Result<Option<FocusRequest>> {
        self.position(&binding.block_id)?;
        match &binding.next {
            NextControl::End => Ok(None),
            NextControl::Field { block_id, field } => {
                if block_id != &binding.block_id {
                    self.select_block(block_id)?;
                }
                let request = FocusRequest {
                    block_id: block_id.clone(),
                    field: field.clone(),
                };
                self.focus = Some(request.clone());
                Ok(Some(request))
            }
        }
    }

    /* ------------------------------ side panel --------------------------- */

    /// Property form for a block, or `None` when its type has no side panel,
    /// is not registered, or the block is static.
    pub fn side_panel_form(&self, registry: &Registry, id: &BlockId) -> Result<Option<SidePanelForm>> {
        let block = &self.blocks[self.position(id)?];
        if block.data.is_static {
            return Ok(None);
        }
        let Some(panel) = registry
            .lookup(&block.block_type)
            .and_then(|spec| spec.side_panel.as_ref())
        else {
            return Ok(None);
        };

        let fields = panel
            .fields
            .iter()
            .map(|field| PanelField {
                spec: field.clone(),
                value: block.data.values.get(&field.name).cloned().unwrap_or(Value::Null),
            })
            .collect();

        Ok(Some(SidePanelForm {
            block_id: id.clone(),
            title: panel.title.clone(),
            fields,
        }))
    }

    /* ------------------------------- loading ----------------------------- */

    /// Replace the document with freshly loaded content. Not an edit: the
    /// state is clean afterwards. Repeated ids are regenerated.
    pub fn set_initial_content(&mut self, document: Document) {
        let mut seen = HashSet::with_capacity(document.blocks.len());
        let mut blocks = document.blocks;
        for block in &mut blocks {
            if !seen.insert(block.id.clone()) {
                let fresh = BlockId::generate();
                warn!("Duplicate block id {} in loaded document, reassigned {}", block.id, fresh);
                block.id = fresh.clone();
                seen.insert(fresh);
            }
        }

        self.blocks = blocks;
        self.errors.retain(|e| seen.contains(&e.block_id));
        if self.selected_id.as_ref().map_or(false, |id| !seen.contains(id)) {
            self.selected_id = None;
        }
        if self.hovered_id.as_ref().map_or(false, |id| !seen.contains(id)) {
            self.hovered_id = None;
        }
        self.focus = None;
        self.dirty = false;
    }

    /* ------------------------- sync bookkeeping ------------------------- */

    /// Write imported data regardless of the static flag.
    pub(crate) fn replace_block_data(&mut self, id: &BlockId, data: DataField) -> Result<()> {
        let index = self.position(id)?;
        self.blocks[index].data = data;
        self.dirty = true;
        Ok(())
    }

    pub(crate) fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn set_publication_status(&mut self, status: PublicationStatus) {
        self.publication_status = status;
    }

    pub(crate) fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub(crate) fn push_errors<I: IntoIterator<Item = BlockError>>(&mut self, errors: I) {
        self.errors.extend(errors);
    }

    pub(crate) fn set_templates(&mut self, templates: Vec<Template>) {
        self.templates = templates;
    }

    pub(crate) fn upsert_template(&mut self, template: Template) {
        match self.templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => self.templates.push(template),
        }
    }

    pub(crate) fn remove_template(&mut self, id: &RecordId) {
        self.templates.retain(|t| &t.id != id);
    }
}

/// Inline field of `block` that should take focus: `hint` when the type
/// declares it, the first inline field otherwise.
fn focus_target(registry: &Registry, block: &Block, hint: &str) -> Option<String> {
    if block.data.is_static {
        return None;
    }
    let fields = &registry.lookup(&block.block_type)?.inline_fields;
    fields
        .iter()
        .find(|field| field.as_str() == hint)
        .or_else(|| fields.first())
        .cloned()
}
