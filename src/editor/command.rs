//! Serializable edit commands.
//!
//! Each command names exactly one [`EditorState`] operation so edits can be
//! queued, logged or sent over a bridge and replayed in order.

use serde::{Deserialize, Serialize};

use super::state::{EditorState, MoveDirection, SelectOptions};
use crate::errors::Result;
use crate::models::{BlockId, DataField, Values};
use crate::registry::Registry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditCommand {
    AddBlock {
        block_type: String,
        #[serde(default)]
        after: Option<BlockId>,
    },
    UpdateBlockField {
        id: BlockId,
        data: DataField,
    },
    PatchBlockValues {
        id: BlockId,
        patch: Values,
    },
    RemoveBlock {
        id: BlockId,
    },
    MoveBlock {
        id: BlockId,
        direction: MoveDirection,
    },
    DuplicateBlock {
        id: BlockId,
    },
    DetachBlock {
        id: BlockId,
    },
    SelectBlock {
        id: BlockId,
    },
    SelectNextBlock {
        id: BlockId,
        #[serde(default)]
        options: SelectOptions,
    },
    SelectPreviousBlock {
        id: BlockId,
    },
    HoverBlock {
        #[serde(default)]
        id: Option<BlockId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    Created(BlockId),
    Removed(BlockId),
    Selected(Option<BlockId>),
}

impl EditCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EditCommand::AddBlock { .. } => "add_block",
            EditCommand::UpdateBlockField { .. } => "update_block_field",
            EditCommand::PatchBlockValues { .. } => "patch_block_values",
            EditCommand::RemoveBlock { .. } => "remove_block",
            EditCommand::MoveBlock { .. } => "move_block",
            EditCommand::DuplicateBlock { .. } => "duplicate_block",
            EditCommand::DetachBlock { .. } => "detach_block",
            EditCommand::SelectBlock { .. } => "select_block",
            EditCommand::SelectNextBlock { .. } => "select_next_block",
            EditCommand::SelectPreviousBlock { .. } => "select_previous_block",
            EditCommand::HoverBlock { .. } => "hover_block",
        }
    }
}

impl EditorState {
    pub fn apply(&mut self, registry: &Registry, command: EditCommand) -> Result<CommandOutcome> {
        tracing::trace!("Applying {}", command.name());

        match command {
            EditCommand::AddBlock { block_type, after } => self
                .add_block(registry, &block_type, after.as_ref())
                .map(CommandOutcome::Created),

            EditCommand::UpdateBlockField { id, data } => {
                self.update_block_field(&id, data)?;
                Ok(CommandOutcome::Applied)
            }

            EditCommand::PatchBlockValues { id, patch } => {
                self.patch_block_values(&id, &patch)?;
                Ok(CommandOutcome::Applied)
            }

            EditCommand::RemoveBlock { id } => {
                self.remove_block(&id)?;
                Ok(CommandOutcome::Removed(id))
            }

            EditCommand::MoveBlock { id, direction } => {
                self.move_block(&id, direction)?;
                Ok(CommandOutcome::Applied)
            }

            EditCommand::DuplicateBlock { id } => {
                self.duplicate_block(&id).map(CommandOutcome::Created)
            }

            EditCommand::DetachBlock { id } => {
                self.detach_block(&id)?;
                Ok(CommandOutcome::Applied)
            }

            EditCommand::SelectBlock { id } => {
                self.select_block(&id)?;
                Ok(CommandOutcome::Selected(Some(id)))
            }

            EditCommand::SelectNextBlock { id, options } => self
                .select_next_block(registry, &id, options)
                .map(CommandOutcome::Selected),

            EditCommand::SelectPreviousBlock { id } => self
                .select_previous_block(&id)
                .map(CommandOutcome::Selected),

            EditCommand::HoverBlock { id } => {
                self.hover_block(id.as_ref())?;
                Ok(CommandOutcome::Applied)
            }
        }
    }
}
