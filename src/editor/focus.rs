//! Cross-block focus chaining for inline-editable fields.
//!
//! Every inline field binding carries the control that should receive focus
//! when the author presses Enter inside it. The chain runs through the inline
//! fields of each block in document order and flows across block boundaries;
//! blocks without editable inline fields are skipped.

use serde::{Deserialize, Serialize};

use crate::models::{Block, BlockId};
use crate::registry::Registry;

/// Destination control of an inline binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NextControl {
    Field { block_id: BlockId, field: String },
    End,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineBinding {
    pub block_id: BlockId,
    pub field: String,
    pub next: NextControl,
}

/// Signal that an input of `block_id` should take focus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusRequest {
    pub block_id: BlockId,
    pub field: String,
}

pub fn inline_bindings(registry: &Registry, blocks: &[Block]) -> Vec<InlineBinding> {
    let controls: Vec<(BlockId, String)> = blocks
        .iter()
        .filter(|block| !block.data.is_static)
        .filter_map(|block| {
            registry
                .lookup(&block.block_type)
                .map(|spec| (block, &spec.inline_fields))
        })
        .flat_map(|(block, fields)| {
            fields
                .iter()
                .map(move |field| (block.id.clone(), field.clone()))
        })
        .collect();

    controls
        .iter()
        .enumerate()
        .map(|(i, (block_id, field))| InlineBinding {
            block_id: block_id.clone(),
            field: field.clone(),
            next: controls
                .get(i + 1)
                .map(|(next_block, next_field)| NextControl::Field {
                    block_id: next_block.clone(),
                    field: next_field.clone(),
                })
                .unwrap_or(NextControl::End),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataField;

    #[test]
    fn test_chain_skips_blocks_without_inline_fields() {
        let registry = Registry::builtin().unwrap();
        let text = Block::new("text", DataField::default());
        let divider = Block::new("divider", DataField::default());
        let question = Block::new("question", DataField::default());
        let blocks = vec![text.clone(), divider, question.clone()];

        let bindings = inline_bindings(&registry, &blocks);
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].block_id, text.id);
        assert_eq!(
            bindings[0].next,
            NextControl::Field {
                block_id: question.id.clone(),
                field: "text".to_string()
            }
        );
        assert_eq!(bindings[1].next, NextControl::End);
    }

    #[test]
    fn test_static_and_unknown_blocks_are_not_bound() {
        let registry = Registry::builtin().unwrap();
        let mut frozen = Block::new("text", DataField::default());
        frozen.data.is_static = true;
        let legacy = Block::new("legacy-quiz", DataField::default());

        assert!(inline_bindings(&registry, &[frozen, legacy]).is_empty());
    }
}
