//! Bare-id placeholder resolution for freshly parsed documents.

use std::collections::HashSet;

use crate::models::{Block, ComponentRef, RecordId, ResolvedRecord};
use crate::registry::Registry;

/// Id of a thin `{id}` placeholder `obj`, if the block holds one.
fn placeholder_id(block: &Block) -> Option<RecordId> {
    let obj = block.data.obj.as_ref()?;
    if obj.as_object()?.len() != 1 {
        return None;
    }
    RecordId::of(obj)
}

/// The lookup key for a block, when it needs resolving at all.
fn reference_for(registry: &Registry, block: &Block) -> Option<ComponentRef> {
    let object_id = placeholder_id(block)?;
    let import = registry.lookup(&block.block_type)?.import.as_ref()?;
    Some(ComponentRef {
        component_type: import.component_type.clone(),
        object_id,
    })
}

/// Every distinct `(component_type, object_id)` pair the document needs,
/// in document order.
pub fn collect_placeholders(registry: &Registry, blocks: &[Block]) -> Vec<ComponentRef> {
    let mut seen = HashSet::new();
    blocks
        .iter()
        .filter_map(|block| reference_for(registry, block))
        .filter(|reference| seen.insert(reference.clone()))
        .collect()
}

/// Swap placeholders for their full records and re-project `values` over
/// the type's blank skeleton.
/// Blocks that already hold full records are never touched. Returns the
/// number of blocks updated.
pub fn apply_resolved(registry: &Registry, blocks: &mut [Block], resolved: &[ResolvedRecord]) -> usize {
    let mut updated = 0;
    for block in blocks.iter_mut() {
        let Some(reference) = reference_for(registry, block) else {
            continue;
        };
        let Some(found) = resolved.iter().find(|r| {
            r.component_type == reference.component_type && r.object_id == reference.object_id
        }) else {
            continue;
        };
        let Some(spec) = registry.lookup(&block.block_type) else {
            continue;
        };
        let Some(import) = spec.import.as_ref() else {
            continue;
        };

        block.data.values = spec.initial.complete(import.project(&found.record));
        block.data.obj = Some(found.record.clone());
        updated += 1;
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BlockId, DataField, Values};
    use serde_json::{json, Value};

    fn block(id: &str, tag: &str, obj: Option<Value>) -> Block {
        Block {
            id: BlockId::from(id),
            block_type: tag.to_string(),
            data: DataField {
                obj,
                ..DataField::default()
            },
        }
    }

    #[test]
    fn test_collects_only_thin_placeholders_of_importable_types() {
        let registry = Registry::builtin().unwrap();
        let blocks = vec![
            block("b1", "question", Some(json!({"id": 42}))),
            block("b2", "question", Some(json!({"id": 43, "text": "full"}))),
            block("b3", "question", None),
            block("b4", "text", Some(json!({"id": 1}))),
            block("b5", "legacy-quiz", Some(json!({"id": 2}))),
            block("b6", "question", Some(json!({"id": 42}))),
        ];

        let refs = collect_placeholders(&registry, &blocks);
        assert_eq!(
            refs,
            vec![ComponentRef {
                component_type: "question".to_string(),
                object_id: RecordId::Int(42),
            }]
        );
    }

    #[test]
    fn test_apply_resolved_projects_values() {
        let registry = Registry::builtin().unwrap();
        let mut blocks = vec![
            block("b1", "question", Some(json!({"id": 42}))),
            block("b2", "question", Some(json!({"id": 7}))),
        ];
        let record = json!({"id": 42, "text": "What is 6 x 7?", "answers": []});
        let resolved = vec![ResolvedRecord {
            component_type: "question".to_string(),
            object_id: RecordId::Int(42),
            record: record.clone(),
        }];

        assert_eq!(apply_resolved(&registry, &mut blocks, &resolved), 1);
        assert_eq!(blocks[0].data.values["answers"], json!([]));
        assert_eq!(blocks[0].data.obj, Some(record));
        assert_eq!(blocks[0].data.values["text"], json!("What is 6 x 7?"));
        assert!(!blocks[0].data.values.contains_key("id"));

        // unresolved placeholders stay as they were
        assert_eq!(blocks[1].data.obj, Some(json!({"id": 7})));
        assert_eq!(blocks[1].data.values, Values::new());
    }

    #[test]
    fn test_sparse_records_keep_the_skeleton_keys() {
        let registry = Registry::builtin().unwrap();
        let mut blocks = vec![block("b1", "image", Some(json!({"id": 5})))];
        let resolved = vec![ResolvedRecord {
            component_type: "image".to_string(),
            object_id: RecordId::Int(5),
            record: json!({"id": 5, "url": "https://cdn.example/cat.png"}),
        }];

        apply_resolved(&registry, &mut blocks, &resolved);

        let values = &blocks[0].data.values;
        assert_eq!(values["url"], json!("https://cdn.example/cat.png"));
        assert_eq!(values["alt"], json!(""));
        assert_eq!(values["caption"], json!(""));
    }
}
