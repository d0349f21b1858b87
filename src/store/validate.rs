use chrono::Utc;
use serde_json::{json, Value};

use crate::models::{BlockError, Document, PublishFailure, PublishResponse};
use crate::registry::Registry;

/// Server-side publish check used by the bundled stores.
///
/// Every block must be of a known type (when a registry is given) and carry
/// some content if its type has fields at all.
pub fn check_publishable(content: &str, registry: Option<&Registry>) -> PublishResponse {
    let document = match Document::parse(content) {
        Ok(document) => document,
        Err(e) => {
            return PublishResponse::Failure(PublishFailure {
                message: format!("Content is not a valid document: {}", e),
                errors: Vec::new(),
            })
        }
    };

    let mut errors = Vec::new();
    for block in &document.blocks {
        let spec = registry.and_then(|r| r.lookup(&block.block_type));
        if registry.is_some() && spec.is_none() {
            errors.push(BlockError {
                block_id: block.id.clone(),
                error: format!("Unsupported block type '{}'", block.block_type),
            });
            continue;
        }

        let has_fields = spec.map_or(true, |s| !s.initial.empty.is_empty());
        if has_fields && block.data.values.values().all(is_blank) {
            errors.push(BlockError {
                block_id: block.id.clone(),
                error: "Block has no content".to_string(),
            });
        }
    }

    if errors.is_empty() {
        PublishResponse::Success(json!({
            "blocks": document.blocks.len(),
            "published_at": Utc::now().to_rfc3339(),
        }))
    } else {
        PublishResponse::Failure(PublishFailure {
            message: format!("{} block(s) need attention before publishing", errors.len()),
            errors,
        })
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
