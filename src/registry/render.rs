use serde::Serialize;
use serde_json::Value;

use crate::models::{BlockId, Values};

/// Display representation of one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedBlock {
    pub block_id: BlockId,
    pub tag: String,
    pub title: String,
    pub lines: Vec<String>,
    pub read_only: bool,
}

impl RenderedBlock {
    pub fn new(block_id: &BlockId, tag: &str, title: impl Into<String>) -> Self {
        Self {
            block_id: block_id.clone(),
            tag: tag.to_string(),
            title: title.into(),
            lines: Vec::new(),
            read_only: false,
        }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        let line = line.into();
        if !line.is_empty() {
            self.lines.push(line);
        }
        self
    }

    pub fn lines<I: IntoIterator<Item = String>>(mut self, lines: I) -> Self {
        self.lines.extend(lines.into_iter().filter(|l| !l.is_empty()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rendered {
    Block(RenderedBlock),
    /// Contained error for a block whose type is not registered.
    Unknown { block_id: BlockId, tag: String },
}

impl Rendered {
    pub fn is_read_only(&self) -> bool {
        match self {
            Rendered::Block(b) => b.read_only,
            Rendered::Unknown { .. } => true,
        }
    }

    /// Plain-text form used by the CLI.
    pub fn to_text(&self) -> String {
        match self {
            Rendered::Block(b) => {
                let mut out = format!("[{}] {}", b.tag, b.title);
                if b.read_only {
                    out.push_str(" (read-only)");
                }
                for line in &b.lines {
                    out.push_str("\n    ");
                    out.push_str(line);
                }
                out
            }
            Rendered::Unknown { block_id, tag } => {
                format!("[error] Unsupported block type '{}' ({})", tag, block_id)
            }
        }
    }
}

/* ------------------------------ value helpers ------------------------ */

pub(crate) fn str_field<'a>(values: &'a Values, key: &str) -> &'a str {
    values.get(key).and_then(Value::as_str).unwrap_or("")
}

pub(crate) fn list_field<'a>(values: &'a Values, key: &str) -> &'a [Value] {
    values
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
