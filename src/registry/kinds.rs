//! Built-in block kinds and their descriptors.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use super::render::{list_field, str_field};
use super::{
    BlockSpec, FieldKind, FieldSpec, ImportDescriptor, InitialContent, QuickInsertEntry,
    RenderedBlock, SidePanel,
};
use crate::errors::EditorError;
use crate::models::{Block, Values};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Text,
    Image,
    Video,
    Audio,
    Question,
    Matching,
    FillBlank,
    Ordering,
    Divider,
}

impl BlockKind {
    pub const ALL: [BlockKind; 9] = [
        BlockKind::Text,
        BlockKind::Image,
        BlockKind::Video,
        BlockKind::Audio,
        BlockKind::Question,
        BlockKind::Matching,
        BlockKind::FillBlank,
        BlockKind::Ordering,
        BlockKind::Divider,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Image => "image",
            BlockKind::Video => "video",
            BlockKind::Audio => "audio",
            BlockKind::Question => "question",
            BlockKind::Matching => "matching",
            BlockKind::FillBlank => "fill-blank",
            BlockKind::Ordering => "ordering",
            BlockKind::Divider => "divider",
        }
    }

    /// Descriptor for this kind.
    pub fn spec(self) -> BlockSpec {
        match self {
            BlockKind::Text => BlockSpec {
                tag: self.tag().to_string(),
                render: render_text,
                quick_insert: entry(self, "Text", "Paragraph of lesson text", "pilcrow"),
                side_panel: Some(panel(
                    "Text",
                    vec![FieldSpec::new("text", "Text", FieldKind::LongText)],
                )),
                import: None,
                initial: initial(
                    json!({"text": ""}),
                    Some(json!({"text": "Start writing your lesson here."})),
                ),
                inline_fields: fields(&["text"]),
            },
            BlockKind::Image => BlockSpec {
                tag: self.tag().to_string(),
                render: render_image,
                quick_insert: entry(self, "Image", "Picture with caption", "image"),
                side_panel: Some(panel(
                    "Image",
                    vec![
                        FieldSpec::new("url", "Image URL", FieldKind::Url),
                        FieldSpec::new("alt", "Alternative text", FieldKind::Text),
                        FieldSpec::new("caption", "Caption", FieldKind::Text),
                    ],
                )),
                import: Some(import(self, "Search images", project_image)),
                initial: initial(json!({"url": "", "alt": "", "caption": ""}), None),
                inline_fields: fields(&["caption"]),
            },
            BlockKind::Video => BlockSpec {
                tag: self.tag().to_string(),
                render: render_media,
                quick_insert: entry(self, "Video", "Embedded video", "film"),
                side_panel: Some(panel(
                    "Video",
                    vec![
                        FieldSpec::new("title", "Title", FieldKind::Text),
                        FieldSpec::new("url", "Video URL", FieldKind::Url),
                        FieldSpec::new("duration", "Duration (seconds)", FieldKind::Number),
                    ],
                )),
                import: Some(import(self, "Search videos", project_media)),
                initial: initial(json!({"title": "", "url": ""}), None),
                inline_fields: fields(&["title"]),
            },
            BlockKind::Audio => BlockSpec {
                tag: self.tag().to_string(),
                render: render_media,
                quick_insert: entry(self, "Audio", "Recording with transcript", "volume"),
                side_panel: Some(panel(
                    "Audio",
                    vec![
                        FieldSpec::new("title", "Title", FieldKind::Text),
                        FieldSpec::new("url", "Audio URL", FieldKind::Url),
                        FieldSpec::new("transcript", "Transcript", FieldKind::LongText),
                    ],
                )),
                import: Some(import(self, "Search recordings", project_media)),
                initial: initial(json!({"title": "", "url": "", "transcript": ""}), None),
                inline_fields: fields(&["title"]),
            },
            BlockKind::Question => BlockSpec {
                tag: self.tag().to_string(),
                render: render_question,
                quick_insert: entry(self, "Question", "Multiple choice question", "help-circle"),
                side_panel: Some(panel(
                    "Question",
                    vec![
                        FieldSpec::new("text", "Question", FieldKind::LongText),
                        FieldSpec::new("answers", "Answers", FieldKind::List),
                        FieldSpec::new("shuffle", "Shuffle answers", FieldKind::Toggle),
                    ],
                )),
                import: Some(import(self, "Search question bank", project_record)),
                initial: initial(
                    json!({"text": "", "answers": []}),
                    Some(json!({
                        "text": "What is 2 + 2?",
                        "answers": [
                            {"text": "4", "correct": true},
                            {"text": "5", "correct": false}
                        ]
                    })),
                ),
                inline_fields: fields(&["text"]),
            },
            BlockKind::Matching => BlockSpec {
                tag: self.tag().to_string(),
                render: render_matching,
                quick_insert: entry(self, "Matching", "Match items into pairs", "link"),
                side_panel: Some(panel(
                    "Matching pairs",
                    vec![
                        FieldSpec::new("title", "Instructions", FieldKind::Text),
                        FieldSpec::new("pairs", "Pairs", FieldKind::List),
                    ],
                )),
                import: Some(import(self, "Search matching exercises", project_record)),
                initial: initial(
                    json!({"title": "", "pairs": []}),
                    Some(json!({
                        "title": "Match each country with its capital",
                        "pairs": [
                            {"left": "France", "right": "Paris"},
                            {"left": "Japan", "right": "Tokyo"}
                        ]
                    })),
                ),
                inline_fields: fields(&["title"]),
            },
            BlockKind::FillBlank => BlockSpec {
                tag: self.tag().to_string(),
                render: render_fill_blank,
                quick_insert: entry(self, "Fill in the blank", "Sentence with gaps", "edit"),
                side_panel: Some(panel(
                    "Fill in the blank",
                    vec![
                        FieldSpec::new("text", "Sentence", FieldKind::LongText),
                        FieldSpec::new("blanks", "Accepted answers", FieldKind::List),
                    ],
                )),
                import: Some(import(self, "Search exercises", project_record)),
                initial: initial(
                    json!({"text": "", "blanks": []}),
                    Some(json!({
                        "text": "The capital of France is [Paris].",
                        "blanks": ["Paris"]
                    })),
                ),
                inline_fields: fields(&["text"]),
            },
            BlockKind::Ordering => BlockSpec {
                tag: self.tag().to_string(),
                render: render_ordering,
                quick_insert: entry(self, "Ordering", "Put items in the right order", "list-ordered"),
                side_panel: Some(panel(
                    "Ordering",
                    vec![
                        FieldSpec::new("title", "Instructions", FieldKind::Text),
                        FieldSpec::new("items", "Items in correct order", FieldKind::List),
                    ],
                )),
                import: Some(import(self, "Search ordering exercises", project_record)),
                initial: initial(
                    json!({"title": "", "items": []}),
                    Some(json!({
                        "title": "Order the planets from the sun",
                        "items": ["Mercury", "Venus", "Earth"]
                    })),
                ),
                inline_fields: fields(&["title"]),
            },
            BlockKind::Divider => BlockSpec {
                tag: self.tag().to_string(),
                render: render_divider,
                quick_insert: entry(self, "Divider", "Horizontal rule", "minus"),
                side_panel: None,
                import: None,
                initial: InitialContent::default(),
                inline_fields: Vec::new(),
            },
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for BlockKind {
    type Err = EditorError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        BlockKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| EditorError::unknown_block_type(tag))
    }
}

/* ------------------------------ constructors ------------------------- */

fn entry(kind: BlockKind, title: &str, subtitle: &str, icon: &str) -> QuickInsertEntry {
    QuickInsertEntry {
        tag: kind.tag().to_string(),
        title: title.to_string(),
        subtitle: subtitle.to_string(),
        icon: icon.to_string(),
    }
}

fn panel(title: &str, fields: Vec<FieldSpec>) -> SidePanel {
    SidePanel {
        title: title.to_string(),
        fields,
    }
}

fn import(kind: BlockKind, label: &str, project: fn(&Value) -> Values) -> ImportDescriptor {
    ImportDescriptor {
        component_type: kind.tag().to_string(),
        search_label: label.to_string(),
        project,
    }
}

fn initial(empty: Value, default: Option<Value>) -> InitialContent {
    InitialContent {
        empty: into_values(empty),
        default: default.map(into_values),
    }
}

fn into_values(value: Value) -> Values {
    match value {
        Value::Object(map) => map,
        _ => Values::new(),
    }
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/* ------------------------------- projections ------------------------- */

/// Whole record minus its `id`.
fn project_record(record: &Value) -> Values {
    let mut values = record.as_object().cloned().unwrap_or_default();
    values.remove("id");
    values
}

fn project_keys(record: &Value, keys: &[&str]) -> Values {
    keys.iter()
        .filter_map(|&key| record.get(key).map(|v| (key.to_string(), v.clone())))
        .collect()
}

fn project_image(record: &Value) -> Values {
    project_keys(record, &["url", "alt", "caption"])
}

fn project_media(record: &Value) -> Values {
    project_keys(record, &["title", "url", "duration", "transcript"])
}

/* --------------------------------- render ---------------------------- */

fn render_text(block: &Block) -> RenderedBlock {
    let values = &block.data.values;
    RenderedBlock::new(&block.id, &block.block_type, "Text")
        .lines(str_field(values, "text").lines().map(str::to_string))
}

fn render_image(block: &Block) -> RenderedBlock {
    let values = &block.data.values;
    let url = str_field(values, "url");
    RenderedBlock::new(&block.id, &block.block_type, "Image")
        .line(str_field(values, "caption"))
        .line(if url.is_empty() {
            "(no image selected)".to_string()
        } else {
            url.to_string()
        })
}

fn render_media(block: &Block) -> RenderedBlock {
    let values = &block.data.values;
    let title = match str_field(values, "title") {
        "" if block.block_type == "audio" => "Audio",
        "" => "Video",
        title => title,
    };
    RenderedBlock::new(&block.id, &block.block_type, title)
        .line(str_field(values, "url"))
        .line(str_field(values, "transcript"))
}

fn render_question(block: &Block) -> RenderedBlock {
    let values = &block.data.values;
    let answers = list_field(values, "answers").iter().map(|answer| {
        let mark = if answer.get("correct").and_then(Value::as_bool).unwrap_or(false) {
            "x"
        } else {
            " "
        };
        let text = answer.get("text").and_then(Value::as_str).unwrap_or("");
        format!("[{}] {}", mark, text)
    });
    RenderedBlock::new(&block.id, &block.block_type, "Question")
        .line(str_field(values, "text"))
        .lines(answers)
}

fn render_matching(block: &Block) -> RenderedBlock {
    let values = &block.data.values;
    let pairs = list_field(values, "pairs").iter().map(|pair| {
        format!(
            "{} -> {}",
            pair.get("left").and_then(Value::as_str).unwrap_or("?"),
            pair.get("right").and_then(Value::as_str).unwrap_or("?")
        )
    });
    RenderedBlock::new(&block.id, &block.block_type, "Matching")
        .line(str_field(values, "title"))
        .lines(pairs)
}

fn render_fill_blank(block: &Block) -> RenderedBlock {
    let values = &block.data.values;
    let blanks = list_field(values, "blanks").len();
    RenderedBlock::new(&block.id, &block.block_type, "Fill in the blank")
        .line(str_field(values, "text"))
        .line(format!("{} blank(s)", blanks))
}

fn render_ordering(block: &Block) -> RenderedBlock {
    let values = &block.data.values;
    let items = list_field(values, "items")
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item.as_str().unwrap_or("?")));
    RenderedBlock::new(&block.id, &block.block_type, "Ordering")
        .line(str_field(values, "title"))
        .lines(items)
}

fn render_divider(block: &Block) -> RenderedBlock {
    RenderedBlock::new(&block.id, &block.block_type, "Divider").line("----")
}
