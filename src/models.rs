//! Plain‑data structs shared by the editor state, the registry and the stores.
//!
//! The page content wire format is exactly [`Document`] serialized with
//! `serde_json`; block-specific fields only ever live inside `obj`/`values`.

use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::Result;

/// Locally editable mirror of a block's content.
pub type Values = serde_json::Map<String, Value>;

/* ------------------------------ identifiers -------------------------- */

/// Opaque, process-unique block token generated client-side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn generate() -> Self {
        BlockId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        BlockId(s.to_string())
    }
}

impl From<String> for BlockId {
    fn from(s: String) -> Self {
        BlockId(s)
    }
}

/// Server-side record id. Kept in whichever form the server used so it
/// round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// The `id` member of a component record or placeholder, if it has one.
    pub fn of(record: &Value) -> Option<RecordId> {
        match record.get("id")? {
            Value::Number(n) => n.as_i64().map(RecordId::Int),
            Value::String(s) => Some(RecordId::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            RecordId::Int(n) => Value::from(*n),
            RecordId::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(n: i64) -> Self {
        RecordId::Int(n)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::Text(s.to_string())
    }
}

/* ------------------------------ timestamps --------------------------- */

/// Document save time. Reads RFC 3339 strings or epoch milliseconds,
/// always writes RFC 3339.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Timestamp(Utc::now())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(i64),
            Float(f64),
            Text(String),
        }

        let millis = match Raw::deserialize(deserializer)? {
            Raw::Text(s) => {
                return DateTime::parse_from_rfc3339(&s)
                    .map(|dt| Timestamp(dt.with_timezone(&Utc)))
                    .map_err(de::Error::custom)
            }
            Raw::Millis(ms) => ms,
            Raw::Float(ms) => ms as i64,
        };

        Utc.timestamp_millis_opt(millis)
            .single()
            .map(Timestamp)
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", millis)))
    }
}

/* --------------------------------- blocks ---------------------------- */

/// What a block's content is linked to.
///
/// On the wire this is the pair of optional `element_id` / `template_id`
/// members; both at once is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ReferenceFields", into = "ReferenceFields")]
pub enum Reference {
    /// Fresh, local-only content.
    #[default]
    None,
    /// A committed, already-persisted content element.
    Live(RecordId),
    /// The template a static import was copied from.
    Template(RecordId),
}

/// Wire shape of [`Reference`].
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ReferenceFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<RecordId>,
}

impl TryFrom<ReferenceFields> for Reference {
    type Error = String;

    fn try_from(fields: ReferenceFields) -> std::result::Result<Self, Self::Error> {
        match (fields.element_id, fields.template_id) {
            (None, None) => Ok(Reference::None),
            (Some(id), None) => Ok(Reference::Live(id)),
            (None, Some(id)) => Ok(Reference::Template(id)),
            (Some(e), Some(t)) => Err(format!(
                "element_id ({}) and template_id ({}) are mutually exclusive",
                e, t
            )),
        }
    }
}

impl From<Reference> for ReferenceFields {
    fn from(reference: Reference) -> Self {
        match reference {
            Reference::None => ReferenceFields::default(),
            Reference::Live(id) => ReferenceFields {
                element_id: Some(id),
                template_id: None,
            },
            Reference::Template(id) => ReferenceFields {
                element_id: None,
                template_id: Some(id),
            },
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataField {
    /// Full server record this block points to; `None` for inline content.
    #[serde(default)]
    pub obj: Option<Value>,

    #[serde(default)]
    pub values: Values,

    #[serde(rename = "static", default, skip_serializing_if = "is_false")]
    pub is_static: bool,

    #[serde(flatten)]
    pub reference: Reference,
}

impl DataField {
    pub fn inline(values: Values) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,

    #[serde(rename = "type")]
    pub block_type: String,

    pub data: DataField,
}

impl Block {
    pub fn new<T: Into<String>>(block_type: T, data: DataField) -> Self {
        Self {
            id: BlockId::generate(),
            block_type: block_type.into(),
            data,
        }
    }
}

/// One page's content: the unit of save, publish and load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub blocks: Vec<Block>,
    pub date: Timestamp,
}

impl Document {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            blocks,
            date: Timestamp::now(),
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Server validation failure scoped to one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockError {
    pub block_id: BlockId,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    #[default]
    Draft,
    Published,
}

/* ------------------------------ page content ------------------------- */

/// Stored content of one page as returned by the page-content store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContent {
    /// JSON text of a [`Document`], or `None` when nothing was saved yet.
    #[serde(default)]
    pub content: Option<String>,

    #[serde(default)]
    pub status: PublicationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishFailure {
    pub message: String,
    #[serde(default)]
    pub errors: Vec<BlockError>,
}

/// Answer of the publish endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PublishEnvelope", into = "PublishEnvelope")]
pub enum PublishResponse {
    Success(Value),
    Failure(PublishFailure),
}

/// Wire shape of [`PublishResponse`]: `{success, data}` or `{success, errors}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublishEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<PublishFailure>,
}

impl TryFrom<PublishEnvelope> for PublishResponse {
    type Error = String;

    fn try_from(envelope: PublishEnvelope) -> std::result::Result<Self, Self::Error> {
        if envelope.success {
            return Ok(PublishResponse::Success(envelope.data.unwrap_or(Value::Null)));
        }
        envelope
            .errors
            .map(PublishResponse::Failure)
            .ok_or_else(|| "failed publish response carries no errors".to_string())
    }
}

impl From<PublishResponse> for PublishEnvelope {
    fn from(response: PublishResponse) -> Self {
        match response {
            PublishResponse::Success(data) => PublishEnvelope {
                success: true,
                data: Some(data),
                errors: None,
            },
            PublishResponse::Failure(failure) => PublishEnvelope {
                success: false,
                data: None,
                errors: Some(failure),
            },
        }
    }
}

/* ------------------------------ components --------------------------- */

/// Key of one batch-resolve item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentRef {
    pub component_type: String,
    pub object_id: RecordId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRecord {
    pub component_type: String,
    pub object_id: RecordId,
    pub record: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentQuery {
    #[serde(default)]
    pub search: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

impl ComponentQuery {
    pub fn first_page(page_size: u32) -> Self {
        Self {
            search: None,
            page: 1,
            page_size,
        }
    }

    pub fn search<T: Into<String>>(mut self, term: T) -> Self {
        self.search = Some(term.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: usize,
}

impl<T> Paginated<T> {
    /// Slice one page (1-based) out of an already filtered list.
    pub fn from_all(all: Vec<T>, page: u32, page_size: u32) -> Self {
        let total = all.len();
        let size = page_size.max(1) as usize;
        let skip = (page.max(1) as usize - 1) * size;
        let items = all.into_iter().skip(skip).take(size).collect();
        Self {
            items,
            page: page.max(1),
            page_size: size as u32,
            total,
        }
    }

    pub fn has_next(&self) -> bool {
        (self.page as usize) * (self.page_size as usize) < self.total
    }
}

/* ------------------------------- templates --------------------------- */

/// Named snapshot of one block's data, reusable across documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: RecordId,
    pub name: String,
    /// JSON text of the origin block's whole [`DataField`].
    pub content: String,
    pub block_id: BlockId,
    pub component_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    pub content: String,
    pub block_id: BlockId,
    pub component_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateQuery {
    /// Case-insensitive substring of the template name.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub component_type: Option<String>,
}

impl TemplateQuery {
    pub fn matches(&self, template: &Template) -> bool {
        let type_ok = self
            .component_type
            .as_deref()
            .map_or(true, |t| t == template.component_type);
        let name_ok = self.search.as_deref().map_or(true, |term| {
            template.name.to_lowercase().contains(&term.to_lowercase())
        });
        type_ok && name_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_field_wire_shape() {
        let data = DataField {
            obj: Some(json!({"id": 42})),
            values: json!({"text": "2 + 2?"}).as_object().cloned().unwrap(),
            is_static: false,
            reference: Reference::Live(RecordId::Int(42)),
        };

        let wire = serde_json::to_value(&data).unwrap();
        assert_eq!(
            wire,
            json!({"obj": {"id": 42}, "values": {"text": "2 + 2?"}, "element_id": 42})
        );

        let back: DataField = serde_json::from_value(wire).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn test_static_template_reference_serialization() {
        let data = DataField {
            obj: None,
            values: Values::new(),
            is_static: true,
            reference: Reference::Template(RecordId::from("tpl-1")),
        };

        let wire = serde_json::to_value(&data).unwrap();
        assert_eq!(
            wire,
            json!({"obj": null, "values": {}, "static": true, "template_id": "tpl-1"})
        );
    }

    #[test]
    fn test_both_references_rejected() {
        let wire = json!({"obj": null, "values": {}, "element_id": 1, "template_id": 2});
        let result: std::result::Result<DataField, _> = serde_json::from_value(wire);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_fields_default() {
        let data: DataField = serde_json::from_value(json!({})).unwrap();
        assert_eq!(data, DataField::default());
    }

    #[test]
    fn test_timestamp_accepts_millis_and_rfc3339() {
        let from_millis: Timestamp = serde_json::from_value(json!(1_700_000_000_000i64)).unwrap();
        let from_text: Timestamp =
            serde_json::from_value(json!("2023-11-14T22:13:20Z")).unwrap();
        assert_eq!(from_millis, from_text);

        let written = serde_json::to_value(from_text).unwrap();
        assert_eq!(written, json!("2023-11-14T22:13:20Z"));
    }

    #[test]
    fn test_publish_response_union() {
        let failure: PublishResponse = serde_json::from_value(json!({
            "success": false,
            "errors": {"message": "x", "errors": [{"block_id": "b1", "error": "bad"}]}
        }))
        .unwrap();

        match failure {
            PublishResponse::Failure(f) => {
                assert_eq!(f.message, "x");
                assert_eq!(f.errors[0].block_id, BlockId::from("b1"));
            }
            other => panic!("expected failure, got {:?}", other),
        }

        let success: PublishResponse =
            serde_json::from_value(json!({"success": true, "data": {"version": 3}})).unwrap();
        assert_eq!(success, PublishResponse::Success(json!({"version": 3})));

        let broken: std::result::Result<PublishResponse, _> =
            serde_json::from_value(json!({"success": false}));
        assert!(broken.is_err());
    }

    #[test]
    fn test_pagination() {
        let page = Paginated::from_all((1..=45).collect::<Vec<_>>(), 3, 20);
        assert_eq!(page.items, vec![41, 42, 43, 44, 45]);
        assert_eq!(page.total, 45);
        assert!(!page.has_next());

        let first = Paginated::from_all((1..=45).collect::<Vec<_>>(), 1, 20);
        assert!(first.has_next());
    }

    #[test]
    fn test_record_id_of() {
        assert_eq!(RecordId::of(&json!({"id": 7})), Some(RecordId::Int(7)));
        assert_eq!(RecordId::of(&json!({"id": "q-7"})), Some(RecordId::from("q-7")));
        assert_eq!(RecordId::of(&json!({"title": "x"})), None);
    }
}
