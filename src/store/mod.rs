//! # Stores
//!
//! Narrow async contracts for everything the engine reads from or writes to a
//! server: page content, component records, batch reference resolution and
//! templates. [`MemoryStore`] and [`FileStore`] implement all four.

mod file;
mod memory;
mod validate;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::Result;
use crate::models::{
    ComponentQuery, ComponentRef, NewTemplate, PageContent, Paginated, PublishResponse, RecordId,
    ResolvedRecord, Template, TemplateQuery, TemplateUpdate, Values,
};

pub use file::FileStore;
pub use memory::MemoryStore;
pub use validate::check_publishable;

/// One JSON blob per page plus a distinct publish endpoint.
#[async_trait]
pub trait PageContentStore: Send + Sync {
    async fn load_content(&self, page_id: &str) -> Result<PageContent>;

    async fn save_content(&self, page_id: &str, content: String) -> Result<()>;

    async fn publish_content(&self, page_id: &str, content: String) -> Result<PublishResponse>;
}

/// Typed component records addressed by `(component_type, id)`.
#[async_trait]
pub trait ComponentStore: Send + Sync {
    async fn list(&self, component_type: &str, query: &ComponentQuery) -> Result<Paginated<Value>>;

    async fn get(&self, component_type: &str, id: &RecordId) -> Result<Value>;

    async fn create(&self, component_type: &str, values: Values) -> Result<Value>;

    async fn update(&self, component_type: &str, id: &RecordId, values: Values) -> Result<Value>;
}

/// Batch lookup of full records for bare-id placeholders. Items with no
/// matching record are simply absent from the answer.
#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    async fn resolve(&self, refs: &[ComponentRef]) -> Result<Vec<ResolvedRecord>>;
}

/// Templates scoped to the owning page.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn list(&self, page_id: &str, query: &TemplateQuery) -> Result<Vec<Template>>;

    async fn get(&self, page_id: &str, id: &RecordId) -> Result<Template>;

    async fn create(&self, page_id: &str, template: NewTemplate) -> Result<Template>;

    async fn update(&self, page_id: &str, id: &RecordId, changes: TemplateUpdate) -> Result<Template>;

    async fn delete(&self, page_id: &str, id: &RecordId) -> Result<()>;
}

/// The set of collaborators one editor session talks to.
#[derive(Clone)]
pub struct Backend {
    pub content: Arc<dyn PageContentStore>,
    pub components: Arc<dyn ComponentStore>,
    pub resolver: Arc<dyn ReferenceResolver>,
    pub templates: Arc<dyn TemplateStore>,
}

impl Backend {
    /// Route every contract to a single store.
    pub fn single<S>(store: Arc<S>) -> Self
    where
        S: PageContentStore + ComponentStore + ReferenceResolver + TemplateStore + 'static,
    {
        Self {
            content: store.clone(),
            components: store.clone(),
            resolver: store.clone(),
            templates: store,
        }
    }
}

/// Case-insensitive substring match over a record's string members.
pub(crate) fn record_matches(record: &Value, term: &str) -> bool {
    let term = term.to_lowercase();
    record
        .as_object()
        .map(|fields| {
            fields.values().any(|value| {
                value
                    .as_str()
                    .map_or(false, |s| s.to_lowercase().contains(&term))
            })
        })
        .unwrap_or(false)
}

/// Reject ids that would escape a path segment.
pub(crate) fn check_segment<'a>(kind: &str, segment: &'a str) -> Result<&'a str> {
    if segment.is_empty()
        || segment.contains('/')
        || segment.contains('\\')
        || segment.contains("..")
    {
        return Err(crate::errors::EditorError::not_found(format!(
            "invalid {} '{}'",
            kind, segment
        )));
    }
    Ok(segment)
}
