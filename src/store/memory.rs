//! In-process store implementing every store contract.
//!
//! Useful for offline editing and as the scripted server in tests: publish
//! answers can be queued ahead of time, and the whole store or just its
//! resolver can be switched offline to simulate transport failures.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, instrument};

use super::{check_publishable, record_matches, ComponentStore, PageContentStore, ReferenceResolver, TemplateStore};
use crate::errors::{EditorError, Result};
use crate::models::{
    ComponentQuery, ComponentRef, NewTemplate, PageContent, Paginated, PublicationStatus,
    PublishResponse, RecordId, ResolvedRecord, Template, TemplateQuery, TemplateUpdate, Values,
};
use crate::registry::Registry;

#[derive(Debug, Default)]
struct PageRecord {
    content: Option<String>,
    published: Option<String>,
    status: PublicationStatus,
}

#[derive(Debug, Default)]
struct Inner {
    pages: HashMap<String, PageRecord>,
    /// `(component_type, record)` in insertion order.
    components: Vec<(String, Value)>,
    templates: HashMap<String, Vec<Template>>,
    scripted_publish: VecDeque<PublishResponse>,
    next_id: i64,
    offline: bool,
    resolver_down: bool,
    resolve_calls: usize,
    save_calls: usize,
}

impl Inner {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn online(&self) -> Result<()> {
        if self.offline {
            return Err(EditorError::transport("store is offline"));
        }
        Ok(())
    }

    fn component_mut(&mut self, component_type: &str, id: &RecordId) -> Option<&mut Value> {
        self.components
            .iter_mut()
            .find(|(t, record)| t == component_type && RecordId::of(record).as_ref() == Some(id))
            .map(|(_, record)| record)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    validator: Option<Registry>,
}

impl MemoryStore {
    /// Store whose publish check knows the built-in block types.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            validator: Registry::standard().ok().cloned(),
        }
    }

    pub fn with_registry(registry: Registry) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            validator: Some(registry),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| EditorError::internal_error("memory store lock poisoned"))
    }

    /* --------------------------- test/setup hooks ------------------------ */

    pub fn set_page_content(&self, page_id: &str, content: Option<String>) -> Result<()> {
        self.lock()?.pages.entry(page_id.to_string()).or_default().content = content;
        Ok(())
    }

    /// Stored draft content of a page.
    pub fn page_content(&self, page_id: &str) -> Result<Option<String>> {
        Ok(self.lock()?.pages.get(page_id).and_then(|p| p.content.clone()))
    }

    pub fn published_content(&self, page_id: &str) -> Result<Option<String>> {
        Ok(self.lock()?.pages.get(page_id).and_then(|p| p.published.clone()))
    }

    /// Add a component record, assigning an id when it has none.
    pub fn insert_component(&self, component_type: &str, mut record: Value) -> Result<RecordId> {
        let mut inner = self.lock()?;
        let id = match RecordId::of(&record) {
            Some(id) => {
                if let RecordId::Int(n) = id {
                    inner.next_id = inner.next_id.max(n);
                }
                id
            }
            None => {
                let id = RecordId::Int(inner.allocate_id());
                if let Some(fields) = record.as_object_mut() {
                    fields.insert("id".to_string(), id.to_value());
                }
                id
            }
        };
        inner.components.push((component_type.to_string(), record));
        Ok(id)
    }

    /// Answer the next publish with `response` instead of validating.
    pub fn script_publish(&self, response: PublishResponse) -> Result<()> {
        self.lock()?.scripted_publish.push_back(response);
        Ok(())
    }

    pub fn set_offline(&self, offline: bool) -> Result<()> {
        self.lock()?.offline = offline;
        Ok(())
    }

    /// Fail only the reference resolver; content and the rest stay up.
    pub fn set_resolver_down(&self, down: bool) -> Result<()> {
        self.lock()?.resolver_down = down;
        Ok(())
    }

    pub fn resolve_calls(&self) -> usize {
        self.lock().map(|i| i.resolve_calls).unwrap_or(0)
    }

    pub fn save_calls(&self) -> usize {
        self.lock().map(|i| i.save_calls).unwrap_or(0)
    }
}

#[async_trait]
impl PageContentStore for MemoryStore {
    #[instrument(skip(self))]
    async fn load_content(&self, page_id: &str) -> Result<PageContent> {
        let inner = self.lock()?;
        inner.online()?;
        Ok(inner
            .pages
            .get(page_id)
            .map(|page| PageContent {
                content: page.content.clone(),
                status: page.status,
            })
            .unwrap_or_default())
    }

    #[instrument(skip(self, content))]
    async fn save_content(&self, page_id: &str, content: String) -> Result<()> {
        let mut inner = self.lock()?;
        inner.online()?;
        inner.save_calls += 1;
        inner.pages.entry(page_id.to_string()).or_default().content = Some(content);
        debug!("Saved page {}", page_id);
        Ok(())
    }

    #[instrument(skip(self, content))]
    async fn publish_content(&self, page_id: &str, content: String) -> Result<PublishResponse> {
        let mut inner = self.lock()?;
        inner.online()?;

        let response = match inner.scripted_publish.pop_front() {
            Some(response) => response,
            None => check_publishable(&content, self.validator.as_ref()),
        };

        let page = inner.pages.entry(page_id.to_string()).or_default();
        page.content = Some(content.clone());
        if let PublishResponse::Success(_) = response {
            page.published = Some(content);
            page.status = PublicationStatus::Published;
        }
        Ok(response)
    }
}

#[async_trait]
impl ComponentStore for MemoryStore {
    async fn list(&self, component_type: &str, query: &ComponentQuery) -> Result<Paginated<Value>> {
        let inner = self.lock()?;
        inner.online()?;
        let matching: Vec<Value> = inner
            .components
            .iter()
            .filter(|(t, _)| t == component_type)
            .filter(|(_, record)| {
                query
                    .search
                    .as_deref()
                    .map_or(true, |term| record_matches(record, term))
            })
            .map(|(_, record)| record.clone())
            .collect();
        Ok(Paginated::from_all(matching, query.page, query.page_size))
    }

    async fn get(&self, component_type: &str, id: &RecordId) -> Result<Value> {
        let mut inner = self.lock()?;
        inner.online()?;
        inner
            .component_mut(component_type, id)
            .map(|record| record.clone())
            .ok_or_else(|| EditorError::not_found(format!("{} {}", component_type, id)))
    }

    async fn create(&self, component_type: &str, mut values: Values) -> Result<Value> {
        let mut inner = self.lock()?;
        inner.online()?;
        let id = inner.allocate_id();
        values.insert("id".to_string(), Value::from(id));
        let record = Value::Object(values);
        inner.components.push((component_type.to_string(), record.clone()));
        Ok(record)
    }

    async fn update(&self, component_type: &str, id: &RecordId, mut values: Values) -> Result<Value> {
        let mut inner = self.lock()?;
        inner.online()?;
        let record = inner
            .component_mut(component_type, id)
            .ok_or_else(|| EditorError::not_found(format!("{} {}", component_type, id)))?;
        values.insert("id".to_string(), id.to_value());
        *record = Value::Object(values);
        Ok(record.clone())
    }
}

#[async_trait]
impl ReferenceResolver for MemoryStore {
    #[instrument(skip(self, refs), fields(count = refs.len()))]
    async fn resolve(&self, refs: &[ComponentRef]) -> Result<Vec<ResolvedRecord>> {
        let mut inner = self.lock()?;
        inner.online()?;
        inner.resolve_calls += 1;
        if inner.resolver_down {
            return Err(EditorError::transport("resolver is unavailable"));
        }

        let mut resolved = Vec::with_capacity(refs.len());
        for reference in refs {
            if let Some(record) = inner.component_mut(&reference.component_type, &reference.object_id) {
                resolved.push(ResolvedRecord {
                    component_type: reference.component_type.clone(),
                    object_id: reference.object_id.clone(),
                    record: record.clone(),
                });
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn list(&self, page_id: &str, query: &TemplateQuery) -> Result<Vec<Template>> {
        let inner = self.lock()?;
        inner.online()?;
        Ok(inner
            .templates
            .get(page_id)
            .map(|all| all.iter().filter(|t| query.matches(t)).cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, page_id: &str, id: &RecordId) -> Result<Template> {
        let inner = self.lock()?;
        inner.online()?;
        inner
            .templates
            .get(page_id)
            .and_then(|all| all.iter().find(|t| &t.id == id))
            .cloned()
            .ok_or_else(|| EditorError::not_found(format!("template {}", id)))
    }

    async fn create(&self, page_id: &str, template: NewTemplate) -> Result<Template> {
        let mut inner = self.lock()?;
        inner.online()?;
        let now = Utc::now();
        let created = Template {
            id: RecordId::Int(inner.allocate_id()),
            name: template.name,
            content: template.content,
            block_id: template.block_id,
            component_type: template.component_type,
            created_at: now,
            updated_at: now,
        };
        inner
            .templates
            .entry(page_id.to_string())
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn update(&self, page_id: &str, id: &RecordId, changes: TemplateUpdate) -> Result<Template> {
        let mut inner = self.lock()?;
        inner.online()?;
        let template = inner
            .templates
            .get_mut(page_id)
            .and_then(|all| all.iter_mut().find(|t| &t.id == id))
            .ok_or_else(|| EditorError::not_found(format!("template {}", id)))?;

        if let Some(name) = changes.name {
            template.name = name;
        }
        if let Some(content) = changes.content {
            template.content = content;
        }
        template.updated_at = Utc::now();
        Ok(template.clone())
    }

    async fn delete(&self, page_id: &str, id: &RecordId) -> Result<()> {
        let mut inner = self.lock()?;
        inner.online()?;
        let templates = inner
            .templates
            .get_mut(page_id)
            .ok_or_else(|| EditorError::not_found(format!("template {}", id)))?;
        let before = templates.len();
        templates.retain(|t| &t.id != id);
        if templates.len() == before {
            return Err(EditorError::not_found(format!("template {}", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BlockId;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_page_loads_empty() {
        let store = MemoryStore::new();
        let page = store.load_content("p1").await.unwrap();
        assert!(page.content.is_none());
        assert_eq!(page.status, PublicationStatus::Draft);
    }

    #[tokio::test]
    async fn test_offline_store_fails_with_transport_error() {
        let store = MemoryStore::new();
        store.set_offline(true).unwrap();
        let err = store.load_content("p1").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_component_search_and_pagination() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .insert_component("question", json!({"text": format!("Question {}", i)}))
                .unwrap();
        }
        store
            .insert_component("image", json!({"url": "question.png"}))
            .unwrap();

        let page = ComponentStore::list(
            &store,
            "question",
            &ComponentQuery::first_page(2).search("QUESTION"),
        )
        .await
        .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert!(page.has_next());
    }

    #[tokio::test]
    async fn test_resolve_skips_missing_records() {
        let store = MemoryStore::new();
        let id = store
            .insert_component("question", json!({"id": 42, "text": "Why?"}))
            .unwrap();
        assert_eq!(id, RecordId::Int(42));

        let resolved = store
            .resolve(&[
                ComponentRef {
                    component_type: "question".to_string(),
                    object_id: RecordId::Int(42),
                },
                ComponentRef {
                    component_type: "question".to_string(),
                    object_id: RecordId::Int(7),
                },
            ])
            .await
            .unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].record["text"], json!("Why?"));
        assert_eq!(store.resolve_calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_publish_answer_is_used_once() {
        let store = MemoryStore::new();
        store
            .script_publish(PublishResponse::Success(json!({"ok": true})))
            .unwrap();

        let first = store.publish_content("p1", "garbage".to_string()).await.unwrap();
        assert!(matches!(first, PublishResponse::Success(_)));

        let second = store.publish_content("p1", "garbage".to_string()).await.unwrap();
        assert!(matches!(second, PublishResponse::Failure(_)));
    }

    #[tokio::test]
    async fn test_template_crud() {
        let store = MemoryStore::new();
        let created = TemplateStore::create(
            &store,
            "p1",
            NewTemplate {
                name: "Warm-up".to_string(),
                content: "{}".to_string(),
                block_id: BlockId::from("b1"),
                component_type: "question".to_string(),
            },
        )
        .await
        .unwrap();

        let updated = TemplateStore::update(
            &store,
            "p1",
            &created.id,
            TemplateUpdate {
                name: Some("Warm-up quiz".to_string()),
                content: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Warm-up quiz");

        let found = TemplateStore::list(
            &store,
            "p1",
            &TemplateQuery {
                search: Some("quiz".to_string()),
                component_type: Some("question".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);

        assert!(TemplateStore::list(&store, "p2", &TemplateQuery::default())
            .await
            .unwrap()
            .is_empty());

        TemplateStore::delete(&store, "p1", &created.id).await.unwrap();
        assert!(TemplateStore::get(&store, "p1", &created.id).await.is_err());
    }
}
