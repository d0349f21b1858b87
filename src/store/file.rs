//! Directory-backed store. Every record is a pretty-printed JSON file:
//!
//! ```text
//! <root>/pages/<page>.json             PageContent
//! <root>/published/<page>.json         last published document
//! <root>/components/<type>/<id>.json   component record
//! <root>/templates/<page>.json         Vec<Template>
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::{check_publishable, check_segment, record_matches, ComponentStore, PageContentStore, ReferenceResolver, TemplateStore};
use crate::errors::{EditorError, Result};
use crate::models::{
    ComponentQuery, ComponentRef, NewTemplate, PageContent, Paginated, PublicationStatus,
    PublishResponse, RecordId, ResolvedRecord, Template, TemplateQuery, TemplateUpdate, Values,
};
use crate::registry::Registry;

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    validator: Option<Registry>,
    /// Serializes read-modify-write cycles (id allocation, template files).
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            validator: Registry::standard().ok().cloned(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_registry<P: Into<PathBuf>>(root: P, registry: Registry) -> Self {
        Self {
            root: root.into(),
            validator: Some(registry),
            write_lock: Mutex::new(()),
        }
    }

    fn page_path(&self, page_id: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join("pages")
            .join(format!("{}.json", check_segment("page", page_id)?)))
    }

    fn published_path(&self, page_id: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join("published")
            .join(format!("{}.json", check_segment("page", page_id)?)))
    }

    fn component_dir(&self, component_type: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join("components")
            .join(check_segment("component type", component_type)?))
    }

    fn component_path(&self, component_type: &str, id: &RecordId) -> Result<PathBuf> {
        let id = id.to_string();
        Ok(self
            .component_dir(component_type)?
            .join(format!("{}.json", check_segment("record id", &id)?)))
    }

    fn templates_path(&self, page_id: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join("templates")
            .join(format!("{}.json", check_segment("page", page_id)?)))
    }

    /* ------------------------------ raw files ---------------------------- */

    async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match fs::read_to_string(path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let text = serde_json::to_string_pretty(value)?;
        fs::write(path, text).await?;
        Ok(())
    }

    async fn read_components(&self, component_type: &str) -> Result<Vec<Value>> {
        let dir = self.component_dir(component_type)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(record) = Self::read_json::<Value>(&path).await? {
                records.push(record);
            }
        }
        // Directory order is unspecified; keep listings stable.
        records.sort_by_key(|r| match RecordId::of(r) {
            Some(RecordId::Int(n)) => (0, n, String::new()),
            Some(RecordId::Text(s)) => (1, 0, s),
            None => (2, 0, String::new()),
        });
        Ok(records)
    }

    async fn read_templates(&self, page_id: &str) -> Result<Vec<Template>> {
        Ok(Self::read_json(&self.templates_path(page_id)?)
            .await?
            .unwrap_or_default())
    }

    async fn next_component_id(&self, component_type: &str) -> Result<i64> {
        let max = self
            .read_components(component_type)
            .await?
            .iter()
            .filter_map(|r| match RecordId::of(r) {
                Some(RecordId::Int(n)) => Some(n),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }
}

#[async_trait]
impl PageContentStore for FileStore {
    #[instrument(skip(self))]
    async fn load_content(&self, page_id: &str) -> Result<PageContent> {
        let page: Option<PageContent> = Self::read_json(&self.page_path(page_id)?).await?;
        Ok(page.unwrap_or_default())
    }

    #[instrument(skip(self, content))]
    async fn save_content(&self, page_id: &str, content: String) -> Result<()> {
        let path = self.page_path(page_id)?;
        let _guard = self.write_lock.lock().await;

        let mut page: PageContent = Self::read_json(&path).await?.unwrap_or_default();
        page.content = Some(content);
        Self::write_json(&path, &page).await?;
        debug!("Saved page {} to {}", page_id, path.display());
        Ok(())
    }

    #[instrument(skip(self, content))]
    async fn publish_content(&self, page_id: &str, content: String) -> Result<PublishResponse> {
        let path = self.page_path(page_id)?;
        let _guard = self.write_lock.lock().await;

        let response = check_publishable(&content, self.validator.as_ref());
        let mut page: PageContent = Self::read_json(&path).await?.unwrap_or_default();
        page.content = Some(content.clone());

        if let PublishResponse::Success(_) = response {
            page.status = PublicationStatus::Published;
            let document: Value = serde_json::from_str(&content)?;
            Self::write_json(&self.published_path(page_id)?, &document).await?;
            info!("Published page {}", page_id);
        }
        Self::write_json(&path, &page).await?;
        Ok(response)
    }
}

#[async_trait]
impl ComponentStore for FileStore {
    async fn list(&self, component_type: &str, query: &ComponentQuery) -> Result<Paginated<Value>> {
        let matching: Vec<Value> = self
            .read_components(component_type)
            .await?
            .into_iter()
            .filter(|record| {
                query
                    .search
                    .as_deref()
                    .map_or(true, |term| record_matches(record, term))
            })
            .collect();
        Ok(Paginated::from_all(matching, query.page, query.page_size))
    }

    async fn get(&self, component_type: &str, id: &RecordId) -> Result<Value> {
        Self::read_json(&self.component_path(component_type, id)?)
            .await?
            .ok_or_else(|| EditorError::not_found(format!("{} {}", component_type, id)))
    }

    async fn create(&self, component_type: &str, mut values: Values) -> Result<Value> {
        let _guard = self.write_lock.lock().await;
        let id = RecordId::Int(self.next_component_id(component_type).await?);
        values.insert("id".to_string(), id.to_value());

        let record = Value::Object(values);
        Self::write_json(&self.component_path(component_type, &id)?, &record).await?;
        debug!("Created {} {}", component_type, id);
        Ok(record)
    }

    async fn update(&self, component_type: &str, id: &RecordId, mut values: Values) -> Result<Value> {
        let path = self.component_path(component_type, id)?;
        let _guard = self.write_lock.lock().await;
        if fs::metadata(&path).await.is_err() {
            return Err(EditorError::not_found(format!("{} {}", component_type, id)));
        }

        values.insert("id".to_string(), id.to_value());
        let record = Value::Object(values);
        Self::write_json(&path, &record).await?;
        Ok(record)
    }
}

#[async_trait]
impl ReferenceResolver for FileStore {
    #[instrument(skip(self, refs), fields(count = refs.len()))]
    async fn resolve(&self, refs: &[ComponentRef]) -> Result<Vec<ResolvedRecord>> {
        let mut resolved = Vec::with_capacity(refs.len());
        for reference in refs {
            let path = self.component_path(&reference.component_type, &reference.object_id)?;
            if let Some(record) = Self::read_json::<Value>(&path).await? {
                resolved.push(ResolvedRecord {
                    component_type: reference.component_type.clone(),
                    object_id: reference.object_id.clone(),
                    record,
                });
            }
        }
        Ok(resolved)
    }
}

#[async_trait]
impl TemplateStore for FileStore {
    async fn list(&self, page_id: &str, query: &TemplateQuery) -> Result<Vec<Template>> {
        Ok(self
            .read_templates(page_id)
            .await?
            .into_iter()
            .filter(|t| query.matches(t))
            .collect())
    }

    async fn get(&self, page_id: &str, id: &RecordId) -> Result<Template> {
        self.read_templates(page_id)
            .await?
            .into_iter()
            .find(|t| &t.id == id)
            .ok_or_else(|| EditorError::not_found(format!("template {}", id)))
    }

    async fn create(&self, page_id: &str, template: NewTemplate) -> Result<Template> {
        let _guard = self.write_lock.lock().await;
        let mut templates = self.read_templates(page_id).await?;
        let next = templates
            .iter()
            .filter_map(|t| match t.id {
                RecordId::Int(n) => Some(n),
                RecordId::Text(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let now = Utc::now();
        let created = Template {
            id: RecordId::Int(next),
            name: template.name,
            content: template.content,
            block_id: template.block_id,
            component_type: template.component_type,
            created_at: now,
            updated_at: now,
        };
        templates.push(created.clone());
        Self::write_json(&self.templates_path(page_id)?, &templates).await?;
        Ok(created)
    }

    async fn update(&self, page_id: &str, id: &RecordId, changes: TemplateUpdate) -> Result<Template> {
        let _guard = self.write_lock.lock().await;
        let mut templates = self.read_templates(page_id).await?;
        let template = templates
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| EditorError::not_found(format!("template {}", id)))?;

        if let Some(name) = changes.name {
            template.name = name;
        }
        if let Some(content) = changes.content {
            template.content = content;
        }
        template.updated_at = Utc::now();
        let updated = template.clone();

        Self::write_json(&self.templates_path(page_id)?, &templates).await?;
        Ok(updated)
    }

    async fn delete(&self, page_id: &str, id: &RecordId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut templates = self.read_templates(page_id).await?;
        let before = templates.len();
        templates.retain(|t| &t.id != id);
        if templates.len() == before {
            return Err(EditorError::not_found(format!("template {}", id)));
        }
        Self::write_json(&self.templates_path(page_id)?, &templates).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, BlockId, DataField, Document};
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_missing_page_is_empty_draft() {
        let (_dir, store) = store();
        let page = store.load_content("lesson-1").await.unwrap();
        assert!(page.content.is_none());
        assert_eq!(page.status, PublicationStatus::Draft);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let (_dir, store) = store();
        store
            .save_content("lesson-1", "{\"blocks\":[]}".to_string())
            .await
            .unwrap();
        let page = store.load_content("lesson-1").await.unwrap();
        assert_eq!(page.content.as_deref(), Some("{\"blocks\":[]}"));
    }

    #[tokio::test]
    async fn test_rejects_path_escapes() {
        let (_dir, store) = store();
        assert!(store.load_content("../secrets").await.is_err());
    }

    #[tokio::test]
    async fn test_publish_writes_snapshot_and_status() {
        let (dir, store) = store();
        let content = Document::new(vec![Block {
            id: BlockId::from("b1"),
            block_type: "text".to_string(),
            data: DataField::inline(json!({"text": "Hello"}).as_object().cloned().unwrap()),
        }])
        .to_json()
        .unwrap();

        let response = store.publish_content("lesson-1", content).await.unwrap();
        assert!(matches!(response, PublishResponse::Success(_)));
        assert!(dir.path().join("published/lesson-1.json").exists());

        let page = store.load_content("lesson-1").await.unwrap();
        assert_eq!(page.status, PublicationStatus::Published);
    }

    #[tokio::test]
    async fn test_component_create_update_resolve() {
        let (_dir, store) = store();
        let created = ComponentStore::create(
            &store,
            "question",
            json!({"text": "2 + 2?"}).as_object().cloned().unwrap(),
        )
        .await
        .unwrap();
        let id = RecordId::of(&created).unwrap();
        assert_eq!(id, RecordId::Int(1));

        ComponentStore::update(
            &store,
            "question",
            &id,
            json!({"text": "3 + 3?"}).as_object().cloned().unwrap(),
        )
        .await
        .unwrap();

        let resolved = store
            .resolve(&[ComponentRef {
                component_type: "question".to_string(),
                object_id: id.clone(),
            }])
            .await
            .unwrap();
        assert_eq!(resolved[0].record, json!({"id": 1, "text": "3 + 3?"}));

        let missing = ComponentStore::update(&store, "question", &RecordId::Int(9), Values::new()).await;
        assert!(matches!(missing, Err(EditorError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_templates_persist_per_page() {
        let (dir, store) = store();
        let created = TemplateStore::create(
            &store,
            "lesson-1",
            NewTemplate {
                name: "Intro".to_string(),
                content: "{}".to_string(),
                block_id: BlockId::from("b1"),
                component_type: "text".to_string(),
            },
        )
        .await
        .unwrap();

        let reopened = FileStore::new(dir.path());
        let found = TemplateStore::get(&reopened, "lesson-1", &created.id).await.unwrap();
        assert_eq!(found.name, "Intro");
        assert!(TemplateStore::list(&reopened, "lesson-2", &TemplateQuery::default())
            .await
            .unwrap()
            .is_empty());

        TemplateStore::delete(&reopened, "lesson-1", &created.id).await.unwrap();
        assert!(TemplateStore::delete(&reopened, "lesson-1", &created.id).await.is_err());
    }
}
