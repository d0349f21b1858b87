//! Template capture, import and CRUD for one session.

use serde_json::Value;
use tracing::{info, instrument};

use super::EditorSession;
use crate::errors::{EditorError, Result};
use crate::models::{
    BlockId, DataField, NewTemplate, RecordId, Reference, Template, TemplateQuery, TemplateUpdate,
    Values,
};
use crate::notify::Notice;

impl EditorSession {
    /// List the page's templates and refresh the state's template cache.
    #[instrument(skip(self))]
    pub async fn list_templates(&mut self, query: &TemplateQuery) -> Result<Vec<Template>> {
        let result = self
            .read("list_templates", || {
                self.backend.templates.list(&self.page_id, query)
            })
            .await;
        let templates = self.report("Loading templates", result)?;

        self.state.set_templates(templates.clone());
        Ok(templates)
    }

    pub async fn get_template(&self, id: &RecordId) -> Result<Template> {
        let result = self
            .read("get_template", || self.backend.templates.get(&self.page_id, id))
            .await;
        self.report("Loading template", result)
    }

    /// Capture a block's whole data field as a named template of its type.
    #[instrument(skip(self))]
    pub async fn make_template_from_block(
        &mut self,
        block_id: &BlockId,
        name: &str,
    ) -> Result<Template> {
        let result = self.create_template(block_id, name).await;
        let template = self.report("Creating template", result)?;

        info!("Created template {} from block {}", template.id, block_id);
        self.state.upsert_template(template.clone());
        self.notifier
            .notify(Notice::success(format!("Template '{}' created", template.name)));
        Ok(template)
    }

    async fn create_template(&self, block_id: &BlockId, name: &str) -> Result<Template> {
        let block = self.state.block(block_id).ok_or_else(|| Self::missing(block_id))?;
        let template = NewTemplate {
            name: name.to_string(),
            content: serde_json::to_string(&block.data)?,
            block_id: block.id.clone(),
            component_type: block.block_type.clone(),
        };
        self.write(self.backend.templates.create(&self.page_id, template))
            .await
    }

    pub async fn update_template(
        &mut self,
        id: &RecordId,
        changes: TemplateUpdate,
    ) -> Result<Template> {
        let result = self
            .write(self.backend.templates.update(&self.page_id, id, changes))
            .await;
        let template = self.report("Updating template", result)?;

        self.state.upsert_template(template.clone());
        Ok(template)
    }

    pub async fn delete_template(&mut self, id: &RecordId) -> Result<()> {
        let result = self
            .write(self.backend.templates.delete(&self.page_id, id))
            .await;
        self.report("Deleting template", result)?;

        self.state.remove_template(id);
        self.notifier.notify(Notice::success("Template deleted"));
        Ok(())
    }

    /// Copy a template's `values` into a block of the same type as a frozen
    /// snapshot tagged with the template id. Keys the template lacks come
    /// from the type's blank skeleton. Whatever `obj` or reference the
    /// template captured is dropped.
    pub fn import_template(&mut self, template: &Template, target: &BlockId) -> Result<()> {
        let block = self.state.block(target).ok_or_else(|| Self::missing(target))?;
        if block.block_type != template.component_type {
            return Err(EditorError::TemplateTypeMismatch {
                template: template.component_type.clone(),
                block: block.block_type.clone(),
            });
        }

        let values = self.complete_values(&block.block_type, template_values(&template.content)?);
        self.state.replace_block_data(
            target,
            DataField {
                obj: None,
                values,
                is_static: true,
                reference: Reference::Template(template.id.clone()),
            },
        )?;

        info!("Imported template {} into block {}", template.id, target);
        Ok(())
    }

    /// Fetch a template by id, then [`Self::import_template`] it.
    pub async fn import_template_by_id(&mut self, id: &RecordId, target: &BlockId) -> Result<()> {
        let template = self.get_template(id).await?;
        let result = self.import_template(&template, target);
        self.report("Importing template", result)
    }
}

/// The `values` object of a captured data field.
fn template_values(content: &str) -> Result<Values> {
    let data: Value = serde_json::from_str(content)?;
    Ok(data
        .get("values")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default())
}
