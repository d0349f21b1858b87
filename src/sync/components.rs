//! Component import, search and commit for one session.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use super::EditorSession;
use crate::errors::{EditorError, Result};
use crate::models::{BlockId, ComponentQuery, DataField, Paginated, RecordId, Reference};
use crate::notify::Notice;
use crate::registry::ImportDescriptor;

/// How a picked component record is attached to a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Keep a live link (`element_id`); the block stays editable.
    Live,
    /// Copy the content as a frozen snapshot.
    Static,
}

impl EditorSession {
    fn import_descriptor(&self, block_type: &str) -> Result<&ImportDescriptor> {
        self.registry
            .require(block_type)?
            .import
            .as_ref()
            .ok_or_else(|| EditorError::no_import_descriptor(block_type))
    }

    /// One page of component records that can be imported into `block_type`.
    #[instrument(skip(self, query))]
    pub async fn search_components(
        &self,
        block_type: &str,
        query: &ComponentQuery,
    ) -> Result<Paginated<Value>> {
        let component_type = self.import_descriptor(block_type)?.component_type.clone();
        let result = self
            .read("list_components", || {
                self.backend.components.list(&component_type, query)
            })
            .await;
        self.report("Searching components", result)
    }

    /// Attach a record picked on the import surface to a block.
    pub fn import_component(
        &mut self,
        block_id: &BlockId,
        record: &Value,
        mode: ImportMode,
    ) -> Result<()> {
        let block = self.state.block(block_id).ok_or_else(|| Self::missing(block_id))?;
        let values = self.import_descriptor(&block.block_type)?.project(record);
        let values = self.complete_values(&block.block_type, values);

        let data = match mode {
            ImportMode::Live => {
                let id = RecordId::of(record).ok_or_else(|| {
                    EditorError::internal_error("component record carries no id")
                })?;
                DataField {
                    obj: Some(record.clone()),
                    values,
                    is_static: false,
                    reference: Reference::Live(id),
                }
            }
            ImportMode::Static => DataField {
                obj: None,
                values,
                is_static: true,
                reference: Reference::None,
            },
        };

        self.state.replace_block_data(block_id, data)
    }

    /// Persist a block's `values` as a component record: created when the
    /// block has no live link yet, updated in place otherwise. The block is
    /// re-linked to the stored record.
    #[instrument(skip(self))]
    pub async fn commit_block(&mut self, block_id: &BlockId) -> Result<Value> {
        let result = self.store_block(block_id).await;
        let record = self.report("Saving component", result)?;

        let block_type = self.block_type_of(block_id)?;
        let values = self.import_descriptor(&block_type)?.project(&record);
        let values = self.complete_values(&block_type, values);
        let id = RecordId::of(&record)
            .ok_or_else(|| EditorError::internal_error("stored component carries no id"))?;

        self.state.replace_block_data(
            block_id,
            DataField {
                obj: Some(record.clone()),
                values,
                is_static: false,
                reference: Reference::Live(id.clone()),
            },
        )?;

        info!("Committed block {} as component {}", block_id, id);
        self.notifier.notify(Notice::success("Component saved"));
        Ok(record)
    }

    async fn store_block(&self, block_id: &BlockId) -> Result<Value> {
        let block = self.state.block(block_id).ok_or_else(|| Self::missing(block_id))?;
        if block.data.is_static {
            return Err(EditorError::StaticBlock(block_id.clone()));
        }
        let component_type = &self.import_descriptor(&block.block_type)?.component_type;
        let values = block.data.values.clone();

        match &block.data.reference {
            Reference::Live(id) => {
                self.write(self.backend.components.update(component_type, id, values))
                    .await
            }
            Reference::None | Reference::Template(_) => {
                self.write(self.backend.components.create(component_type, values))
                    .await
            }
        }
    }

    fn block_type_of(&self, block_id: &BlockId) -> Result<String> {
        self.state
            .block(block_id)
            .map(|b| b.block_type.clone())
            .ok_or_else(|| Self::missing(block_id))
    }
}
