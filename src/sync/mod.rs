//! # Sync
//!
//! [`EditorSession`] is one open lesson page: it owns the [`EditorState`] and
//! talks to the stores for load, save and publish, plus the component and
//! template flows in the sibling modules. Store failures are reported on the
//! notification channel and leave the in-memory state exactly as it was.

mod components;
mod resolve;
mod templates;

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::SyncConfig;
use crate::editor::{CommandOutcome, EditCommand, EditorState};
use crate::errors::{with_retry, with_timeout, EditorError, Result};
use crate::models::{
    Block, BlockId, DataField, Document, PublicationStatus, PublishResponse, Values,
};
use crate::notify::{Notice, Notifier, TracingNotifier};
use crate::registry::{Registry, Rendered};
use crate::store::Backend;

pub use components::ImportMode;
pub use resolve::{apply_resolved, collect_placeholders};

pub struct EditorSession {
    page_id: String,
    state: EditorState,
    registry: Arc<Registry>,
    backend: Backend,
    notifier: Arc<dyn Notifier>,
    config: SyncConfig,
}

impl EditorSession {
    pub fn new<T: Into<String>>(page_id: T, registry: Arc<Registry>, backend: Backend) -> Self {
        Self {
            page_id: page_id.into(),
            state: EditorState::new(),
            registry,
            backend,
            notifier: Arc::new(TracingNotifier),
            config: SyncConfig::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// Direct access for the synchronous edit operations.
    pub fn state_mut(&mut self) -> &mut EditorState {
        &mut self.state
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn apply(&mut self, command: EditCommand) -> Result<CommandOutcome> {
        self.state.apply(&self.registry, command)
    }

    pub fn render(&self) -> Vec<Rendered> {
        self.registry.render_document(self.state.blocks())
    }

    /* ------------------------------ plumbing ----------------------------- */

    /// Idempotent read: bounded by the request timeout and retried on
    /// transient failures.
    async fn read<T, F, Fut>(&self, operation_name: &str, mut request: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout_ms = self.config.request_timeout_ms;
        with_retry(
            || with_timeout(timeout_ms, request()),
            &self.config.retry,
            operation_name,
        )
        .await
    }

    /// Non-idempotent call: issued exactly once.
    async fn write<T, Fut>(&self, request: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        with_timeout(self.config.request_timeout_ms, request).await
    }

    /// Surface a failure on the notification channel and pass it on.
    fn report<T>(&self, action: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!("{} failed for page {}: {}", action, self.page_id, e);
            self.notifier.notify(Notice::error(format!("{} failed: {}", action, e)));
        }
        result
    }

    /* -------------------------------- load ------------------------------- */

    /// Fetch, parse and resolve the page's document, then hydrate the state
    /// in one step. On any failure the state is left untouched.
    #[instrument(skip(self), fields(page_id = %self.page_id))]
    pub async fn load(&mut self) -> Result<()> {
        let result = self.fetch_document().await;
        let (document, status) = self.report("Loading page", result)?;

        info!("Loaded page {} with {} blocks", self.page_id, document.blocks.len());
        self.state.set_initial_content(document);
        self.state.set_publication_status(status);
        Ok(())
    }

    async fn fetch_document(&self) -> Result<(Document, PublicationStatus)> {
        let page = self
            .read("load_content", || self.backend.content.load_content(&self.page_id))
            .await?;

        let mut document = match page.content.as_deref().map(str::trim) {
            Some(content) if !content.is_empty() => Document::parse(content)?,
            _ => self.seed_document()?,
        };

        let refs = collect_placeholders(&self.registry, &document.blocks);
        if !refs.is_empty() {
            let resolved = self
                .read("resolve", || self.backend.resolver.resolve(&refs))
                .await?;
            let updated = apply_resolved(&self.registry, &mut document.blocks, &resolved);
            debug!("Resolved {} of {} component references", updated, refs.len());

            let unresolved = refs
                .iter()
                .filter(|r| {
                    !resolved
                        .iter()
                        .any(|f| f.component_type == r.component_type && f.object_id == r.object_id)
                })
                .count();
            if unresolved > 0 {
                self.notifier.notify(Notice::warning(format!(
                    "{} linked components could not be found",
                    unresolved
                )));
            }
        }

        Ok((document, page.status))
    }

    /// First-time content: one block of the configured seed type.
    fn seed_document(&self) -> Result<Document> {
        let seed_type = &self.config.seed_block_type;
        let spec = self.registry.require(seed_type)?;
        debug!("Page {} has no content yet, seeding a {} block", self.page_id, seed_type);
        Ok(Document::new(vec![Block::new(
            seed_type.clone(),
            DataField::inline(spec.initial.seed()),
        )]))
    }

    /* ------------------------------ save/publish ------------------------- */

    #[instrument(skip(self), fields(page_id = %self.page_id))]
    pub async fn save(&mut self) -> Result<()> {
        let result = match self.state.to_document().to_json() {
            Ok(content) => {
                self.write(self.backend.content.save_content(&self.page_id, content))
                    .await
            }
            Err(e) => Err(e),
        };
        self.report("Saving page", result)?;

        self.state.mark_saved();
        self.notifier.notify(Notice::success("Page saved"));
        Ok(())
    }

    /// Submit the document for publication. A rejection is not an `Err`: its
    /// block errors replace the previous ones and the draft stays as it is.
    /// A transport failure changes nothing.
    #[instrument(skip(self), fields(page_id = %self.page_id))]
    pub async fn publish(&mut self) -> Result<PublishResponse> {
        let result = match self.state.to_document().to_json() {
            Ok(content) => {
                self.write(self.backend.content.publish_content(&self.page_id, content))
                    .await
            }
            Err(e) => Err(e),
        };
        let response = self.report("Publishing page", result)?;

        // errors of the previous round survive until an answer replaces them
        self.state.clear_errors();
        match &response {
            PublishResponse::Success(_) => {
                info!("Published page {}", self.page_id);
                self.state.set_publication_status(PublicationStatus::Published);
                self.state.mark_saved();
                self.notifier.notify(Notice::success("Page published"));
            }
            PublishResponse::Failure(failure) => {
                warn!(
                    "Publish of page {} rejected with {} block errors",
                    self.page_id,
                    failure.errors.len()
                );
                self.state.push_errors(failure.errors.iter().cloned());
                self.notifier.notify(Notice::error(failure.message.clone()));
            }
        }
        Ok(response)
    }

    /// Fill in the skeleton keys `values` lacks for its block type.
    fn complete_values(&self, block_type: &str, values: Values) -> Values {
        match self.registry.lookup(block_type) {
            Some(spec) => spec.initial.complete(values),
            None => values,
        }
    }

    /// Error for a block id that is not in the current document.
    fn missing(id: &BlockId) -> EditorError {
        EditorError::BlockNotFound(id.clone())
    }
}
