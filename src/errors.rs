use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::models::BlockId;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Duplicate block type in registry: {0}")]
    DuplicateBlockType(String),

    #[error("Unknown block type: {0}")]
    UnknownBlockType(String),

    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    #[error("Block is static and cannot be edited: {0}")]
    StaticBlock(BlockId),

    #[error("Block type has no import descriptor: {0}")]
    NoImportDescriptor(String),

    #[error("Template of type '{template}' cannot be imported into a '{block}' block")]
    TemplateTypeMismatch { template: String, block: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Document parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timeout error: operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Retry limit exceeded: {attempts} attempts failed")]
    RetryLimitExceeded { attempts: u32 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EditorError {
    pub fn unknown_block_type<T: Into<String>>(tag: T) -> Self {
        EditorError::UnknownBlockType(tag.into())
    }

    pub fn no_import_descriptor<T: Into<String>>(tag: T) -> Self {
        EditorError::NoImportDescriptor(tag.into())
    }

    pub fn transport<T: Into<String>>(msg: T) -> Self {
        EditorError::Transport(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        EditorError::NotFound(msg.into())
    }

    pub fn timeout_error(timeout_ms: u64) -> Self {
        EditorError::Timeout { timeout_ms }
    }

    pub fn retry_limit_exceeded(attempts: u32) -> Self {
        EditorError::RetryLimitExceeded { attempts }
    }

    pub fn internal_error<T: Into<String>>(msg: T) -> Self {
        EditorError::Internal(msg.into())
    }

    /// Failures worth another attempt: the request may succeed unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, EditorError::Transport(_) | EditorError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;

/// Retry configuration for idempotent store reads
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Execute an async fallible operation with retry logic.
///
/// Only transient errors are retried; anything else is returned as soon as
/// it is seen.
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    config: &RetryConfig,
    operation_name: &str,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = config.initial_delay_ms;
    let attempts = config.max_attempts.max(1);

    for attempt in 1..=attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    "Operation '{}' failed on attempt {} of {}: {}",
                    operation_name,
                    attempt,
                    attempts,
                    e
                );

                if attempt < attempts {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    delay = (delay as f64 * config.backoff_multiplier) as u64;
                    delay = delay.min(config.max_delay_ms);
                }
            }
        }
    }

    Err(EditorError::retry_limit_exceeded(attempts))
}

/// Bound a single store request by `timeout_ms`.
pub async fn with_timeout<Fut, T>(timeout_ms: u64, request: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), request).await {
        Ok(result) => result,
        Err(_) => Err(EditorError::timeout_error(timeout_ms)),
    }
}
