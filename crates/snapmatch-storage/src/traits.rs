//! Blob-store abstraction trait.

use async_trait::async_trait;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Put failed: {0}")]
    PutFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One page of a prefix listing.
#[derive(Debug, Default)]
pub struct ListPage {
    /// Keys in ascending order.
    pub keys: Vec<String>,
    /// Opaque continuation token; `None` when the listing is exhausted.
    pub next_token: Option<String>,
}

/// Key/value object store as seen by the pipeline.
///
/// The pipeline relies on idempotent keys rather than locking: a duplicate
/// `put` under the same key is harmless, and the listing is the ground
/// truth for what is stored (local retry bookkeeping may disagree after an
/// abandoned-but-completed transfer).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, overwriting any existing object.
    /// Returns the key on success.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<String>;

    /// List keys under `prefix`, one page at a time. Pass the previous
    /// page's `next_token` to continue.
    async fn list(&self, prefix: &str, continuation: Option<String>) -> StorageResult<ListPage>;

    /// Whether an object exists under `key`.
    async fn head(&self, key: &str) -> StorageResult<bool>;
}
