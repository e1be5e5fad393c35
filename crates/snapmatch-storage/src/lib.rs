//! Snapmatch Storage Library
//!
//! Blob-store abstraction consumed by the upload orchestrator and the face
//! pipelines, with an S3 backend (via `object_store`) and an in-memory
//! backend used in tests and local development.
//!
//! # Key format
//!
//! Keys follow the conventions in `snapmatch_core::naming`:
//!
//! - Shared event images: `events/shared/{event_id}/images/{millis}-{index}-{name}`
//! - Selfies: `users/{user_id}/selfies/selfie-{millis}-{name}`
//!
//! Backends treat keys as opaque; key generation stays in `snapmatch-core`
//! so the upload and search paths cannot drift apart.

pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

pub use memory::MemoryBlobStore;
#[cfg(feature = "storage-s3")]
pub use s3::S3BlobStore;
pub use traits::{BlobStore, ListPage, StorageError, StorageResult};
