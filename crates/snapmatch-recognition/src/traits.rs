//! Face-recognition abstraction trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recognition service errors, classified for retry policy: throttling is
/// retryable with backoff, a missing collection triggers the cold-start
/// recovery path, everything else is a permanent per-image failure.
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("Rate limited by recognition service: {0}")]
    Throttled(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Invalid or unreadable image: {0}")]
    InvalidImage(String),

    #[error("Recognition service error: {0}")]
    Service(String),
}

impl RecognitionError {
    pub fn is_throttle(&self) -> bool {
        matches!(self, RecognitionError::Throttled(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RecognitionError::CollectionNotFound(_))
    }
}

pub type RecognitionResult<T> = Result<T, RecognitionError>;

/// Outcome of a collection create: creating an already-present collection
/// is success, callers create lazily.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    Created,
    AlreadyExists,
}

/// One face match returned by [`FaceIndex::search_by_image`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceHit {
    /// External image id attached when the face was indexed. `None` for
    /// faces indexed without one (never produced by this pipeline, but the
    /// collection may be shared).
    pub external_image_id: Option<String>,
    /// Similarity score 0-100.
    pub similarity: f32,
    pub face_id: Option<String>,
}

/// Face-recognition service capability as consumed by the pipeline.
///
/// Images are referenced by their blob-store key; backends resolve the key
/// against their configured bucket. External image ids are the join key
/// back to stored blobs and must survive indexing verbatim.
#[async_trait]
pub trait FaceIndex: Send + Sync {
    /// Create a collection, returning `AlreadyExists` instead of an error
    /// when it is already present.
    async fn create_collection(&self, collection_id: &str) -> RecognitionResult<CollectionStatus>;

    /// Index all faces found in the stored image, tagging each with
    /// `external_image_id`. Returns the new face ids.
    async fn index_image(
        &self,
        collection_id: &str,
        object_key: &str,
        external_image_id: &str,
    ) -> RecognitionResult<Vec<String>>;

    /// Search the collection with the largest face in the stored image.
    async fn search_by_image(
        &self,
        collection_id: &str,
        object_key: &str,
        max_results: u32,
        min_similarity: f32,
    ) -> RecognitionResult<Vec<FaceHit>>;

    /// Remove faces from a collection by face id.
    async fn delete_faces(&self, collection_id: &str, face_ids: &[String])
        -> RecognitionResult<()>;
}
