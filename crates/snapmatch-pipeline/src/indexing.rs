//! Face indexing: rate-paced, idempotent registration of stored images.
//!
//! Sub-batches run strictly sequentially with a mandatory pause between
//! them, pacing requests against the recognition service's rate budget;
//! images within a sub-batch are submitted concurrently.

use futures::future::join_all;
use tokio::time::sleep;

use snapmatch_core::config::IndexingConfig;
use snapmatch_core::naming::external_id_from_key;
use snapmatch_core::{PipelineError, PipelineResult};
use snapmatch_recognition::{CollectionStatus, FaceIndex, RecognitionError};
use snapmatch_storage::BlobStore;
use std::sync::Arc;

use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::{from_recognition, from_storage};

/// Per-image failure entry in an [`IndexOutcome`].
#[derive(Debug, Clone)]
pub struct IndexFailure {
    pub image_key: String,
    pub error: String,
}

/// Result of one `index_batch` call. Every submitted key appears in
/// exactly one of the two lists.
#[derive(Debug, Default)]
pub struct IndexOutcome {
    pub successful: Vec<String>,
    pub failed: Vec<IndexFailure>,
}

/// Registers stored images with the face-recognition collaborator.
///
/// The collection id is the event id; the external image id is the stored
/// key's final segment, which makes re-runs idempotent and search results
/// joinable back to blobs.
pub struct FaceIndexer {
    faces: Arc<dyn FaceIndex>,
    store: Arc<dyn BlobStore>,
    config: IndexingConfig,
}

impl FaceIndexer {
    pub fn new(
        faces: Arc<dyn FaceIndex>,
        store: Arc<dyn BlobStore>,
        config: IndexingConfig,
    ) -> Self {
        Self {
            faces,
            store,
            config,
        }
    }

    /// Index `image_keys` into the event's collection.
    ///
    /// Fails as a whole only when the collection can neither be found nor
    /// created; per-image errors land in `failed`.
    pub async fn index_batch(
        &self,
        event_id: &str,
        image_keys: &[String],
    ) -> PipelineResult<IndexOutcome> {
        self.ensure_collection(event_id).await?;

        let mut outcome = IndexOutcome::default();
        for (batch_number, chunk) in image_keys.chunks(self.config.sub_batch_size).enumerate() {
            if batch_number > 0 {
                sleep(self.config.inter_batch_pause).await;
            }

            tracing::debug!(
                event_id = %event_id,
                batch_number,
                batch_size = chunk.len(),
                "Indexing sub-batch"
            );

            let results = join_all(chunk.iter().map(|key| self.index_one(event_id, key))).await;
            for (key, result) in chunk.iter().zip(results) {
                match result {
                    Ok(()) => outcome.successful.push(key.clone()),
                    Err(error) => {
                        tracing::warn!(key = %key, error = %error, "Image failed to index");
                        outcome.failed.push(IndexFailure {
                            image_key: key.clone(),
                            error: error.to_string(),
                        });
                    }
                }
            }
        }

        tracing::info!(
            event_id = %event_id,
            successful = outcome.successful.len(),
            failed = outcome.failed.len(),
            "Index batch complete"
        );

        Ok(outcome)
    }

    async fn ensure_collection(&self, event_id: &str) -> PipelineResult<()> {
        match self.faces.create_collection(event_id).await {
            Ok(CollectionStatus::Created) => {
                tracing::info!(event_id = %event_id, "Created face collection");
                Ok(())
            }
            Ok(CollectionStatus::AlreadyExists) => Ok(()),
            Err(e) => Err(from_recognition(e)),
        }
    }

    async fn index_one(&self, event_id: &str, image_key: &str) -> PipelineResult<()> {
        let external_id = external_id_from_key(image_key)
            .ok_or_else(|| PipelineError::Validation(format!("malformed key: {}", image_key)))?;

        // The recognition service reads straight from the blob store, so a
        // key with no object behind it fails there with an opaque service
        // error; confirm existence first and report it as what it is.
        match self.store.head(image_key).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(PipelineError::NotFound(format!(
                    "no stored object at {}",
                    image_key
                )));
            }
            Err(e) => return Err(from_storage(e)),
        }

        if self.already_indexed(event_id, image_key, external_id).await {
            tracing::debug!(key = %image_key, "Already indexed, skipping");
            return Ok(());
        }

        let policy = RetryPolicy::new(
            self.config.max_index_attempts,
            self.config.initial_retry_delay,
            self.config.max_retry_delay,
        )
        .with_jitter(self.config.retry_jitter);

        let result = retry_with_backoff(&policy, RecognitionError::is_throttle, |_| {
            self.faces.index_image(event_id, image_key, external_id)
        })
        .await;

        match result {
            Ok((face_ids, _)) => {
                tracing::debug!(key = %image_key, faces = face_ids.len(), "Indexed image");
                Ok(())
            }
            Err((error, attempts)) => {
                tracing::warn!(key = %image_key, attempts, error = %error, "Indexing gave up");
                Err(from_recognition(error))
            }
        }
    }

    /// Disambiguation probe: a prior entry carrying this external id at
    /// very high confidence means the image's faces are already in the
    /// collection. Probe failures are treated as "not indexed" so the
    /// subsequent index call decides.
    async fn already_indexed(&self, event_id: &str, image_key: &str, external_id: &str) -> bool {
        match self
            .faces
            .search_by_image(event_id, image_key, 1, self.config.already_indexed_similarity)
            .await
        {
            Ok(hits) => hits.iter().any(|hit| {
                hit.external_image_id.as_deref() == Some(external_id)
                    && hit.similarity >= self.config.already_indexed_similarity
            }),
            Err(e) => {
                tracing::debug!(key = %image_key, error = %e, "Idempotency probe inconclusive");
                false
            }
        }
    }
}
