//! Shared test doubles: a fault-injecting blob store and a scripted face
//! index with call logging.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use snapmatch_core::config::{IndexingConfig, UploadConfig};
use snapmatch_core::models::SourceFile;
use snapmatch_core::naming::external_id_from_key;
use snapmatch_pipeline::MemoryGate;
use snapmatch_recognition::{
    CollectionStatus, FaceHit, FaceIndex, RecognitionError, RecognitionResult,
};
use snapmatch_storage::{BlobStore, ListPage, MemoryBlobStore, StorageError, StorageResult};

/// Upload config with sub-millisecond backoff so retry tests stay fast.
pub fn fast_upload_config() -> UploadConfig {
    UploadConfig {
        initial_retry_delay: Duration::from_millis(1),
        max_retry_delay: Duration::from_millis(5),
        retry_jitter: Duration::ZERO,
        ..UploadConfig::default()
    }
}

pub fn fast_indexing_config() -> IndexingConfig {
    IndexingConfig {
        inter_batch_pause: Duration::from_millis(50),
        initial_retry_delay: Duration::from_millis(1),
        max_retry_delay: Duration::from_millis(5),
        retry_jitter: Duration::ZERO,
        ..IndexingConfig::default()
    }
}

/// A small valid PNG wrapped in a [`SourceFile`].
pub fn png_file(name: &str) -> SourceFile {
    let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([10, 200, 30, 255]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
        .unwrap();
    SourceFile::new(name, "image/png", buffer)
}

/// Gate reporting memory above any high-water mark, forcing the
/// orchestrator's pause path on every transfer.
pub struct SaturatedGate;

impl MemoryGate for SaturatedGate {
    fn used_percent(&self) -> f64 {
        100.0
    }
}

/// Blob store that fails the first N puts for keys containing a fragment.
pub struct FlakyBlobStore {
    inner: MemoryBlobStore,
    put_failures: Mutex<Vec<(String, u32)>>,
}

impl FlakyBlobStore {
    pub fn new(inner: MemoryBlobStore) -> Self {
        Self {
            inner,
            put_failures: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_puts_containing(&self, fragment: &str, times: u32) {
        self.put_failures
            .lock()
            .unwrap()
            .push((fragment.to_string(), times));
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<String> {
        {
            let mut failures = self.put_failures.lock().unwrap();
            for (fragment, remaining) in failures.iter_mut() {
                if key.contains(fragment.as_str()) && *remaining > 0 {
                    *remaining -= 1;
                    return Err(StorageError::PutFailed(format!(
                        "injected failure for {}",
                        key
                    )));
                }
            }
        }
        self.inner.put(key, data, content_type).await
    }

    async fn list(&self, prefix: &str, continuation: Option<String>) -> StorageResult<ListPage> {
        self.inner.list(prefix, continuation).await
    }

    async fn head(&self, key: &str) -> StorageResult<bool> {
        self.inner.head(key).await
    }
}

/// Scripted face index: collections live in memory, searches combine
/// scripted hits with a high-confidence self-hit for already-indexed
/// images (which is what drives the idempotency probe).
#[derive(Default)]
pub struct ScriptedFaceIndex {
    collections: Mutex<HashSet<String>>,
    indexed: Mutex<HashMap<String, HashSet<String>>>,
    scripted_hits: Mutex<HashMap<String, Vec<FaceHit>>>,
    throttle_remaining: Mutex<HashMap<String, u32>>,
    always_fail: Mutex<HashSet<String>>,
    index_calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedFaceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(self, collection_id: &str) -> Self {
        self.collections
            .lock()
            .unwrap()
            .insert(collection_id.to_string());
        self
    }

    /// Script search hits for a given reference object key.
    pub fn script_hits(&self, reference_key: &str, hits: Vec<(&str, f32)>) {
        let hits = hits
            .into_iter()
            .enumerate()
            .map(|(i, (external_id, similarity))| FaceHit {
                external_image_id: Some(external_id.to_string()),
                similarity,
                face_id: Some(format!("face-{}", i)),
            })
            .collect();
        self.scripted_hits
            .lock()
            .unwrap()
            .insert(reference_key.to_string(), hits);
    }

    /// Throttle the next `times` index calls for keys containing `fragment`.
    pub fn throttle_next(&self, fragment: &str, times: u32) {
        self.throttle_remaining
            .lock()
            .unwrap()
            .insert(fragment.to_string(), times);
    }

    pub fn fail_indexing_of(&self, fragment: &str) {
        self.always_fail
            .lock()
            .unwrap()
            .insert(fragment.to_string());
    }

    pub fn index_call_log(&self) -> Vec<(String, Instant)> {
        self.index_calls.lock().unwrap().clone()
    }

    pub fn index_call_count(&self, fragment: &str) -> usize {
        self.index_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.contains(fragment))
            .count()
    }

    pub fn indexed_count(&self, collection_id: &str) -> usize {
        self.indexed
            .lock()
            .unwrap()
            .get(collection_id)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    pub fn has_collection(&self, collection_id: &str) -> bool {
        self.collections.lock().unwrap().contains(collection_id)
    }
}

#[async_trait]
impl FaceIndex for ScriptedFaceIndex {
    async fn create_collection(&self, collection_id: &str) -> RecognitionResult<CollectionStatus> {
        let mut collections = self.collections.lock().unwrap();
        if collections.insert(collection_id.to_string()) {
            Ok(CollectionStatus::Created)
        } else {
            Ok(CollectionStatus::AlreadyExists)
        }
    }

    async fn index_image(
        &self,
        collection_id: &str,
        object_key: &str,
        external_image_id: &str,
    ) -> RecognitionResult<Vec<String>> {
        if !self.collections.lock().unwrap().contains(collection_id) {
            return Err(RecognitionError::CollectionNotFound(
                collection_id.to_string(),
            ));
        }

        self.index_calls
            .lock()
            .unwrap()
            .push((object_key.to_string(), Instant::now()));

        {
            let mut throttles = self.throttle_remaining.lock().unwrap();
            for (fragment, remaining) in throttles.iter_mut() {
                if object_key.contains(fragment.as_str()) && *remaining > 0 {
                    *remaining -= 1;
                    return Err(RecognitionError::Throttled("injected throttle".into()));
                }
            }
        }

        if self
            .always_fail
            .lock()
            .unwrap()
            .iter()
            .any(|f| object_key.contains(f.as_str()))
        {
            return Err(RecognitionError::Service("injected service error".into()));
        }

        self.indexed
            .lock()
            .unwrap()
            .entry(collection_id.to_string())
            .or_default()
            .insert(external_image_id.to_string());

        Ok(vec![format!("face-for-{}", external_image_id)])
    }

    async fn search_by_image(
        &self,
        collection_id: &str,
        object_key: &str,
        _max_results: u32,
        min_similarity: f32,
    ) -> RecognitionResult<Vec<FaceHit>> {
        if !self.collections.lock().unwrap().contains(collection_id) {
            return Err(RecognitionError::CollectionNotFound(
                collection_id.to_string(),
            ));
        }

        let mut hits: Vec<FaceHit> = self
            .scripted_hits
            .lock()
            .unwrap()
            .get(object_key)
            .cloned()
            .unwrap_or_default();

        // Self-hit for already-indexed images, mirroring how a real
        // collection responds when probed with one of its own images.
        if let Some(external_id) = external_id_from_key(object_key) {
            let indexed = self.indexed.lock().unwrap();
            if indexed
                .get(collection_id)
                .is_some_and(|s| s.contains(external_id))
            {
                hits.push(FaceHit {
                    external_image_id: Some(external_id.to_string()),
                    similarity: 99.9,
                    face_id: Some(format!("face-for-{}", external_id)),
                });
            }
        }

        hits.retain(|h| h.similarity >= min_similarity);
        Ok(hits)
    }

    async fn delete_faces(
        &self,
        _collection_id: &str,
        _face_ids: &[String],
    ) -> RecognitionResult<()> {
        Ok(())
    }
}
