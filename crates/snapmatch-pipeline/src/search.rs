//! Face search with per-image deduplication and cold-start recovery.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

use snapmatch_core::config::SearchConfig;
use snapmatch_core::models::{AttendeeMatchRecord, MatchResult};
use snapmatch_core::naming::{display_name_from_external_id, selfie_key, shared_image_prefix};
use snapmatch_core::{PipelineError, PipelineResult};
use snapmatch_db::RecordStore;
use snapmatch_recognition::{FaceHit, FaceIndex};
use snapmatch_storage::BlobStore;

use crate::indexing::FaceIndexer;
use crate::{from_recognition, from_storage};

/// Resolves "which stored images contain this face" for an event.
pub struct FaceMatcher {
    faces: Arc<dyn FaceIndex>,
    store: Arc<dyn BlobStore>,
    indexer: FaceIndexer,
    config: SearchConfig,
    records: Option<Arc<dyn RecordStore>>,
}

impl FaceMatcher {
    pub fn new(
        faces: Arc<dyn FaceIndex>,
        store: Arc<dyn BlobStore>,
        indexer: FaceIndexer,
        config: SearchConfig,
    ) -> Self {
        Self {
            faces,
            store,
            indexer,
            config,
            records: None,
        }
    }

    /// Attach a record store so attendee matches are persisted by
    /// [`FaceMatcher::match_attendee`].
    pub fn with_record_store(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    /// Search the event's collection with a stored selfie.
    ///
    /// Returns unique matched images sorted by descending similarity,
    /// filtered to the configured threshold. A missing collection triggers
    /// one full indexing pass over everything stored for the event, then a
    /// single retry; a second miss is terminal.
    pub async fn search(
        &self,
        event_id: &str,
        reference_key: &str,
    ) -> PipelineResult<Vec<MatchResult>> {
        match self.search_once(event_id, reference_key).await {
            Ok(matches) => Ok(matches),
            Err(PipelineError::NotFound(_)) => {
                tracing::info!(
                    event_id = %event_id,
                    "Collection missing, running cold-start indexing pass"
                );
                self.cold_start_index(event_id).await?;
                self.search_once(event_id, reference_key)
                    .await
                    .map_err(|e| match e {
                        PipelineError::NotFound(m) => PipelineError::NotFound(format!(
                            "collection still missing after cold-start indexing: {}",
                            m
                        )),
                        other => other,
                    })
            }
            Err(other) => Err(other),
        }
    }

    /// Store an attendee's selfie under the selfie key convention.
    pub async fn store_selfie(
        &self,
        user_id: &str,
        original_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> PipelineResult<String> {
        let key = selfie_key(user_id, Utc::now().timestamp_millis(), original_name);
        self.store
            .put(&key, bytes, content_type)
            .await
            .map_err(from_storage)?;
        Ok(key)
    }

    /// Search and persist the attendee's match record.
    pub async fn match_attendee(
        &self,
        user_id: &str,
        event_id: &str,
        selfie_key: &str,
    ) -> PipelineResult<Vec<MatchResult>> {
        let matches = self.search(event_id, selfie_key).await?;

        if let Some(records) = &self.records {
            let record = AttendeeMatchRecord {
                user_id: user_id.to_string(),
                event_id: event_id.to_string(),
                selfie_key: selfie_key.to_string(),
                matched_keys: matches.iter().map(|m| m.key.clone()).collect(),
                matched_at: Utc::now(),
            };
            if let Err(e) = records.put_attendee_match(&record).await {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to persist attendee match");
            }
        }

        Ok(matches)
    }

    async fn search_once(
        &self,
        event_id: &str,
        reference_key: &str,
    ) -> PipelineResult<Vec<MatchResult>> {
        let hits = self
            .faces
            .search_by_image(
                event_id,
                reference_key,
                self.config.max_results,
                self.config.min_similarity,
            )
            .await
            .map_err(from_recognition)?;

        Ok(self.fold_hits(event_id, hits))
    }

    /// Fold face hits into one result per stored image, keeping the
    /// highest similarity when an image produced several hits.
    fn fold_hits(&self, event_id: &str, hits: Vec<FaceHit>) -> Vec<MatchResult> {
        let prefix = shared_image_prefix(event_id);
        let mut best: HashMap<String, f32> = HashMap::new();

        for hit in hits {
            let Some(external_id) = hit.external_image_id else {
                continue;
            };
            if hit.similarity < self.config.min_similarity {
                continue;
            }
            let key = format!("{}{}", prefix, external_id);
            let entry = best.entry(key).or_insert(hit.similarity);
            if hit.similarity > *entry {
                *entry = hit.similarity;
            }
        }

        let mut matches: Vec<MatchResult> = best
            .into_iter()
            .map(|(key, similarity)| {
                let display_name = key
                    .rsplit('/')
                    .next()
                    .map(display_name_from_external_id)
                    .unwrap_or_default();
                MatchResult {
                    key,
                    display_name,
                    similarity,
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.key.cmp(&b.key))
        });

        matches
    }

    /// Cold-start recovery: discover every stored image through the
    /// paginated listing and push them all through the indexing pipeline.
    /// Indexing zero images is terminal for this search.
    async fn cold_start_index(&self, event_id: &str) -> PipelineResult<()> {
        let keys = self.list_all_images(event_id).await?;
        if keys.is_empty() {
            return Err(PipelineError::NotFound(format!(
                "no stored images for event {}",
                event_id
            )));
        }

        let outcome = self.indexer.index_batch(event_id, &keys).await?;
        if outcome.successful.is_empty() {
            return Err(PipelineError::NotFound(format!(
                "cold-start indexing registered zero of {} images for event {}",
                keys.len(),
                event_id
            )));
        }

        tracing::info!(
            event_id = %event_id,
            indexed = outcome.successful.len(),
            failed = outcome.failed.len(),
            "Cold-start indexing pass complete"
        );

        Ok(())
    }

    async fn list_all_images(&self, event_id: &str) -> PipelineResult<Vec<String>> {
        let prefix = shared_image_prefix(event_id);
        let mut keys = Vec::new();
        let mut token = None;
        loop {
            let page = self
                .store
                .list(&prefix, token)
                .await
                .map_err(from_storage)?;
            keys.extend(page.keys);
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }
        Ok(keys)
    }
}
