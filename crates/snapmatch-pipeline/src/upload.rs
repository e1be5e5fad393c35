//! Upload orchestration: intake filtering, normalization, and bounded
//! concurrent transfer with retry.
//!
//! A batch is never aborted by a single file: intake rejections,
//! normalization failures (degraded to passthrough), and exhausted
//! transfers are all reported per file in the [`BatchResult`].

use chrono::Utc;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

use snapmatch_core::config::UploadConfig;
use snapmatch_core::models::{
    BatchResult, FileOutcome, FileReport, NormalizedAsset, SourceFile, TransferRecord,
};
use snapmatch_core::naming::{
    external_id_from_key, sanitize_object_name, shared_image_key, shared_image_prefix,
    stored_name_from_segment,
};
use snapmatch_core::{PipelineError, PipelineResult};
use snapmatch_db::RecordStore;
use snapmatch_media::{classify, Normalizer};
use snapmatch_storage::BlobStore;

use crate::from_storage;
use crate::memory_gate::{MemoryGate, SystemMemoryGate};
use crate::progress::BatchProgress;
use crate::retry::{retry_with_backoff, RetryPolicy};

/// Accepts batches of organizer files and drives them to the blob store.
pub struct UploadOrchestrator {
    store: Arc<dyn BlobStore>,
    normalizer: Normalizer,
    config: UploadConfig,
    memory_gate: Arc<dyn MemoryGate>,
    records: Option<Arc<dyn RecordStore>>,
}

impl UploadOrchestrator {
    pub fn new(store: Arc<dyn BlobStore>, normalizer: Normalizer, config: UploadConfig) -> Self {
        Self {
            store,
            normalizer,
            config,
            memory_gate: Arc::new(SystemMemoryGate::new()),
            records: None,
        }
    }

    pub fn with_memory_gate(mut self, gate: Arc<dyn MemoryGate>) -> Self {
        self.memory_gate = gate;
        self
    }

    /// Attach a record store so successful batches accumulate onto the
    /// event's stored-byte counter.
    pub fn with_record_store(mut self, records: Arc<dyn RecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    /// Submit one batch of files for an event.
    ///
    /// Fails only when the remote listing needed for duplicate detection
    /// is unavailable; every per-file problem is reported in the result.
    pub async fn submit_batch(
        &self,
        files: Vec<SourceFile>,
        event_id: &str,
        progress: &BatchProgress,
    ) -> PipelineResult<BatchResult> {
        progress.reset();
        let submitted = files.len();
        let existing = self.stored_names(event_id).await?;

        // Intake filter
        let mut seen: HashSet<String> = HashSet::new();
        let mut reports: Vec<Option<FileReport>> = Vec::with_capacity(files.len());
        let mut accepted: Vec<(usize, SourceFile)> = Vec::new();
        for file in files {
            let index = reports.len();
            match self.intake_outcome(&file, &existing, &mut seen) {
                Some(outcome) => {
                    tracing::debug!(name = %file.name, ?outcome, "File rejected at intake");
                    reports.push(Some(FileReport {
                        name: file.name,
                        outcome,
                        transfer: None,
                    }));
                }
                None => {
                    reports.push(None);
                    accepted.push((index, file));
                }
            }
        }

        // Normalize stage: sequential and CPU-bound; failures degrade to
        // uploading the original bytes.
        let input_bytes: u64 = accepted.iter().map(|(_, f)| f.size()).sum();
        progress.normalize.set_total(accepted.len() as u64, input_bytes);

        let mut staged: Vec<(usize, NormalizedAsset)> = Vec::with_capacity(accepted.len());
        for (index, file) in accepted {
            let in_bytes = file.size();
            let asset = match self.normalizer.normalize(&file) {
                Ok(asset) => asset,
                Err(e) => {
                    tracing::warn!(
                        name = %file.name,
                        error = %e,
                        "Normalization failed, uploading original bytes"
                    );
                    NormalizedAsset::passthrough(file)
                }
            };
            progress.normalize.advance(1, in_bytes);
            staged.push((index, asset));
        }

        // Transfer stage: bounded worker pool, completion order unordered.
        let output_bytes: u64 = staged.iter().map(|(_, a)| a.size()).sum();
        progress.transfer.set_total(staged.len() as u64, output_bytes);

        let semaphore = Semaphore::new(self.config.max_concurrent_transfers);
        let batch_millis = Utc::now().timestamp_millis();

        let transfers = staged.into_iter().map(|(index, asset)| {
            let semaphore = &semaphore;
            let transfer_progress = &progress.transfer;
            async move {
                // The semaphore lives for this call and is never closed; a
                // failed acquire still must not take the batch down.
                let Ok(_permit) = semaphore.acquire().await else {
                    return (
                        index,
                        FileReport {
                            name: asset.source_name,
                            outcome: FileOutcome::FailedAfterRetries {
                                error: "transfer pool unavailable".to_string(),
                            },
                            transfer: None,
                        },
                    );
                };
                self.pause_if_memory_pressured().await;
                let size = asset.size();
                let report = self.transfer_one(event_id, batch_millis, index, asset).await;
                transfer_progress.advance(1, size);
                (index, report)
            }
        });

        for (index, report) in join_all(transfers).await {
            reports[index] = Some(report);
        }

        // Every slot is filled by intake or by its transfer future; an
        // empty one would mean a lost file, which must surface as a failure
        // rather than a panic.
        let result = BatchResult {
            files: reports
                .into_iter()
                .map(|r| {
                    r.unwrap_or_else(|| FileReport {
                        name: String::new(),
                        outcome: FileOutcome::FailedAfterRetries {
                            error: "file was lost between intake and transfer".to_string(),
                        },
                        transfer: None,
                    })
                })
                .collect(),
        };

        self.accumulate_event_bytes(event_id, &result).await;

        tracing::info!(
            event_id = %event_id,
            submitted,
            stored = result.stored(),
            duplicates = result.duplicates(),
            invalid = result.invalid(),
            failed = result.failed(),
            "Batch complete"
        );

        Ok(result)
    }

    /// `Some(outcome)` rejects the file before any processing.
    fn intake_outcome(
        &self,
        file: &SourceFile,
        existing: &HashSet<String>,
        seen: &mut HashSet<String>,
    ) -> Option<FileOutcome> {
        if classify(&file.name, &file.content_type).is_none() {
            return Some(FileOutcome::Invalid {
                reason: format!("unrecognized format: {}", file.content_type),
            });
        }

        if file.size() > self.config.max_file_size_bytes {
            return Some(FileOutcome::Invalid {
                reason: format!(
                    "file size {} exceeds limit of {} bytes",
                    file.size(),
                    self.config.max_file_size_bytes
                ),
            });
        }

        let lower = file.name.to_lowercase();
        if self
            .config
            .disallowed_name_fragments
            .iter()
            .any(|fragment| lower.contains(fragment))
        {
            return Some(FileOutcome::Invalid {
                reason: format!("disallowed file name: {}", file.name),
            });
        }

        let sanitized = sanitize_object_name(&file.name);
        if !seen.insert(sanitized.clone()) || existing.contains(&sanitized) {
            return Some(FileOutcome::DuplicateSkipped);
        }

        None
    }

    /// Sanitized names already stored for this event. The remote listing
    /// is ground truth; a transfer abandoned on timeout may still have
    /// landed, and this is where it surfaces.
    async fn stored_names(&self, event_id: &str) -> PipelineResult<HashSet<String>> {
        let prefix = shared_image_prefix(event_id);
        let mut names = HashSet::new();
        let mut token = None;
        loop {
            let page = self
                .store
                .list(&prefix, token)
                .await
                .map_err(from_storage)?;
            for key in &page.keys {
                if let Some(name) = external_id_from_key(key).and_then(stored_name_from_segment) {
                    names.insert(name.to_string());
                }
            }
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }
        Ok(names)
    }

    async fn transfer_one(
        &self,
        event_id: &str,
        batch_millis: i64,
        batch_index: usize,
        asset: NormalizedAsset,
    ) -> FileReport {
        let key = shared_image_key(event_id, batch_millis, batch_index, &asset.source_name);
        let mut record = TransferRecord::new(key.clone());
        let size = asset.size();
        let deadline = self.config.transfer_timeout(size);
        let policy = RetryPolicy::new(
            self.config.max_transfer_attempts,
            self.config.initial_retry_delay,
            self.config.max_retry_delay,
        )
        .with_jitter(self.config.retry_jitter);

        let name = asset.source_name;
        let content_type = asset.content_type;
        let bytes = asset.bytes;

        let result = retry_with_backoff(&policy, PipelineError::is_retryable, |_| {
            let bytes = bytes.clone();
            let key = &key;
            let content_type = &content_type;
            async move {
                match timeout(deadline, self.store.put(key, bytes, content_type)).await {
                    Ok(Ok(_)) => Ok(()),
                    Ok(Err(e)) => Err(from_storage(e)),
                    // The abandoned request may still complete remotely;
                    // idempotent keys make that harmless.
                    Err(_) => Err(PipelineError::Timeout(deadline)),
                }
            }
        })
        .await;

        record.ended_at = Some(Utc::now());
        match result {
            Ok(((), attempts)) => {
                record.attempts = attempts;
                record.bytes_transferred = size;
                tracing::debug!(key = %key, attempts, size_bytes = size, "Transfer stored");
                FileReport {
                    name,
                    outcome: FileOutcome::Stored { key, attempts },
                    transfer: Some(record),
                }
            }
            Err((error, attempts)) => {
                record.attempts = attempts;
                record.last_error = Some(error.kind());
                tracing::error!(
                    key = %key,
                    attempts,
                    error = %error,
                    "Transfer failed after retries"
                );
                FileReport {
                    name,
                    outcome: FileOutcome::FailedAfterRetries {
                        error: error.to_string(),
                    },
                    transfer: Some(record),
                }
            }
        }
    }

    async fn pause_if_memory_pressured(&self) {
        let used = self.memory_gate.used_percent();
        if used >= self.config.memory_high_water_percent {
            tracing::warn!(
                used_percent = used,
                high_water = self.config.memory_high_water_percent,
                "Memory pressure high, pausing before next transfer"
            );
            sleep(self.config.memory_pause).await;
        }
    }

    async fn accumulate_event_bytes(&self, event_id: &str, result: &BatchResult) {
        let Some(records) = &self.records else {
            return;
        };
        let stored_bytes: u64 = result
            .files
            .iter()
            .filter(|f| f.stored_key().is_some())
            .filter_map(|f| f.transfer.as_ref())
            .map(|t| t.bytes_transferred)
            .sum();
        if stored_bytes == 0 {
            return;
        }

        match records.get_event(event_id).await {
            Ok(Some(mut event)) => {
                event.total_bytes += stored_bytes;
                if let Err(e) = records.put_event(&event).await {
                    tracing::warn!(event_id = %event_id, error = %e, "Failed to update event byte counter");
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(event_id = %event_id, error = %e, "Failed to load event record");
            }
        }
    }
}
