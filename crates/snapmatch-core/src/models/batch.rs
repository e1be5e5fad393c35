//! Upload batch models: input files, normalized assets, transfer
//! bookkeeping, and per-file outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FailureKind;

/// One raw input file as submitted by the organizer.
///
/// Owns its bytes exclusively until handed to the normalizer.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Output of the normalizer: web-safe bytes ready for transfer.
///
/// `normalized` is false when conversion failed and the original bytes are
/// carried through unmodified.
#[derive(Debug)]
pub struct NormalizedAsset {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub source_name: String,
    pub normalized: bool,
}

impl NormalizedAsset {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Degraded asset carrying the source bytes unmodified.
    pub fn passthrough(file: SourceFile) -> Self {
        Self {
            content_type: file.content_type,
            source_name: file.name,
            bytes: file.bytes,
            normalized: false,
        }
    }
}

/// Bookkeeping for one file's journey through the transfer stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRecord {
    pub remote_key: String,
    pub attempts: u32,
    pub last_error: Option<FailureKind>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub bytes_transferred: u64,
}

impl TransferRecord {
    pub fn new(remote_key: String) -> Self {
        Self {
            remote_key,
            attempts: 0,
            last_error: None,
            started_at: Utc::now(),
            ended_at: None,
            bytes_transferred: 0,
        }
    }
}

/// Terminal outcome for one submitted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FileOutcome {
    Stored { key: String, attempts: u32 },
    DuplicateSkipped,
    Invalid { reason: String },
    FailedAfterRetries { error: String },
}

/// Per-file entry in a [`BatchResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub name: String,
    pub outcome: FileOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer: Option<TransferRecord>,
}

impl FileReport {
    pub fn stored_key(&self) -> Option<&str> {
        match &self.outcome {
            FileOutcome::Stored { key, .. } => Some(key),
            _ => None,
        }
    }
}

/// Result of one `submit_batch` call.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub files: Vec<FileReport>,
}

impl BatchResult {
    pub fn stored(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Stored { .. }))
    }

    pub fn duplicates(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::DuplicateSkipped))
    }

    pub fn invalid(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Invalid { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::FailedAfterRetries { .. }))
    }

    /// Keys of successfully stored images, in report order.
    pub fn stored_keys(&self) -> Vec<String> {
        self.files
            .iter()
            .filter_map(|f| f.stored_key().map(str::to_string))
            .collect()
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.outcome)).count()
    }
}

/// One unique matched image from a face search, highest similarity wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub key: String,
    pub display_name: String,
    /// Similarity score 0-100 from the face-recognition service.
    pub similarity: f32,
}
