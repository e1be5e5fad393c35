//! Snapmatch Pipeline Library
//!
//! Upload orchestration, face indexing, and face search over the storage
//! and recognition collaborators:
//!
//! - [`upload::UploadOrchestrator`] — batch intake, normalization, and
//!   bounded-concurrency transfer with retry and progress tracking.
//! - [`indexing::FaceIndexer`] — rate-paced, idempotent face registration.
//! - [`search::FaceMatcher`] — confidence-ranked, deduplicated matching
//!   with cold-start recovery.
//!
//! All components share one retry-with-backoff helper ([`retry`]) and the
//! naming conventions from `snapmatch-core`, which form the join key
//! between stored blobs and indexed faces.

pub mod indexing;
pub mod memory_gate;
pub mod progress;
pub mod retry;
pub mod search;
pub mod upload;

pub use indexing::{FaceIndexer, IndexFailure, IndexOutcome};
pub use memory_gate::{MemoryGate, SystemMemoryGate, Unpressured};
pub use progress::{BatchProgress, StageProgress, StageSnapshot};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use search::FaceMatcher;
pub use upload::UploadOrchestrator;

use snapmatch_core::PipelineError;
use snapmatch_recognition::RecognitionError;
use snapmatch_storage::StorageError;

pub(crate) fn from_recognition(e: RecognitionError) -> PipelineError {
    match e {
        RecognitionError::Throttled(m) => PipelineError::RateLimit(m),
        RecognitionError::CollectionNotFound(m) => PipelineError::NotFound(m),
        RecognitionError::InvalidImage(m) => PipelineError::Validation(m),
        RecognitionError::Service(m) => PipelineError::Service(m),
    }
}

pub(crate) fn from_storage(e: StorageError) -> PipelineError {
    match e {
        StorageError::NotFound(m) => PipelineError::NotFound(m),
        StorageError::InvalidKey(m) => PipelineError::Validation(m),
        other => PipelineError::Transfer(other.to_string()),
    }
}
