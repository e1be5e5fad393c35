//! Error taxonomy for the upload and face-matching pipeline.
//!
//! Each variant maps to one recovery policy: validation errors are terminal
//! and immediate, conversion errors degrade to uploading original bytes,
//! transfer and rate-limit errors are retried with backoff (with different
//! attempt budgets), and not-found errors trigger a single recovery pass
//! before becoming terminal.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coarse failure classification recorded per item (e.g. in a
/// [`TransferRecord`](crate::models::TransferRecord)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Conversion,
    Transfer,
    Timeout,
    RateLimit,
    NotFound,
    Service,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited: {0}")]
    RateLimit(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service error: {0}")]
    Service(String),
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Validation(_) => FailureKind::Validation,
            PipelineError::Conversion(_) => FailureKind::Conversion,
            PipelineError::Transfer(_) => FailureKind::Transfer,
            PipelineError::Timeout(_) => FailureKind::Timeout,
            PipelineError::RateLimit(_) => FailureKind::RateLimit,
            PipelineError::NotFound(_) => FailureKind::NotFound,
            PipelineError::Service(_) => FailureKind::Service,
        }
    }

    /// Whether the retry helper may attempt this operation again.
    ///
    /// Timeouts are indistinguishable from network failures at the call
    /// site and retry under the same budget.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::Transfer(_) | PipelineError::Timeout(_) | PipelineError::RateLimit(_)
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
