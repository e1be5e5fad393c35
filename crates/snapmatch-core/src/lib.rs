//! Snapmatch Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration, and
//! naming conventions shared across all Snapmatch components.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod naming;

// Re-export commonly used types
pub use config::{IndexingConfig, NormalizeConfig, SearchConfig, UploadConfig};
pub use error::{FailureKind, PipelineError, PipelineResult};
pub use models::{
    BatchResult, FileOutcome, FileReport, MatchResult, NormalizedAsset, SourceFile, TransferRecord,
};
pub use naming::{
    display_name_from_external_id, sanitize_object_name, selfie_key, shared_image_key,
    shared_image_prefix,
};
