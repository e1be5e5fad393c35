//! Domain models shared across the pipeline.

pub mod batch;
pub mod event;

pub use batch::{
    BatchResult, FileOutcome, FileReport, MatchResult, NormalizedAsset, SourceFile, TransferRecord,
};
pub use event::{AttendeeMatchRecord, EventRecord};
