//! Shared constants for upload, indexing, and search defaults.

/// Maximum accepted source file size (200 MiB). Files above this are
/// rejected at intake, before any bytes are buffered for processing.
pub const MAX_SOURCE_FILE_BYTES: u64 = 200 * 1024 * 1024;

/// Longest edge after normalization. Neither output dimension exceeds this.
pub const MAX_IMAGE_DIMENSION: u32 = 2048;

/// JPEG re-encode quality (0-100). Matches a 0.8 quality factor.
pub const JPEG_QUALITY: u8 = 80;

/// Default ceiling for concurrent blob transfers within one batch.
pub const DEFAULT_CONCURRENT_TRANSFERS: usize = 5;

/// Attempt budget for a single file transfer, including the first try.
pub const MAX_TRANSFER_ATTEMPTS: u32 = 5;

/// Attempt budget for a single face-index call under throttling.
pub const MAX_INDEX_ATTEMPTS: u32 = 3;

/// Number of images submitted to the face service per sub-batch.
pub const INDEX_SUB_BATCH_SIZE: usize = 10;

/// Pause between indexing sub-batches, in milliseconds.
pub const INTER_BATCH_PAUSE_MS: u64 = 1000;

/// A prior face entry at or above this similarity with the same external
/// image id means the image is already indexed and re-submission is skipped.
pub const ALREADY_INDEXED_SIMILARITY: f32 = 95.0;

/// Minimum similarity for a face-search hit to appear in match results.
pub const MIN_SEARCH_SIMILARITY: f32 = 80.0;

/// Maximum face hits requested from the recognition service per search.
pub const MAX_SEARCH_RESULTS: u32 = 100;

/// Memory high-water mark (percent of total) above which the orchestrator
/// pauses before admitting new concurrent work.
pub const MEMORY_HIGH_WATER_PERCENT: f64 = 80.0;

/// File name fragments rejected at intake. Selfies are stored under a
/// separate prefix and must never enter the shared event gallery.
pub const DISALLOWED_NAME_FRAGMENTS: &[&str] = &["selfie"];
