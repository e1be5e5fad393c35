//! Configuration structures for the pipeline components.
//!
//! All settings are environment-driven with compiled-in defaults from
//! [`constants`](crate::constants), so every component works out of the box
//! and can be tuned per deployment without code changes.

use std::env;
use std::time::Duration;

use crate::constants;

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Upload orchestration settings.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub max_file_size_bytes: u64,
    pub max_concurrent_transfers: usize,
    pub max_transfer_attempts: u32,
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub retry_jitter: Duration,
    /// Base transfer timeout before the per-size allowance is added.
    pub transfer_timeout_base: Duration,
    /// Extra timeout budget per MiB of payload.
    pub transfer_timeout_per_mib: Duration,
    pub memory_high_water_percent: f64,
    pub memory_pause: Duration,
    pub disallowed_name_fragments: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: constants::MAX_SOURCE_FILE_BYTES,
            max_concurrent_transfers: constants::DEFAULT_CONCURRENT_TRANSFERS,
            max_transfer_attempts: constants::MAX_TRANSFER_ATTEMPTS,
            initial_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(30),
            retry_jitter: Duration::from_millis(250),
            transfer_timeout_base: Duration::from_secs(30),
            transfer_timeout_per_mib: Duration::from_secs(1),
            memory_high_water_percent: constants::MEMORY_HIGH_WATER_PERCENT,
            memory_pause: Duration::from_millis(500),
            disallowed_name_fragments: constants::DISALLOWED_NAME_FRAGMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UploadConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_file_size_bytes: env_parse(
                "SNAPMATCH_MAX_FILE_SIZE_BYTES",
                defaults.max_file_size_bytes,
            ),
            max_concurrent_transfers: env_parse(
                "SNAPMATCH_MAX_CONCURRENT_TRANSFERS",
                defaults.max_concurrent_transfers,
            ),
            max_transfer_attempts: env_parse(
                "SNAPMATCH_MAX_TRANSFER_ATTEMPTS",
                defaults.max_transfer_attempts,
            ),
            initial_retry_delay: Duration::from_millis(env_parse(
                "SNAPMATCH_INITIAL_RETRY_DELAY_MS",
                defaults.initial_retry_delay.as_millis() as u64,
            )),
            max_retry_delay: Duration::from_millis(env_parse(
                "SNAPMATCH_MAX_RETRY_DELAY_MS",
                defaults.max_retry_delay.as_millis() as u64,
            )),
            retry_jitter: Duration::from_millis(env_parse(
                "SNAPMATCH_RETRY_JITTER_MS",
                defaults.retry_jitter.as_millis() as u64,
            )),
            transfer_timeout_base: Duration::from_secs(env_parse(
                "SNAPMATCH_TRANSFER_TIMEOUT_BASE_SECS",
                defaults.transfer_timeout_base.as_secs(),
            )),
            memory_high_water_percent: env_parse(
                "SNAPMATCH_MEMORY_HIGH_WATER_PERCENT",
                defaults.memory_high_water_percent,
            ),
            ..defaults
        }
    }

    /// Timeout for one transfer attempt, scaled by payload size
    /// (roughly one extra second per MiB).
    pub fn transfer_timeout(&self, size_bytes: u64) -> Duration {
        let mib = size_bytes / (1024 * 1024);
        self.transfer_timeout_base + self.transfer_timeout_per_mib * (mib as u32)
    }
}

/// Media normalization settings.
#[derive(Clone, Debug)]
pub struct NormalizeConfig {
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            max_dimension: constants::MAX_IMAGE_DIMENSION,
            jpeg_quality: constants::JPEG_QUALITY,
        }
    }
}

/// Face indexing pipeline settings.
#[derive(Clone, Debug)]
pub struct IndexingConfig {
    pub sub_batch_size: usize,
    pub inter_batch_pause: Duration,
    pub max_index_attempts: u32,
    pub initial_retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub retry_jitter: Duration,
    /// Probe similarity above which an image counts as already indexed.
    pub already_indexed_similarity: f32,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            sub_batch_size: constants::INDEX_SUB_BATCH_SIZE,
            inter_batch_pause: Duration::from_millis(constants::INTER_BATCH_PAUSE_MS),
            max_index_attempts: constants::MAX_INDEX_ATTEMPTS,
            initial_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(10),
            retry_jitter: Duration::from_millis(250),
            already_indexed_similarity: constants::ALREADY_INDEXED_SIMILARITY,
        }
    }
}

impl IndexingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sub_batch_size: env_parse("SNAPMATCH_INDEX_SUB_BATCH_SIZE", defaults.sub_batch_size),
            inter_batch_pause: Duration::from_millis(env_parse(
                "SNAPMATCH_INTER_BATCH_PAUSE_MS",
                defaults.inter_batch_pause.as_millis() as u64,
            )),
            max_index_attempts: env_parse(
                "SNAPMATCH_MAX_INDEX_ATTEMPTS",
                defaults.max_index_attempts,
            ),
            ..defaults
        }
    }
}

/// Face search settings.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub min_similarity: f32,
    pub max_results: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_similarity: constants::MIN_SEARCH_SIMILARITY,
            max_results: constants::MAX_SEARCH_RESULTS,
        }
    }
}

impl SearchConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_similarity: env_parse("SNAPMATCH_MIN_SEARCH_SIMILARITY", defaults.min_similarity),
            max_results: env_parse("SNAPMATCH_MAX_SEARCH_RESULTS", defaults.max_results),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_timeout_scales_with_size() {
        let config = UploadConfig::default();
        let small = config.transfer_timeout(100 * 1024);
        let large = config.transfer_timeout(50 * 1024 * 1024);
        assert_eq!(small, config.transfer_timeout_base);
        assert_eq!(large, config.transfer_timeout_base + Duration::from_secs(50));
    }

    #[test]
    fn defaults_match_documented_budgets() {
        let upload = UploadConfig::default();
        assert_eq!(upload.max_concurrent_transfers, 5);
        assert_eq!(upload.max_transfer_attempts, 5);

        let indexing = IndexingConfig::default();
        assert_eq!(indexing.sub_batch_size, 10);
        assert_eq!(indexing.inter_batch_pause, Duration::from_secs(1));
        assert_eq!(indexing.max_index_attempts, 3);
    }
}
