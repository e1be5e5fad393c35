//! Snapmatch Media Library
//!
//! Format classification and media normalization: turning arbitrary
//! organizer uploads into web-safe JPEGs bounded to a maximum dimension.

pub mod format;
pub mod normalize;

pub use format::{classify, FormatCategory, FormatDescriptor};
pub use normalize::{MediaError, MediaResult, Normalizer};
