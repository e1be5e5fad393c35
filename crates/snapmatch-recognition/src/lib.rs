//! Snapmatch Recognition Library
//!
//! Face-recognition abstraction consumed by the indexing pipeline and the
//! search matcher, with an AWS Rekognition backend behind the
//! `rekognition` feature.

#[cfg(feature = "rekognition")]
pub mod rekognition;
pub mod traits;

#[cfg(feature = "rekognition")]
pub use rekognition::RekognitionFaceIndex;
pub use traits::{
    CollectionStatus, FaceHit, FaceIndex, RecognitionError, RecognitionResult,
};
