//! vigil-core — Face embedding enrollment and recognition engine.
//!
//! Face detection and embedding extraction are delegated to an external
//! service behind [`EmbeddingExtractor`]. This crate averages enrollment
//! samples into per-identity reference embeddings, keeps them in a gallery,
//! and matches probe embeddings against it by Euclidean distance.

pub mod extractor;
pub mod gallery;
pub mod matcher;
pub mod recognizer;
pub mod types;
pub mod validation;

#[cfg(test)]
mod testing;

pub use extractor::{EmbeddingExtractor, ExtractorError};
pub use gallery::{EnrollError, GalleryEntry, IdentitySummary, MismatchSite};
pub use matcher::{EuclideanMatcher, MatchError, Matcher, Verdict, DEFAULT_THRESHOLD};
pub use recognizer::{RecognitionStats, Recognizer, RecognizerConfig, DEFAULT_MIN_SAMPLES};
pub use types::{BoundingBox, DetectedFace, Embedding, FaceImage, FaceImageError};
pub use validation::FaceCheck;
