//! Seam to the external face detection / embedding service.
//!
//! The core never runs a model itself. Whatever hosts the recognizer supplies
//! an [`EmbeddingExtractor`] that turns an image into zero or more detected
//! faces, each carrying a fixed-length embedding.

use crate::types::{DetectedFace, FaceImage};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractorError {
    #[error("extractor unavailable: {0}")]
    Unavailable(String),
    #[error("extraction failed: {0}")]
    Failed(String),
}

/// External face analysis capability.
#[async_trait]
pub trait EmbeddingExtractor: Send + Sync {
    /// Detect every face in `image` and return its embedding.
    async fn detect(&self, image: &FaceImage) -> Result<Vec<DetectedFace>, ExtractorError>;

    /// Embedding of the most prominent face, or `None` when no face was found.
    async fn extract(&self, image: &FaceImage) -> Result<Option<DetectedFace>, ExtractorError> {
        let faces = self.detect(image).await?;
        Ok(most_prominent(faces))
    }

    /// Whether the backing service can currently take requests. Extractors
    /// without a way to tell report ready.
    async fn is_ready(&self) -> bool {
        true
    }
}

/// Pick the face with the largest bounding box. Earlier faces win ties.
pub fn most_prominent(faces: Vec<DetectedFace>) -> Option<DetectedFace> {
    faces.into_iter().reduce(|largest, current| {
        if current.bbox.area() > largest.bbox.area() {
            current
        } else {
            largest
        }
    })
}
