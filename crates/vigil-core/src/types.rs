use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

/// Bounding box for a detected face, in source-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Detector confidence for this face.
    pub confidence: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// Two embeddings that should share a length do not.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("embedding length mismatch: expected {expected}, got {got}")]
pub struct DimensionMismatch {
    pub expected: usize,
    pub got: usize,
}

/// Face embedding vector produced by the external extractor.
///
/// The length is fixed by the extraction model (128 or 512 in practice) and
/// must be identical for every embedding handled by one process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Non-empty with every component finite.
    pub fn is_usable(&self) -> bool {
        !self.values.is_empty() && self.values.iter().all(|v| v.is_finite())
    }

    /// Euclidean distance `sqrt(sum((a[i] - b[i])^2))`.
    ///
    /// Unlike a zip over both vectors, a length mismatch is an error rather
    /// than a silently truncated comparison.
    pub fn euclidean_distance(&self, other: &Embedding) -> Result<f32, DimensionMismatch> {
        if self.len() != other.len() {
            return Err(DimensionMismatch {
                expected: self.len(),
                got: other.len(),
            });
        }
        Ok(self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt())
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self::new(values)
    }
}

/// One face reported by the extractor: where it is and what it looks like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    #[serde(flatten)]
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}

#[derive(Error, Debug)]
pub enum FaceImageError {
    #[error("image read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// An encoded image handed to the extractor as-is.
///
/// Resizing and other preprocessing happen before an image gets here; the
/// core only needs the pixel dimensions for face-size validation.
#[derive(Debug, Clone)]
pub struct FaceImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl FaceImage {
    pub fn new(bytes: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            bytes,
            width,
            height,
        }
    }

    /// Wrap encoded image bytes (PNG, JPEG, ...), reading dimensions from the header.
    pub fn from_encoded(bytes: Vec<u8>) -> Result<Self, FaceImageError> {
        let (width, height) = image::ImageReader::new(Cursor::new(bytes.as_slice()))
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(Self::new(bytes, width, height))
    }

    pub fn area(&self) -> f32 {
        self.width as f32 * self.height as f32
    }
}
