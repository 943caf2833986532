//! Scripted in-memory extractor for unit tests.

use crate::extractor::{EmbeddingExtractor, ExtractorError};
use crate::types::{BoundingBox, DetectedFace, Embedding, FaceImage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const IMAGE_SIZE: u32 = 100;

/// Face at the origin with the given box size.
pub fn face(values: Vec<f32>, width: f32, height: f32) -> DetectedFace {
    DetectedFace {
        bbox: BoundingBox {
            x: 0.0,
            y: 0.0,
            width,
            height,
            confidence: 0.99,
        },
        embedding: Embedding::new(values),
    }
}

/// Face of comfortable size (25% of a test image).
pub fn single(values: Vec<f32>) -> Vec<DetectedFace> {
    vec![face(values, 50.0, 50.0)]
}

/// Answers `detect` from a table keyed by image bytes and records every call.
pub struct ScriptedExtractor {
    scripts: HashMap<Vec<u8>, Result<Vec<DetectedFace>, ExtractorError>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<u8>>>,
    ready: bool,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            ready: true,
        }
    }

    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    pub fn with_faces(mut self, key: &str, faces: Vec<DetectedFace>) -> Self {
        self.scripts.insert(key.as_bytes().to_vec(), Ok(faces));
        self
    }

    pub fn with_error(mut self, key: &str, err: ExtractorError) -> Self {
        self.scripts.insert(key.as_bytes().to_vec(), Err(err));
        self
    }

    pub fn image(key: &str) -> FaceImage {
        FaceImage::new(key.as_bytes().to_vec(), IMAGE_SIZE, IMAGE_SIZE)
    }

    pub fn images(keys: &[&str]) -> Vec<FaceImage> {
        keys.iter().map(|k| Self::image(k)).collect()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Image keys in the order they were passed to `detect`.
    pub fn seen(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .collect()
    }
}

#[async_trait]
impl EmbeddingExtractor for ScriptedExtractor {
    async fn detect(&self, image: &FaceImage) -> Result<Vec<DetectedFace>, ExtractorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(image.bytes.clone());
        match self.scripts.get(&image.bytes) {
            Some(script) => script.clone(),
            None => Err(ExtractorError::Failed(format!(
                "no script for image {:?}",
                String::from_utf8_lossy(&image.bytes)
            ))),
        }
    }

    async fn is_ready(&self) -> bool {
        self.ready
    }
}
