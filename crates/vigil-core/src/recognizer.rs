//! Recognition facade: enrollment, matching and gallery management over one
//! external extractor.

use crate::extractor::{EmbeddingExtractor, ExtractorError};
use crate::gallery::{build_reference, EnrollError, Gallery, GalleryEntry, IdentitySummary};
use crate::matcher::{EuclideanMatcher, MatchError, Matcher, Verdict, DEFAULT_THRESHOLD};
use crate::types::{Embedding, FaceImage};
use crate::validation::{self, FaceCheck, DEFAULT_MAX_FACE_RATIO, DEFAULT_MIN_FACE_RATIO};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Fewest enrollment samples accepted for one identity.
pub const DEFAULT_MIN_SAMPLES: usize = 3;

#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// Default confidence a match must strictly exceed.
    pub threshold: f32,
    /// Minimum number of enrollment images per identity.
    pub min_samples: usize,
    pub min_face_ratio: f32,
    pub max_face_ratio: f32,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_samples: DEFAULT_MIN_SAMPLES,
            min_face_ratio: DEFAULT_MIN_FACE_RATIO,
            max_face_ratio: DEFAULT_MAX_FACE_RATIO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecognitionStats {
    /// Number of enrolled identities.
    pub count: usize,
    pub threshold: f32,
    pub min_samples: usize,
    /// Whether the extractor reported itself able to take requests.
    pub ready: bool,
}

/// Hosts one gallery and the extractor that feeds it.
///
/// Several recognizers can coexist; nothing here is global.
pub struct Recognizer<E> {
    extractor: E,
    matcher: Box<dyn Matcher>,
    gallery: Gallery,
    config: RecognizerConfig,
    /// Current default threshold; adjustable at runtime.
    threshold: RwLock<f32>,
}

impl<E: EmbeddingExtractor> Recognizer<E> {
    pub fn new(extractor: E, config: RecognizerConfig) -> Self {
        let threshold = RwLock::new(config.threshold);
        Self {
            extractor,
            matcher: Box::new(EuclideanMatcher),
            gallery: Gallery::new(),
            config,
            threshold,
        }
    }

    /// Replace the matching strategy.
    pub fn with_matcher(mut self, matcher: impl Matcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Enroll an identity from face images.
    ///
    /// Images are extracted one at a time in order. The first image without a
    /// face aborts the enrollment and nothing is written; an existing entry
    /// for `identity_id` is left as it was. On success the previous entry, if
    /// any, is replaced wholesale.
    pub async fn enroll(
        &self,
        identity_id: &str,
        name: &str,
        images: &[FaceImage],
    ) -> Result<Arc<GalleryEntry>, EnrollError> {
        let result = self.enroll_images(identity_id, name, images).await;
        if let Err(e) = &result {
            tracing::warn!(identity_id, error = %e, "enrollment rejected");
        }
        result
    }

    async fn enroll_images(
        &self,
        identity_id: &str,
        name: &str,
        images: &[FaceImage],
    ) -> Result<Arc<GalleryEntry>, EnrollError> {
        if images.len() < self.config.min_samples {
            return Err(EnrollError::InsufficientSamples {
                required: self.config.min_samples,
                got: images.len(),
            });
        }

        let mut samples = Vec::with_capacity(images.len());
        for (index, image) in images.iter().enumerate() {
            let face = self
                .extractor
                .extract(image)
                .await?
                .filter(|face| !face.embedding.is_empty())
                .ok_or(EnrollError::NoFaceInSample(index))?;
            tracing::debug!(
                identity_id,
                sample = index,
                dimension = face.embedding.len(),
                detection_confidence = face.bbox.confidence,
                "enroll: sample extracted"
            );
            samples.push(face.embedding);
        }

        self.commit(identity_id, name, &samples).await
    }

    /// Enroll from embeddings that were extracted elsewhere. Same policy as
    /// [`enroll`](Self::enroll).
    pub async fn enroll_embeddings(
        &self,
        identity_id: &str,
        name: &str,
        samples: &[Embedding],
    ) -> Result<Arc<GalleryEntry>, EnrollError> {
        let result = self.commit(identity_id, name, samples).await;
        if let Err(e) = &result {
            tracing::warn!(identity_id, error = %e, "enrollment rejected");
        }
        result
    }

    async fn commit(
        &self,
        identity_id: &str,
        name: &str,
        samples: &[Embedding],
    ) -> Result<Arc<GalleryEntry>, EnrollError> {
        let entry = build_reference(identity_id, name, samples, self.config.min_samples)?;
        let entry = self.gallery.insert(entry).await?;
        tracing::info!(
            identity_id,
            name,
            samples = entry.sample_count,
            dimension = entry.reference.len(),
            "identity enrolled"
        );
        Ok(entry)
    }

    /// Identify the most prominent face in `image`.
    ///
    /// `threshold` overrides the current default for this call only.
    pub async fn identify(
        &self,
        image: &FaceImage,
        threshold: Option<f32>,
    ) -> Result<Verdict, MatchError> {
        let face = self.extractor.extract(image).await?;
        let Some(face) = face.filter(|face| !face.embedding.is_empty()) else {
            tracing::debug!("identify: no face in query image");
            return Ok(Verdict::NoFaceDetected);
        };
        self.match_embedding(&face.embedding, threshold).await
    }

    /// Match an already-extracted probe embedding against the gallery.
    pub async fn match_embedding(
        &self,
        probe: &Embedding,
        threshold: Option<f32>,
    ) -> Result<Verdict, MatchError> {
        let threshold = match threshold {
            Some(threshold) => threshold,
            None => self.threshold().await,
        };
        let snapshot = self.gallery.snapshot().await;
        let verdict = self.matcher.compare(probe, &snapshot, threshold)?;

        tracing::info!(
            matched = verdict.is_match(),
            identity_id = verdict.identity_id(),
            confidence = verdict.confidence(),
            distance = verdict.distance(),
            threshold,
            gallery_size = snapshot.len(),
            "match complete"
        );
        Ok(verdict)
    }

    /// Check whether `image` is suitable for enrollment.
    pub async fn validate(&self, image: &FaceImage) -> Result<FaceCheck, ExtractorError> {
        let faces = self.extractor.detect(image).await?;
        Ok(validation::check_faces(
            image,
            &faces,
            self.config.min_face_ratio,
            self.config.max_face_ratio,
        ))
    }

    /// Remove an identity. Absent identities are not an error.
    pub async fn remove(&self, identity_id: &str) -> bool {
        let removed = self.gallery.remove(identity_id).await;
        if removed {
            tracing::info!(identity_id, "identity removed");
        } else {
            tracing::debug!(identity_id, "remove: identity not enrolled");
        }
        removed
    }

    pub async fn is_enrolled(&self, identity_id: &str) -> bool {
        self.gallery.contains(identity_id).await
    }

    /// Reference embedding stored for `identity_id`.
    pub async fn reference(&self, identity_id: &str) -> Option<Embedding> {
        self.gallery
            .get(identity_id)
            .await
            .map(|entry| entry.reference.clone())
    }

    pub async fn identities(&self) -> Vec<IdentitySummary> {
        self.gallery
            .snapshot()
            .await
            .iter()
            .map(|entry| IdentitySummary::from(entry.as_ref()))
            .collect()
    }

    pub async fn stats(&self) -> RecognitionStats {
        RecognitionStats {
            count: self.gallery.len().await,
            threshold: self.threshold().await,
            min_samples: self.config.min_samples,
            ready: self.extractor.is_ready().await,
        }
    }

    pub async fn threshold(&self) -> f32 {
        *self.threshold.read().await
    }

    /// Set the default threshold, clamped to [0, 1]. NaN is ignored.
    /// Returns the threshold now in effect.
    pub async fn set_threshold(&self, threshold: f32) -> f32 {
        let mut current = self.threshold.write().await;
        if threshold.is_nan() {
            return *current;
        }
        let clamped = threshold.clamp(0.0, 1.0);
        *current = clamped;
        drop(current);
        tracing::info!(requested = threshold, threshold = clamped, "match threshold updated");
        clamped
    }
}
