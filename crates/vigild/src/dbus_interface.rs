use std::sync::Arc;
use vigil_core::{
    EnrollError, ExtractorError, FaceImage, FaceImageError, IdentitySummary, MatchError,
    RecognitionStats, Recognizer,
};
use zbus::interface;

use crate::analyzer::AnalyzerClient;

pub const BUS_NAME: &str = "org.vigil.Recognition1";
pub const OBJECT_PATH: &str = "/org/vigil/Recognition1";

/// Typed D-Bus errors, one per failure a caller may want to tell apart.
#[derive(zbus::DBusError, Debug)]
#[zbus(prefix = "org.vigil.Recognition1.Error")]
pub enum ServiceError {
    #[zbus(error)]
    ZBus(zbus::Error),
    InsufficientSamples(String),
    NoFaceInSample(String),
    DescriptorLengthMismatch(String),
    InvalidEmbedding(String),
    ExtractorUnavailable(String),
    ExtractionFailed(String),
    InvalidImage(String),
    Internal(String),
}

impl From<ExtractorError> for ServiceError {
    fn from(err: ExtractorError) -> Self {
        match err {
            ExtractorError::Unavailable(_) => ServiceError::ExtractorUnavailable(err.to_string()),
            ExtractorError::Failed(_) => ServiceError::ExtractionFailed(err.to_string()),
        }
    }
}

impl From<EnrollError> for ServiceError {
    fn from(err: EnrollError) -> Self {
        match err {
            EnrollError::InsufficientSamples { .. } => {
                ServiceError::InsufficientSamples(err.to_string())
            }
            EnrollError::NoFaceInSample(_) => ServiceError::NoFaceInSample(err.to_string()),
            EnrollError::InvalidSample(_) => ServiceError::InvalidEmbedding(err.to_string()),
            EnrollError::DescriptorLengthMismatch { .. } => {
                ServiceError::DescriptorLengthMismatch(err.to_string())
            }
            EnrollError::Extractor(inner) => inner.into(),
        }
    }
}

impl From<MatchError> for ServiceError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::DescriptorLengthMismatch { .. } => {
                ServiceError::DescriptorLengthMismatch(err.to_string())
            }
            MatchError::InvalidEmbedding => ServiceError::InvalidEmbedding(err.to_string()),
            MatchError::Extractor(inner) => inner.into(),
        }
    }
}

impl From<FaceImageError> for ServiceError {
    fn from(err: FaceImageError) -> Self {
        ServiceError::InvalidImage(err.to_string())
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ServiceError> {
    serde_json::to_string(value).map_err(|e| ServiceError::Internal(e.to_string()))
}

fn stats_json(stats: &RecognitionStats) -> String {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "count": stats.count,
        "threshold": stats.threshold,
        "min_samples": stats.min_samples,
        "ready": stats.ready,
    })
    .to_string()
}

fn decode(bytes: Vec<u8>, index: usize) -> Result<FaceImage, ServiceError> {
    FaceImage::from_encoded(bytes)
        .map_err(|e| ServiceError::InvalidImage(format!("image {index}: {e}")))
}

/// D-Bus interface for the Vigil recognition daemon.
///
/// Bus name: org.vigil.Recognition1
/// Object path: /org/vigil/Recognition1
pub struct RecognitionService {
    recognizer: Arc<Recognizer<AnalyzerClient>>,
}

impl RecognitionService {
    pub fn new(recognizer: Arc<Recognizer<AnalyzerClient>>) -> Self {
        Self { recognizer }
    }
}

#[interface(name = "org.vigil.Recognition1")]
impl RecognitionService {
    /// Enroll (or re-enroll) an identity from encoded face images.
    ///
    /// Returns the new gallery entry summary as JSON.
    async fn enroll(
        &self,
        identity_id: &str,
        name: &str,
        images: Vec<Vec<u8>>,
    ) -> Result<String, ServiceError> {
        tracing::info!(identity_id, name, images = images.len(), "enroll requested");
        let images = images
            .into_iter()
            .enumerate()
            .map(|(i, bytes)| decode(bytes, i))
            .collect::<Result<Vec<_>, _>>()?;

        let entry = self.recognizer.enroll(identity_id, name, &images).await?;
        to_json(&IdentitySummary::from(entry.as_ref()))
    }

    /// Identify the face in `image` using the current default threshold.
    ///
    /// Returns the verdict as JSON.
    async fn identify(&self, image: Vec<u8>) -> Result<String, ServiceError> {
        let image = decode(image, 0)?;
        let verdict = self.recognizer.identify(&image, None).await?;
        to_json(&verdict)
    }

    /// Identify with an explicit threshold for this call only.
    async fn identify_with_threshold(
        &self,
        image: Vec<u8>,
        threshold: f64,
    ) -> Result<String, ServiceError> {
        let image = decode(image, 0)?;
        let verdict = self
            .recognizer
            .identify(&image, Some(threshold as f32))
            .await?;
        to_json(&verdict)
    }

    /// Remove an identity. Returns false if it was not enrolled.
    async fn remove(&self, identity_id: &str) -> bool {
        tracing::info!(identity_id, "remove requested");
        self.recognizer.remove(identity_id).await
    }

    async fn is_enrolled(&self, identity_id: &str) -> bool {
        self.recognizer.is_enrolled(identity_id).await
    }

    /// Return gallery statistics as JSON.
    async fn stats(&self) -> Result<String, ServiceError> {
        let stats = self.recognizer.stats().await;
        if !stats.ready {
            tracing::warn!("stats: face analysis service is not ready");
        }
        Ok(stats_json(&stats))
    }

    /// List enrolled identities (no embeddings) as JSON.
    async fn list_identities(&self) -> Result<String, ServiceError> {
        to_json(&self.recognizer.identities().await)
    }

    /// Check whether `image` is suitable for enrollment.
    async fn validate(&self, image: Vec<u8>) -> Result<String, ServiceError> {
        let image = decode(image, 0)?;
        let check = self.recognizer.validate(&image).await?;
        Ok(serde_json::json!({
            "valid": check.is_valid(),
            "message": check.message(),
            "result": check,
        })
        .to_string())
    }

    /// Set the default match threshold. Returns the clamped value in effect.
    async fn set_threshold(&self, threshold: f64) -> f64 {
        self.recognizer.set_threshold(threshold as f32).await as f64
    }
}
