//! Nearest-reference matching of a probe embedding against the gallery.

use crate::extractor::ExtractorError;
use crate::gallery::GalleryEntry;
use crate::types::Embedding;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Minimum confidence a match must strictly exceed unless configured otherwise.
pub const DEFAULT_THRESHOLD: f32 = 0.6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("descriptor length mismatch against {identity_id}: reference has {expected}, probe has {got}")]
    DescriptorLengthMismatch {
        identity_id: String,
        expected: usize,
        got: usize,
    },
    #[error("query embedding is empty or has non-finite components")]
    InvalidEmbedding,
    #[error(transparent)]
    Extractor(#[from] ExtractorError),
}

/// Outcome of one recognition attempt.
///
/// `confidence` is `1 - distance` and is deliberately left unclamped: it goes
/// negative for distances above 1. A non-match still reports the nearest
/// reference's distance and confidence, or `(0, +inf)` for an empty gallery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Verdict {
    Match {
        identity_id: String,
        name: String,
        confidence: f32,
        distance: f32,
    },
    NoMatch {
        confidence: f32,
        distance: f32,
    },
    /// The extractor found no face in the probe image, so nothing was compared.
    NoFaceDetected,
}

impl Verdict {
    /// Non-match against an empty gallery.
    pub fn empty_gallery() -> Self {
        Verdict::NoMatch {
            confidence: 0.0,
            distance: f32::INFINITY,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Verdict::Match { .. })
    }

    pub fn identity_id(&self) -> Option<&str> {
        match self {
            Verdict::Match { identity_id, .. } => Some(identity_id),
            _ => None,
        }
    }

    pub fn confidence(&self) -> f32 {
        match self {
            Verdict::Match { confidence, .. } | Verdict::NoMatch { confidence, .. } => *confidence,
            Verdict::NoFaceDetected => 0.0,
        }
    }

    pub fn distance(&self) -> f32 {
        match self {
            Verdict::Match { distance, .. } | Verdict::NoMatch { distance, .. } => *distance,
            Verdict::NoFaceDetected => f32::INFINITY,
        }
    }
}

/// Strategy for comparing a probe embedding against a gallery snapshot.
pub trait Matcher: Send + Sync {
    fn compare(
        &self,
        probe: &Embedding,
        gallery: &[Arc<GalleryEntry>],
        threshold: f32,
    ) -> Result<Verdict, MatchError>;
}

/// Euclidean nearest-neighbour matcher.
///
/// Every reference is compared; the lowest distance wins and the first-seen
/// reference is kept on ties. A match requires `1 - distance > threshold`,
/// so a confidence exactly equal to the threshold is rejected. References
/// whose distance comes out NaN are skipped.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(
        &self,
        probe: &Embedding,
        gallery: &[Arc<GalleryEntry>],
        threshold: f32,
    ) -> Result<Verdict, MatchError> {
        if gallery.is_empty() {
            return Ok(Verdict::empty_gallery());
        }
        if !probe.is_usable() {
            return Err(MatchError::InvalidEmbedding);
        }

        let mut best: Option<(&GalleryEntry, f32)> = None;
        for entry in gallery {
            let distance = entry.reference.euclidean_distance(probe).map_err(|m| {
                MatchError::DescriptorLengthMismatch {
                    identity_id: entry.identity_id.clone(),
                    expected: m.expected,
                    got: m.got,
                }
            })?;
            if distance.is_nan() {
                tracing::warn!(identity_id = %entry.identity_id, "skipping reference with NaN distance");
                continue;
            }
            let is_better = match best {
                None => true,
                Some((_, best_distance)) => distance < best_distance,
            };
            if is_better {
                best = Some((entry, distance));
            }
        }

        let Some((entry, distance)) = best else {
            return Ok(Verdict::empty_gallery());
        };
        let confidence = 1.0 - distance;

        if confidence > threshold {
            Ok(Verdict::Match {
                identity_id: entry.identity_id.clone(),
                name: entry.name.clone(),
                confidence,
                distance,
            })
        } else {
            Ok(Verdict::NoMatch {
                confidence,
                distance,
            })
        }
    }
}
