//! Enrolled identities and their reference embeddings.
//!
//! A reference is the element-wise mean of an identity's enrollment samples.
//! Entries are built completely before they are published, and published by
//! replacing the whole `Arc`, so readers only ever see finished references.

use crate::types::Embedding;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::extractor::ExtractorError;

/// Where a descriptor length mismatch was found during enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchSite {
    /// Enrollment sample at this index disagrees with sample 0.
    Sample(usize),
    /// The new reference disagrees with the references already enrolled.
    Gallery,
}

impl fmt::Display for MismatchSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchSite::Sample(i) => write!(f, "sample {i}"),
            MismatchSite::Gallery => f.write_str("enrolled gallery"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnrollError {
    #[error("enrollment needs at least {required} samples, got {got}")]
    InsufficientSamples { required: usize, got: usize },
    #[error("no face detected in enrollment sample {0}")]
    NoFaceInSample(usize),
    #[error("enrollment sample {0} has an empty or non-finite embedding")]
    InvalidSample(usize),
    #[error("descriptor length mismatch at {at}: expected {expected}, got {got}")]
    DescriptorLengthMismatch {
        at: MismatchSite,
        expected: usize,
        got: usize,
    },
    #[error(transparent)]
    Extractor(#[from] ExtractorError),
}

/// One enrolled identity.
#[derive(Debug, Clone, Serialize)]
pub struct GalleryEntry {
    pub identity_id: String,
    pub name: String,
    pub reference: Embedding,
    /// Number of samples averaged into `reference`.
    pub sample_count: usize,
    pub enrolled_at: DateTime<Utc>,
}

/// Gallery entry without the embedding, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentitySummary {
    pub identity_id: String,
    pub name: String,
    pub sample_count: usize,
    pub dimension: usize,
    pub enrolled_at: DateTime<Utc>,
}

impl From<&GalleryEntry> for IdentitySummary {
    fn from(entry: &GalleryEntry) -> Self {
        Self {
            identity_id: entry.identity_id.clone(),
            name: entry.name.clone(),
            sample_count: entry.sample_count,
            dimension: entry.reference.len(),
            enrolled_at: entry.enrolled_at,
        }
    }
}

/// Element-wise arithmetic mean of `samples`.
///
/// Callers must pass a non-empty set of equal-length embeddings; see
/// [`build_reference`]. Sums are accumulated in f64 and narrowed once.
pub fn average(samples: &[Embedding]) -> Embedding {
    let Some(first) = samples.first() else {
        return Embedding::new(Vec::new());
    };
    let k = samples.len() as f64;
    let values = (0..first.len())
        .map(|i| {
            let sum: f64 = samples.iter().map(|s| s.values[i] as f64).sum();
            (sum / k) as f32
        })
        .collect();
    Embedding::new(values)
}

/// Verify every sample has the length of sample 0.
pub fn check_uniform_length(samples: &[Embedding]) -> Result<(), EnrollError> {
    let Some(first) = samples.first() else {
        return Ok(());
    };
    let expected = first.len();
    for (i, sample) in samples.iter().enumerate().skip(1) {
        if sample.len() != expected {
            return Err(EnrollError::DescriptorLengthMismatch {
                at: MismatchSite::Sample(i),
                expected,
                got: sample.len(),
            });
        }
    }
    Ok(())
}

/// Apply the enrollment policy to already-extracted samples and build the
/// entry that would be stored. Nothing is published here.
pub fn build_reference(
    identity_id: &str,
    name: &str,
    samples: &[Embedding],
    min_samples: usize,
) -> Result<GalleryEntry, EnrollError> {
    if samples.len() < min_samples || samples.is_empty() {
        return Err(EnrollError::InsufficientSamples {
            required: min_samples.max(1),
            got: samples.len(),
        });
    }
    if let Some(index) = samples.iter().position(|s| !s.is_usable()) {
        return Err(EnrollError::InvalidSample(index));
    }
    check_uniform_length(samples)?;

    Ok(GalleryEntry {
        identity_id: identity_id.to_string(),
        name: name.to_string(),
        reference: average(samples),
        sample_count: samples.len(),
        enrolled_at: Utc::now(),
    })
}

/// Shared identity → reference map.
///
/// Iteration is ordered by identity id, which makes tie-breaking between
/// equidistant references deterministic.
#[derive(Default)]
pub struct Gallery {
    entries: RwLock<BTreeMap<String, Arc<GalleryEntry>>>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `entry`, replacing any previous entry for the same identity.
    ///
    /// Rejects a reference whose length differs from the other enrolled
    /// references; the entry being replaced does not count.
    pub async fn insert(&self, entry: GalleryEntry) -> Result<Arc<GalleryEntry>, EnrollError> {
        let entry = Arc::new(entry);
        let mut entries = self.entries.write().await;

        let other = entries
            .values()
            .find(|existing| existing.identity_id != entry.identity_id);
        if let Some(other) = other {
            if other.reference.len() != entry.reference.len() {
                return Err(EnrollError::DescriptorLengthMismatch {
                    at: MismatchSite::Gallery,
                    expected: other.reference.len(),
                    got: entry.reference.len(),
                });
            }
        }

        let replaced = entries.insert(entry.identity_id.clone(), Arc::clone(&entry));
        if replaced.is_some() {
            tracing::debug!(identity_id = %entry.identity_id, "replaced existing reference");
        }
        Ok(entry)
    }

    /// Remove an identity. Returns whether it was present.
    pub async fn remove(&self, identity_id: &str) -> bool {
        self.entries.write().await.remove(identity_id).is_some()
    }

    pub async fn contains(&self, identity_id: &str) -> bool {
        self.entries.read().await.contains_key(identity_id)
    }

    pub async fn get(&self, identity_id: &str) -> Option<Arc<GalleryEntry>> {
        self.entries.read().await.get(identity_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Point-in-time copy of every entry, ordered by identity id.
    pub async fn snapshot(&self) -> Vec<Arc<GalleryEntry>> {
        self.entries.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    #[test]
    fn test_average_is_centroid() {
        let samples = vec![emb(&[0.0, 2.0, -1.0]), emb(&[2.0, 4.0, 1.0]), emb(&[4.0, 0.0, 3.0])];
        assert_eq!(average(&samples).values, vec![2.0, 2.0, 1.0]);
    }

    #[test]
    fn test_average_is_bit_identical_on_rerun() {
        let samples = vec![
            emb(&[0.1, 0.7, -0.33]),
            emb(&[0.2, 0.11, 0.9]),
            emb(&[0.3, -0.5, 0.123]),
            emb(&[0.013, 0.29, 0.4]),
        ];
        let a = average(&samples);
        let b = average(&samples);
        let bits = |e: &Embedding| e.values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn test_check_uniform_length_reports_first_bad_index() {
        let samples = vec![emb(&[0.0; 4]), emb(&[0.0; 4]), emb(&[0.0; 3]), emb(&[0.0; 5])];
        assert_eq!(
            check_uniform_length(&samples),
            Err(EnrollError::DescriptorLengthMismatch {
                at: MismatchSite::Sample(2),
                expected: 4,
                got: 3,
            })
        );
    }

    #[test]
    fn test_build_reference_requires_min_samples() {
        let samples = vec![emb(&[1.0]), emb(&[1.0])];
        assert_eq!(
            build_reference("a", "A", &samples, 3).unwrap_err(),
            EnrollError::InsufficientSamples { required: 3, got: 2 }
        );
    }

    #[test]
    fn test_build_reference_rejects_empty_even_without_minimum() {
        let err = build_reference("a", "A", &[], 0).unwrap_err();
        assert_eq!(err, EnrollError::InsufficientSamples { required: 1, got: 0 });
    }

    #[test]
    fn test_build_reference_averages() {
        let samples = vec![emb(&[1.0, 0.0]), emb(&[3.0, 0.0]), emb(&[5.0, 3.0])];
        let entry = build_reference("e1", "Ada", &samples, 3).unwrap();
        assert_eq!(entry.identity_id, "e1");
        assert_eq!(entry.name, "Ada");
        assert_eq!(entry.sample_count, 3);
        assert_eq!(entry.reference.values, vec![3.0, 1.0]);
    }

    #[test]
    fn test_build_reference_rejects_non_finite_sample() {
        let samples = vec![emb(&[0.0, 0.0]), emb(&[f32::NAN, 0.0]), emb(&[0.0, 0.0])];
        assert_eq!(
            build_reference("a", "A", &samples, 3).unwrap_err(),
            EnrollError::InvalidSample(1)
        );

        let samples = vec![emb(&[0.0]), emb(&[0.0]), emb(&[f32::INFINITY])];
        assert_eq!(
            build_reference("a", "A", &samples, 3).unwrap_err(),
            EnrollError::InvalidSample(2)
        );
    }

    #[test]
    fn test_build_reference_rejects_empty_embeddings() {
        let samples = vec![emb(&[]), emb(&[]), emb(&[])];
        assert_eq!(
            build_reference("a", "A", &samples, 3).unwrap_err(),
            EnrollError::InvalidSample(0)
        );
    }

    #[tokio::test]
    async fn test_insert_replaces_wholesale() {
        let gallery = Gallery::new();
        let first = build_reference("e1", "Ada", &vec![emb(&[1.0, 1.0]); 3], 3).unwrap();
        gallery.insert(first).await.unwrap();

        let second = build_reference("e1", "Ada L.", &vec![emb(&[5.0, 5.0]); 4], 3).unwrap();
        gallery.insert(second).await.unwrap();

        assert_eq!(gallery.len().await, 1);
        let stored = gallery.get("e1").await.unwrap();
        assert_eq!(stored.name, "Ada L.");
        assert_eq!(stored.sample_count, 4);
        assert_eq!(stored.reference.values, vec![5.0, 5.0]);
    }

    #[tokio::test]
    async fn test_insert_rejects_gallery_dimension_mismatch() {
        let gallery = Gallery::new();
        gallery
            .insert(build_reference("a", "A", &vec![emb(&[0.0; 4]); 3], 3).unwrap())
            .await
            .unwrap();

        let err = gallery
            .insert(build_reference("b", "B", &vec![emb(&[0.0; 8]); 3], 3).unwrap())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EnrollError::DescriptorLengthMismatch {
                at: MismatchSite::Gallery,
                expected: 4,
                got: 8,
            }
        );
        assert!(!gallery.contains("b").await);
    }

    #[tokio::test]
    async fn test_sole_entry_may_change_dimension_on_reenroll() {
        let gallery = Gallery::new();
        gallery
            .insert(build_reference("a", "A", &vec![emb(&[0.0; 4]); 3], 3).unwrap())
            .await
            .unwrap();
        gallery
            .insert(build_reference("a", "A", &vec![emb(&[0.0; 8]); 3], 3).unwrap())
            .await
            .unwrap();
        assert_eq!(gallery.get("a").await.unwrap().reference.len(), 8);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let gallery = Gallery::new();
        assert!(!gallery.remove("ghost").await);
        assert!(gallery.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_ordered_by_id() {
        let gallery = Gallery::new();
        for id in ["c", "a", "b"] {
            gallery
                .insert(build_reference(id, id, &vec![emb(&[0.0]); 3], 3).unwrap())
                .await
                .unwrap();
        }
        let ids: Vec<_> = gallery
            .snapshot()
            .await
            .iter()
            .map(|e| e.identity_id.clone())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_snapshot_survives_later_replace() {
        let gallery = Gallery::new();
        gallery
            .insert(build_reference("a", "A", &vec![emb(&[1.0]); 3], 3).unwrap())
            .await
            .unwrap();
        let snap = gallery.snapshot().await;
        gallery
            .insert(build_reference("a", "A", &vec![emb(&[9.0]); 3], 3).unwrap())
            .await
            .unwrap();
        assert_eq!(snap[0].reference.values, vec![1.0]);
    }
}
