//! Pre-enrollment checks on a captured face image.

use crate::types::{DetectedFace, FaceImage};
use serde::Serialize;

/// Face area / image area below which a face is too small to enroll.
pub const DEFAULT_MIN_FACE_RATIO: f32 = 0.05;
/// Face area / image area above which the subject is too close.
pub const DEFAULT_MAX_FACE_RATIO: f32 = 0.8;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum FaceCheck {
    Valid { ratio: f32 },
    NoFace,
    MultipleFaces { count: usize },
    TooSmall { ratio: f32 },
    TooClose { ratio: f32 },
}

impl FaceCheck {
    pub fn is_valid(&self) -> bool {
        matches!(self, FaceCheck::Valid { .. })
    }

    /// Guidance suitable for showing to the person in front of the camera.
    pub fn message(&self) -> &'static str {
        match self {
            FaceCheck::Valid { .. } => "Face image is valid",
            FaceCheck::NoFace => "No face detected in the image",
            FaceCheck::MultipleFaces { .. } => {
                "Multiple faces detected. Please use an image with only one face"
            }
            FaceCheck::TooSmall { .. } => "Face is too small. Please move closer to the camera",
            FaceCheck::TooClose { .. } => "Face is too close. Please move back from the camera",
        }
    }
}

/// Classify the detections for `image` against the face-size bounds.
pub fn check_faces(
    image: &FaceImage,
    faces: &[DetectedFace],
    min_ratio: f32,
    max_ratio: f32,
) -> FaceCheck {
    let face = match faces {
        [] => return FaceCheck::NoFace,
        [face] => face,
        _ => return FaceCheck::MultipleFaces { count: faces.len() },
    };

    let image_area = image.area();
    let ratio = if image_area > 0.0 {
        face.bbox.area() / image_area
    } else {
        0.0
    };

    if ratio < min_ratio {
        FaceCheck::TooSmall { ratio }
    } else if ratio > max_ratio {
        FaceCheck::TooClose { ratio }
    } else {
        FaceCheck::Valid { ratio }
    }
}
