use std::str::FromStr;
use vigil_core::RecognizerConfig;

/// Well-known bus name of the external face analysis service.
pub const DEFAULT_ANALYZER_SERVICE: &str = "org.vigil.FaceAnalyzer1";

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// Bus name of the face analysis service that extracts embeddings.
    pub analyzer_service: String,
    /// Default confidence a match must strictly exceed.
    pub match_threshold: f32,
    /// Minimum number of images per enrollment.
    pub min_samples: usize,
    /// Face-to-image area ratio below which validation reports "too small".
    pub min_face_ratio: f32,
    /// Face-to-image area ratio above which validation reports "too close".
    pub max_face_ratio: f32,
    /// Serve on the session bus instead of the system bus (development mode).
    pub session_bus: bool,
}

impl Config {
    /// Load configuration from `VIGIL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let defaults = RecognizerConfig::default();
        Self {
            analyzer_service: std::env::var("VIGIL_ANALYZER_SERVICE")
                .unwrap_or_else(|_| DEFAULT_ANALYZER_SERVICE.to_string()),
            match_threshold: env_or("VIGIL_MATCH_THRESHOLD", defaults.threshold),
            min_samples: env_or("VIGIL_MIN_SAMPLES", defaults.min_samples),
            min_face_ratio: env_or("VIGIL_MIN_FACE_RATIO", defaults.min_face_ratio),
            max_face_ratio: env_or("VIGIL_MAX_FACE_RATIO", defaults.max_face_ratio),
            session_bus: std::env::var("VIGIL_SESSION_BUS").is_ok(),
        }
    }

    pub fn recognizer_config(&self) -> RecognizerConfig {
        RecognizerConfig {
            threshold: self.match_threshold,
            min_samples: self.min_samples,
            min_face_ratio: self.min_face_ratio,
            max_face_ratio: self.max_face_ratio,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
