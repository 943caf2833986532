//! Client for the external face analysis service.
//!
//! The service owns the detection and embedding models. It answers
//! `Analyze(image bytes)` with a JSON array of detected faces:
//! `[{"x":..,"y":..,"width":..,"height":..,"confidence":..,"embedding":[..]}]`.

use async_trait::async_trait;
use vigil_core::{DetectedFace, EmbeddingExtractor, ExtractorError, FaceImage};

/// D-Bus errors meaning nobody is there to answer, as opposed to a failed analysis.
const UNAVAILABLE_ERRORS: &[&str] = &[
    "org.freedesktop.DBus.Error.ServiceUnknown",
    "org.freedesktop.DBus.Error.NameHasNoOwner",
    "org.freedesktop.DBus.Error.NoReply",
    "org.vigil.FaceAnalyzer1.Error.NotReady",
];

#[zbus::proxy(
    interface = "org.vigil.FaceAnalyzer1",
    default_service = "org.vigil.FaceAnalyzer1",
    default_path = "/org/vigil/FaceAnalyzer1"
)]
pub trait FaceAnalyzer {
    async fn analyze(&self, image: &[u8]) -> zbus::Result<String>;
}

/// [`EmbeddingExtractor`] backed by the analysis service over D-Bus.
pub struct AnalyzerClient {
    proxy: FaceAnalyzerProxy<'static>,
}

impl AnalyzerClient {
    /// Bind to the analysis service at `service`. Does not require it to be running yet.
    pub async fn connect(conn: &zbus::Connection, service: &str) -> zbus::Result<Self> {
        let proxy = FaceAnalyzerProxy::builder(conn)
            .destination(service.to_string())?
            .cache_properties(zbus::proxy::CacheProperties::No)
            .build()
            .await?;
        Ok(Self { proxy })
    }

    /// Ask the bus whether anyone currently owns the analysis service name.
    async fn service_has_owner(&self) -> zbus::Result<bool> {
        let proxy = self.proxy.inner();
        let dbus = zbus::fdo::DBusProxy::new(proxy.connection()).await?;
        Ok(dbus.name_has_owner(proxy.destination().clone()).await?)
    }
}

#[async_trait]
impl EmbeddingExtractor for AnalyzerClient {
    async fn detect(&self, image: &FaceImage) -> Result<Vec<DetectedFace>, ExtractorError> {
        let reply = self
            .proxy
            .analyze(&image.bytes)
            .await
            .map_err(map_call_error)?;
        let faces = parse_detections(&reply)?;
        tracing::debug!(
            width = image.width,
            height = image.height,
            faces = faces.len(),
            "analyzer: image analysed"
        );
        Ok(faces)
    }

    async fn is_ready(&self) -> bool {
        match self.service_has_owner().await {
            Ok(owned) => owned,
            Err(e) => {
                tracing::warn!(error = %e, "analyzer readiness check failed");
                false
            }
        }
    }
}

fn map_call_error(err: zbus::Error) -> ExtractorError {
    let unavailable = match &err {
        zbus::Error::MethodError(name, _, _) => is_unavailable(name.as_str()),
        zbus::Error::InputOutput(_) => true,
        _ => false,
    };
    if unavailable {
        tracing::error!(error = %err, "face analysis service unavailable");
        ExtractorError::Unavailable(err.to_string())
    } else {
        tracing::error!(error = %err, "face analysis call failed");
        ExtractorError::Failed(err.to_string())
    }
}

fn is_unavailable(error_name: &str) -> bool {
    UNAVAILABLE_ERRORS.contains(&error_name)
}

/// Decode the service reply into detections.
pub fn parse_detections(json: &str) -> Result<Vec<DetectedFace>, ExtractorError> {
    serde_json::from_str(json)
        .map_err(|e| ExtractorError::Failed(format!("malformed analyzer reply: {e}")))
}
