use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vigil_core::Recognizer;

mod analyzer;
mod config;
mod dbus_interface;

use analyzer::AnalyzerClient;
use config::Config;
use dbus_interface::{RecognitionService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!(
        analyzer = %config.analyzer_service,
        threshold = config.match_threshold,
        min_samples = config.min_samples,
        session_bus = config.session_bus,
        "vigild starting"
    );

    let conn = if config.session_bus {
        zbus::connection::Builder::session()?.build().await?
    } else {
        zbus::connection::Builder::system()?.build().await?
    };

    // The analysis service may start after us; calls fail as "unavailable" until it does.
    let analyzer = AnalyzerClient::connect(&conn, &config.analyzer_service).await?;
    let recognizer = Arc::new(Recognizer::new(analyzer, config.recognizer_config()));

    conn.object_server()
        .at(OBJECT_PATH, RecognitionService::new(recognizer))
        .await?;
    conn.request_name(BUS_NAME).await?;

    tracing::info!(bus_name = BUS_NAME, path = OBJECT_PATH, "vigild ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("vigild shutting down");

    Ok(())
}
