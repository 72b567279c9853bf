pub mod api; // HTTP command surface
pub mod config;
pub mod expiry; // Idle session sweeper
pub mod intake; // Session command orchestration
pub mod models;
pub mod pipeline;
pub mod render;
pub mod session;
pub mod storage;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::intake::IntakeService;
use crate::pipeline::client::{build_client, ClientError};
use crate::render::{JsonReportRenderer, RenderError};
use crate::storage::{FsPhotoStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Photo storage unavailable: {0}")]
    Storage(#[from] StorageError),

    #[error("Report directory unavailable: {0}")]
    Render(#[from] RenderError),

    #[error("Vision client setup failed: {0}")]
    Client(#[from] ClientError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Server(String),
}

/// Start the intake service and block until Ctrl-C.
///
/// The vision client uses blocking HTTP, so it is built before the tokio
/// runtime exists.
pub fn run() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env();
    tracing::info!(
        backend = ?config.backend,
        model = %config.model,
        data_dir = %config.data_dir.display(),
        "Configuration loaded"
    );

    let photos = FsPhotoStore::new(config.photos_dir())?;
    // Sessions never survive a restart, so anything on disk is orphaned.
    if let Err(e) = photos.cleanup_orphaned() {
        tracing::warn!("Orphaned photo cleanup failed: {e}");
    }

    let renderer = JsonReportRenderer::new(config.reports_dir())?;
    let client = build_client(&config)?;

    let intake = Arc::new(IntakeService::new(
        client,
        Arc::new(photos),
        Arc::new(renderer),
        config.request_timeout,
    ));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(serve(intake, &config))
}

async fn serve(intake: Arc<IntakeService>, config: &AppConfig) -> Result<(), StartupError> {
    let mut server = api::start_intake_server(Arc::clone(&intake), config.bind_addr)
        .await
        .map_err(StartupError::Server)?;
    tracing::info!(addr = %server.addr(), "Intake API listening");

    let sweeper = expiry::start_expiry_sweeper(
        Arc::clone(&intake),
        config.sweep_interval,
        config.session_ttl,
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }

    tracing::info!("Shutting down");
    sweeper.shutdown();
    server.shutdown();
    Ok(())
}
