use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modkiln_core::{
    load_config, validate_config, AdmissionController, Database, ExecutorBackend, ExpiryReaper,
    HttpStageExecutor, JobStore, PipelineCoordinator, ResultAggregator, SqliteJobStore,
    StageExecutor, UploadAssembler,
};

use modkiln_server::api::create_router;
use modkiln_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("MODKILN_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // Open the shared database
    let db = Database::open(&config.database.path).context("Failed to open database")?;
    info!("Database initialized");

    // Create the upload assembler
    let uploads = Arc::new(
        UploadAssembler::new(db.clone(), config.upload.clone())
            .context("Failed to create upload assembler")?,
    );
    info!(
        "Upload assembler initialized (artifacts dir: {:?})",
        config.upload.artifacts_dir
    );

    // Create the job store and result aggregator
    let jobs: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(db.clone()));
    let aggregator = Arc::new(ResultAggregator::new(db));
    info!("Job store initialized");

    // Create the stage executor backend
    let executor: Arc<dyn StageExecutor> = match config.executor.backend {
        ExecutorBackend::Http => {
            let http_config = config
                .executor
                .http
                .clone()
                .context("executor.backend is 'http' but [executor.http] is missing")?;
            info!("Initializing HTTP stage executor at {}", http_config.url);
            Arc::new(
                HttpStageExecutor::new(http_config)
                    .context("Failed to create HTTP stage executor")?,
            )
        }
    };

    // Create and start the pipeline coordinator
    let coordinator = Arc::new(PipelineCoordinator::new(
        config.pipeline.clone(),
        executor,
        Arc::clone(&jobs),
        Arc::clone(&aggregator),
    ));
    coordinator.start().await;
    info!("Pipeline coordinator started");

    // Create the admission controller
    let limiter = Arc::new(AdmissionController::new(config.limiter.clone()));

    // Create and start the expiry reaper
    let reaper = ExpiryReaper::new(
        config.reaper.clone(),
        Arc::clone(&uploads),
        Arc::clone(&jobs),
        Arc::clone(&limiter),
    );
    reaper.start();

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        uploads,
        jobs,
        aggregator,
        Arc::clone(&coordinator),
        limiter,
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutting down...");
    reaper.stop();
    coordinator.stop().await;
    info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
