use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use regex_lite::Regex;
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use conveyor_core::{
    load_config, validate_config, AnalyzerClient, BrokerConsumer, Dispatcher, HttpAnalyzerClient,
    MergeProcessor, RemotePoller, SequentialLane, StageMode, TaskRegistry, WorkerPool,
};

use conveyor_server::api::create_router;
use conveyor_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
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
    let config_path = std::env::var("CONVEYOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Conveyor {} starting", VERSION);
    info!("Stage mode: {}", config.stage.mode.as_str());
    info!(
        "Broker: {}:{} (queue '{}')",
        config.broker.host, config.broker.port, config.broker.queue
    );
    info!("Input directory: {:?}", config.paths.input_dir);

    // Compute config hash for startup diagnostics
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Config hash: {}", &config_hash[..16]);

    // Shared directories; external producers also touch these, so creation
    // is idempotent.
    tokio::fs::create_dir_all(&config.paths.input_dir)
        .await
        .context("Failed to create input directory")?;
    tokio::fs::create_dir_all(&config.paths.staging_dir)
        .await
        .context("Failed to create staging directory")?;
    tokio::fs::create_dir_all(&config.paths.pending_dir)
        .await
        .context("Failed to create pending directory")?;

    let pattern = Regex::new(&config.stage.artifact_pattern)
        .context("Invalid artifact filename pattern")?;

    // The registry is handed to every component as an explicit handle.
    let registry = Arc::new(TaskRegistry::new());

    // Cooperative shutdown signal for the consumer and lane worker.
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Build the dispatch strategy for this stage.
    let dispatcher: Arc<dyn Dispatcher>;
    let mut lane = None;
    let mut lane_worker_handle = None;

    match config.stage.mode {
        StageMode::Parallel => {
            let processor = Arc::new(MergeProcessor::new(
                config.paths.input_dir.clone(),
                config.paths.pending_dir.clone(),
                pattern,
            ));
            dispatcher = Arc::new(WorkerPool::new(
                Arc::clone(&registry),
                processor,
                config.stage.max_workers,
            ));
            info!(
                "Parallel worker pool initialized ({} workers)",
                config.stage.max_workers
            );
        }
        StageMode::Sequential => {
            info!("Analyzer: {}", config.analyzer.base_url);
            let analyzer: Arc<dyn AnalyzerClient> =
                Arc::new(HttpAnalyzerClient::new(config.analyzer.clone()));
            let poller = RemotePoller::new(
                Arc::clone(&analyzer),
                Duration::from_secs(config.analyzer.poll_timeout_secs),
                Duration::from_secs(config.analyzer.poll_interval_secs),
            );
            let (sequential_lane, worker) = SequentialLane::new(
                Arc::clone(&registry),
                analyzer,
                poller,
                config.paths.input_dir.clone(),
                config.paths.staging_dir.clone(),
                pattern,
            );
            let sequential_lane = Arc::new(sequential_lane);

            lane_worker_handle = Some(tokio::spawn(worker.run(shutdown_tx.subscribe())));
            dispatcher = Arc::clone(&sequential_lane) as Arc<dyn Dispatcher>;
            lane = Some(sequential_lane);
            info!("Sequential lane initialized (one task at a time)");
        }
    }

    // Start the broker consumer. It reconnects forever until shutdown.
    let consumer = BrokerConsumer::new(config.broker.clone(), dispatcher);
    let consumer_handle = tokio::spawn(consumer.run(shutdown_tx.subscribe()));
    info!("Broker consumer started");

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), registry, lane));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop the consumer and lane worker, letting in-flight work settle.
    info!("Server shutting down...");
    let _ = shutdown_tx.send(());

    let _ = consumer_handle.await;
    info!("Broker consumer stopped");

    if let Some(handle) = lane_worker_handle {
        let _ = handle.await;
        info!("Sequential lane worker stopped");
    }

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
