use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use delver_core::{
    build_refiner, load_config, validate_config, ContentExtractor, HttpExtractor,
    HttpSearchBackend, Refiner, SearchBackend,
};
use delver_server::api::create_router;
use delver_server::state::AppState;

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
    let config_path = std::env::var("DELVER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!(
        max_iterations = config.research.max_iterations,
        max_results_total = config.research.max_results_total,
        batch_size = config.research.batch_size,
        "Research limits"
    );

    // Create search backend if configured
    let search: Option<Arc<dyn SearchBackend>> = match &config.search {
        Some(search_config) => {
            info!("Initializing search backend at {}", search_config.url);
            Some(Arc::new(HttpSearchBackend::new(search_config)))
        }
        None => {
            info!("No search backend configured");
            None
        }
    };

    // Create content extractor if configured
    let extractor: Option<Arc<dyn ContentExtractor>> = match &config.extractor {
        Some(extractor_config) => {
            info!("Initializing content extractor at {}", extractor_config.url);
            Some(Arc::new(HttpExtractor::new(extractor_config)))
        }
        None => {
            info!("No content extractor configured");
            None
        }
    };

    // Create refiner if configured
    let refiner: Option<Arc<dyn Refiner>> = match &config.refiner {
        Some(refiner_config) => match build_refiner(refiner_config) {
            Ok(refiner) => {
                info!("Using refiner: {}", refiner.name());
                Some(refiner)
            }
            Err(e) => {
                error!("Failed to create refiner: {}", e);
                None
            }
        },
        None => {
            info!("No refiner configured");
            None
        }
    };

    if search.is_none() || extractor.is_none() || refiner.is_none() {
        warn!("Research sessions are unavailable until search, extractor and refiner are configured");
    }

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), search, extractor, refiner));

    // Create router
    let app = create_router(Arc::clone(&state));

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

    info!("Server shutting down...");
    state.cancel_all().await;
    info!("Running sessions canceled");

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
