// src/main.rs - Service entry point
use clap::Parser;
use printer_logbook::config::Config;
use printer_logbook::poller::{ControllerSnapshot, MoonrakerClient, SharedSnapshot, StatusPoller};
use printer_logbook::service::Logbook;
use printer_logbook::store::MemoryJobStore;
use printer_logbook::web;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

#[derive(Parser)]
#[command(name = "printer-logbook", about = "3D print activity logbook with controller polling")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "logbook.toml")]
    config: PathBuf,

    /// Controller base URL (e.g. http://192.168.1.10:7125)
    #[arg(long)]
    controller_url: Option<String>,

    /// Poll interval in seconds
    #[arg(long)]
    poll_interval: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    tracing::info!("Starting printer logbook");

    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", cli.config.display(), e);
        e
    })?;

    // Command line flags win over the config file
    if let Some(url) = cli.controller_url {
        config.controller.base_url = url;
    }
    if let Some(secs) = cli.poll_interval {
        config.controller.poll_interval_secs = secs;
    }
    config.validate()?;

    tracing::info!("Controller: {}", config.controller.base_url);
    tracing::info!("Poll interval: {}s", config.controller.poll_interval_secs);
    tracing::info!("Upload directory: {}", config.storage.upload_dir.display());

    let snapshot: SharedSnapshot = Arc::new(RwLock::new(ControllerSnapshot::default()));
    let store = Arc::new(MemoryJobStore::new());
    let logbook = Arc::new(Logbook::new(
        store,
        snapshot.clone(),
        config.storage.upload_dir.clone(),
    ));

    let client = Arc::new(MoonrakerClient::new(
        &config.controller.base_url,
        Duration::from_secs(config.controller.request_timeout_secs),
    )?);

    // Spawn the background poller with a shutdown channel
    let (shutdown_tx, _) = broadcast::channel(1);
    let poller = StatusPoller::new(
        client,
        logbook.clone(),
        snapshot,
        Duration::from_secs(config.controller.poll_interval_secs),
    );
    let poller_handle = tokio::spawn(poller.run(shutdown_tx.subscribe()));

    let app = web::api::create_router(logbook);
    let addr = format!("{}:{}", config.web.bind_address, config.web.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Web API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(());
    let _ = poller_handle.await;
    tracing::info!("Printer logbook stopped");

    Ok(())
}
