//! # Storage Node
//!
//! Boots the tiered storage engine and keeps its background work running.
//!
//! ## Startup Sequence
//!
//! 1. Load the JSON config (first argument, or `TIERED_STORAGE_CONFIG`)
//! 2. Apply the `TIERED_STORAGE_MODE` boot mode override, if set
//! 3. Open the engine (lock, metadata, tiers)
//! 4. Spawn the migration worker (storage types with Cold only)
//! 5. Spawn the maintenance loop: write-back flush and volume readmission
//! 6. Wait for Ctrl+C, then signal shutdown
//!
//! Any startup failure exits with a non-zero status.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tiered_storage::{BootMode, Engine, EngineConfig};

const CONFIG_ENV: &str = "TIERED_STORAGE_CONFIG";
const MODE_ENV: &str = "TIERED_STORAGE_MODE";
const DEFAULT_CONFIG_PATH: &str = "storage.json";

/// How often dirty cache entries are flushed and evicted volumes rechecked.
const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(10);

/// A running engine and its background tasks.
struct StorageNode {
    engine: Arc<Engine>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl StorageNode {
    fn new(engine: Engine) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            engine: Arc::new(engine),
            shutdown_tx,
            shutdown_rx,
            tasks: Vec::new(),
        }
    }

    fn start(&mut self) {
        match self.engine.migration_worker() {
            Some(worker) => {
                let worker = Arc::new(worker);
                let shutdown = self.shutdown_rx.clone();
                self.tasks.push(tokio::spawn(worker.run(shutdown)));
            }
            None => info!("[node] storage type has no cold tier, migration disabled"),
        }

        let engine = Arc::clone(&self.engine);
        let mut shutdown = self.shutdown_rx.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(MAINTENANCE_INTERVAL);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let engine = Arc::clone(&engine);
                        let result = tokio::task::spawn_blocking(move || {
                            engine.store().flush_write_back();
                            engine.readmit()
                        })
                        .await;
                        match result {
                            Ok(0) => {}
                            Ok(readmitted) => info!("[node] readmitted {} volumes", readmitted),
                            Err(e) => error!("[node] maintenance task failed: {}", e),
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("[node] maintenance shutdown signal received");
                        break;
                    }
                }
            }
        }));
    }

    async fn shutdown(self) {
        info!("[node] initiating graceful shutdown...");

        if let Err(e) = self.shutdown_tx.send(true) {
            error!("[node] failed to send shutdown signal: {}", e);
        }
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("[node] background task ended abnormally: {}", e);
            }
        }

        // Last chance for write-back blocks to reach a durable tier.
        let flushed = self.engine.store().flush_write_back();
        info!("[node] shutdown complete ({} blocks flushed)", flushed);
    }
}

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
        .into()
}

fn load_config() -> Result<EngineConfig> {
    let path = config_path();
    let mut config = EngineConfig::from_json_file(&path)
        .with_context(|| format!("loading config {}", path.display()))?;

    if let Ok(mode) = std::env::var(MODE_ENV) {
        let mode: BootMode = mode
            .parse()
            .with_context(|| format!("parsing {}", MODE_ENV))?;
        info!("[node] boot mode overridden to {}", mode);
        config = config.with_mode(mode);
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config()?;
    let engine = tokio::task::spawn_blocking(move || Engine::open(config))
        .await
        .context("engine startup task")?
        .context("opening storage engine")?;
    info!("[node] {:?}", engine);

    let mut node = StorageNode::new(engine);
    node.start();

    info!("[node] running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    node.shutdown().await;
    Ok(())
}
