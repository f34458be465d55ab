pub mod config;
pub mod db;
pub mod history;
pub mod inventory;
pub mod models;
pub mod scanner;
pub mod settings;
mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use config::AppConfig;
use db::Database;
use inventory::InventoryStore;
use log::info;
use scanner::{BarcodeDecoder, CameraBackend, DecoderBackends, ScannerConfig, ScannerController};
use settings::SettingsStore;

/// Shared handles the command layer operates on.
pub struct AppState {
    pub db: Database,
    pub inventory: InventoryStore,
    pub settings: SettingsStore,
    pub scanner: ScannerController,
    pub export_dir: PathBuf,
}

impl AppState {
    /// Open storage, load persisted state, and wire the scanner to the host
    /// camera. `native` is the platform barcode detector, if the host has one.
    pub async fn initialize(
        config: &AppConfig,
        camera: Arc<dyn CameraBackend>,
        native: Option<Arc<dyn BarcodeDecoder>>,
    ) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .with_context(|| format!("failed to create {}", config.data_dir.display()))?;

        let database = Database::new(config.database_path())?;
        let settings = SettingsStore::load(database.clone()).await?;
        let inventory = InventoryStore::load(database.clone()).await?;

        let scanner = ScannerController::new(
            camera,
            DecoderBackends::with_builtin(native),
            settings.clone(),
            ScannerConfig::default(),
        );

        info!(
            "State ready: {} products, data in {}",
            inventory.snapshot().len(),
            config.data_dir.display()
        );

        Ok(Self {
            db: database,
            inventory,
            settings,
            scanner,
            export_dir: config.export_dir.clone(),
        })
    }
}

/// Initialize logging (reads RUST_LOG env var).
pub fn init_logging(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();

    log::info!("StockScan starting up...");
}
