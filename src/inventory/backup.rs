//! Export and restore of the whole catalog plus settings as a JSON file.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::models::{BackupDocument, Product, Settings};
use crate::settings::SettingsStore;

use super::{Inventory, InventoryStore};

/// A parsed import that has not been applied yet.
#[derive(Debug, Clone)]
pub struct ImportCandidate {
    pub inventory: Inventory,
    /// Absent when the document carried no usable settings block.
    pub settings: Option<Settings>,
    pub exported_at: Option<DateTime<Utc>>,
}

/// What the user confirms before a restore replaces their data.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub current_count: usize,
    pub incoming_count: usize,
    pub includes_settings: bool,
    pub exported_at: Option<DateTime<Utc>>,
}

impl ImportCandidate {
    pub fn preview(&self, current: &Inventory) -> ImportPreview {
        ImportPreview {
            current_count: current.len(),
            incoming_count: self.inventory.len(),
            includes_settings: self.settings.is_some(),
            exported_at: self.exported_at,
        }
    }
}

pub fn build_backup(inventory: &Inventory, settings: Settings, now: DateTime<Utc>) -> BackupDocument {
    BackupDocument {
        timestamp: now,
        inventory: inventory.clone().into_products(),
        settings,
    }
}

pub fn backup_file_name(date: NaiveDate) -> String {
    format!("stock_backup_{}.json", date.format("%Y-%m-%d"))
}

/// Write `document` as pretty JSON into `dir`, returning the file path.
pub async fn write_backup(dir: &Path, document: &BackupDocument) -> Result<PathBuf> {
    let contents =
        serde_json::to_string_pretty(document).context("failed to serialize backup")?;
    let path = dir.join(backup_file_name(document.timestamp.date_naive()));

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create backup directory {}", dir.display()))?;
    tokio::fs::write(&path, contents)
        .await
        .with_context(|| format!("failed to write backup {}", path.display()))?;

    Ok(path)
}

/// Validate an import document. Only a present `inventory` array is required;
/// settings and timestamp are taken when they parse.
pub fn parse_backup(contents: &str) -> Result<ImportCandidate> {
    let document: serde_json::Value =
        serde_json::from_str(contents).context("backup file is not valid JSON")?;

    let inventory = match document.get("inventory") {
        Some(serde_json::Value::Array(items)) => items.clone(),
        Some(_) => bail!("backup inventory must be a list of products"),
        None => bail!("backup file has no inventory"),
    };

    let products: Vec<Product> = serde_json::from_value(serde_json::Value::Array(inventory))
        .context("backup inventory contains an invalid product")?;

    let settings = match document.get("settings") {
        Some(value) => match serde_json::from_value::<Settings>(value.clone()) {
            Ok(settings) => Some(settings),
            Err(err) => {
                warn!("Ignoring unreadable settings in backup: {err}");
                None
            }
        },
        None => None,
    };

    let exported_at = document
        .get("timestamp")
        .and_then(|value| value.as_str())
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc));

    Ok(ImportCandidate {
        inventory: Inventory::from(products),
        settings,
        exported_at,
    })
}

pub async fn export_backup(
    inventory: &InventoryStore,
    settings: &SettingsStore,
    dir: &Path,
) -> Result<PathBuf> {
    let document = build_backup(&inventory.snapshot(), settings.settings(), Utc::now());
    let path = write_backup(dir, &document).await?;
    info!(
        "Exported {} products to {}",
        document.inventory.len(),
        path.display()
    );
    Ok(path)
}

pub async fn read_backup(path: &Path) -> Result<ImportCandidate> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read backup {}", path.display()))?;
    parse_backup(&contents)
}

/// Apply a confirmed import: the catalog is replaced wholesale and settings
/// only when the document carried them.
pub async fn restore_backup(
    inventory: &InventoryStore,
    settings: &SettingsStore,
    candidate: ImportCandidate,
) -> Result<()> {
    let incoming = candidate.inventory.len();
    inventory
        .commit(candidate.inventory)
        .await
        .context("failed to restore inventory")?;

    if let Some(restored) = candidate.settings {
        settings.replace(restored).await?;
    }

    info!("Restored {incoming} products from backup");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::inventory::NewProduct;

    async fn open_stores(dir: &tempfile::TempDir) -> (InventoryStore, SettingsStore) {
        let db = Database::new(dir.path().join("stockscan.sqlite3")).unwrap();
        (
            InventoryStore::load(db.clone()).await.unwrap(),
            SettingsStore::load(db).await.unwrap(),
        )
    }

    #[test]
    fn file_name_uses_calendar_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(backup_file_name(date), "stock_backup_2024-03-09.json");
    }

    #[test]
    fn import_requires_inventory_array() {
        assert!(parse_backup("not json").is_err());
        assert!(parse_backup(r#"{"settings":{"threshold":2}}"#).is_err());
        assert!(parse_backup(r#"{"inventory":{"a":1}}"#).is_err());

        let candidate = parse_backup(r#"{"inventory":[]}"#).unwrap();
        assert!(candidate.inventory.is_empty());
        assert!(candidate.settings.is_none());
        assert!(candidate.exported_at.is_none());
    }

    #[tokio::test]
    async fn rejected_import_leaves_inventory_alone() {
        let dir = tempfile::tempdir().unwrap();
        let (inventory, _settings) = open_stores(&dir).await;
        inventory
            .add_product(NewProduct {
                barcode: "1".into(),
                name: "Tea".into(),
                quantity: 2,
            })
            .await
            .unwrap();

        let backup = dir.path().join("broken.json");
        tokio::fs::write(&backup, r#"{"timestamp":"2024-01-01T00:00:00Z"}"#)
            .await
            .unwrap();

        assert!(read_backup(&backup).await.is_err());
        assert_eq!(inventory.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn export_then_restore_reproduces_state() {
        let dir = tempfile::tempdir().unwrap();
        let (inventory, settings) = open_stores(&dir).await;
        inventory
            .add_product(NewProduct {
                barcode: "4006381333931".into(),
                name: "Tea".into(),
                quantity: 4,
            })
            .await
            .unwrap();
        inventory.update_stock("4006381333931", -1).await.unwrap();
        settings.update_threshold(8).await.unwrap();

        let exported = inventory.snapshot();
        let path = export_backup(&inventory, &settings, dir.path()).await.unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("stock_backup_"));

        inventory.commit(Inventory::default()).await.unwrap();
        settings.update_threshold(1).await.unwrap();

        let candidate = read_backup(&path).await.unwrap();
        let preview = candidate.preview(&inventory.snapshot());
        assert_eq!(preview.current_count, 0);
        assert_eq!(preview.incoming_count, 1);
        assert!(preview.includes_settings);
        assert!(preview.exported_at.is_some());

        restore_backup(&inventory, &settings, candidate).await.unwrap();
        assert_eq!(*inventory.snapshot(), *exported);
        assert_eq!(settings.threshold(), 8);
    }

    #[tokio::test]
    async fn restore_without_settings_keeps_current_settings() {
        let dir = tempfile::tempdir().unwrap();
        let (inventory, settings) = open_stores(&dir).await;
        settings.update_threshold(6).await.unwrap();

        let candidate = parse_backup(
            r#"{"inventory":[{"barcode":"9","name":"Jam","quantity":1,"lastUpdated":5}]}"#,
        )
        .unwrap();
        restore_backup(&inventory, &settings, candidate).await.unwrap();

        assert_eq!(settings.threshold(), 6);
        assert_eq!(inventory.lookup("9").unwrap().name, "Jam");
    }
}
