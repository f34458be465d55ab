use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};

use crate::db::Database;

/// Storage key for the product catalog snapshot.
pub const INVENTORY_KEY: &str = "stock_inventory";
/// Storage key for the settings snapshot.
pub const SETTINGS_KEY: &str = "stock_settings";
/// Storage key for the last explicitly chosen camera.
pub const DEVICE_KEY: &str = "scanner_device_id";

impl Database {
    /// Raw stored value for `key`, if any.
    pub async fn get_document(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.query_row(
                "SELECT value FROM documents WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .with_context(|| format!("failed to read document {key}"))
        })
        .await
    }

    pub async fn put_document(&self, key: &str, value: String) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO documents (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to write document {key}"))?;
            Ok(())
        })
        .await
    }

    pub async fn delete_document(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM documents WHERE key = ?1", params![key])
                .with_context(|| format!("failed to delete document {key}"))?;
            Ok(())
        })
        .await
    }

    /// Serialize `value` as JSON and store it under `key`.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let serialized = serde_json::to_string(value)
            .with_context(|| format!("failed to serialize document {key}"))?;
        self.put_document(key, serialized).await
    }

    /// Load and parse the JSON document under `key`. A missing document is `Ok(None)`;
    /// a malformed one is an error so callers can decide whether to fall back.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get_document(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .with_context(|| format!("stored document {key} is malformed")),
            None => Ok(None),
        }
    }
}
