use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};
use tokio::sync::watch;

use crate::db::{
    repositories::{DEVICE_KEY, SETTINGS_KEY},
    Database,
};
use crate::models::Settings;

/// Process-wide settings plus the remembered camera. Every change is written
/// through to storage before it becomes visible to subscribers.
#[derive(Clone)]
pub struct SettingsStore {
    db: Database,
    data: Arc<watch::Sender<Settings>>,
    device: Arc<watch::Sender<Option<String>>>,
}

impl SettingsStore {
    pub async fn load(db: Database) -> Result<Self> {
        let settings = match db.get_document(SETTINGS_KEY).await? {
            Some(raw) => parse_settings(&raw).unwrap_or_else(|| {
                warn!("Stored settings are malformed; using defaults");
                Settings::default()
            }),
            None => Settings::default(),
        };

        let device = db
            .get_document(DEVICE_KEY)
            .await?
            .filter(|id| !id.trim().is_empty());

        info!(
            "Settings loaded (threshold={}, remembered camera={})",
            settings.threshold,
            device.as_deref().unwrap_or("auto")
        );

        Ok(Self {
            db,
            data: Arc::new(watch::channel(settings).0),
            device: Arc::new(watch::channel(device).0),
        })
    }

    pub fn settings(&self) -> Settings {
        *self.data.borrow()
    }

    pub fn threshold(&self) -> u32 {
        self.data.borrow().threshold
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.data.subscribe()
    }

    pub async fn update_threshold(&self, threshold: u32) -> Result<()> {
        self.replace(Settings { threshold }).await
    }

    /// Persist and publish a whole settings record.
    pub async fn replace(&self, settings: Settings) -> Result<()> {
        self.db.put_json(SETTINGS_KEY, &settings).await?;
        self.data.send_replace(settings);
        Ok(())
    }

    pub fn selected_device(&self) -> Option<String> {
        self.device.borrow().clone()
    }

    /// Remember an explicit camera choice; `None` (or a blank id) returns to
    /// automatic selection and forgets the stored id.
    pub async fn remember_device(&self, device_id: Option<String>) -> Result<()> {
        match device_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => {
                self.db.put_document(DEVICE_KEY, id.clone()).await?;
                self.device.send_replace(Some(id));
            }
            None => {
                self.db.delete_document(DEVICE_KEY).await?;
                self.device.send_replace(None);
            }
        }
        Ok(())
    }
}

/// Accept only documents whose `threshold` is a non-negative integer.
fn parse_settings(raw: &str) -> Option<Settings> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let threshold = value.get("threshold")?.as_u64()?;
    Some(Settings {
        threshold: u32::try_from(threshold).ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_LOW_STOCK_THRESHOLD;

    async fn open_store(dir: &tempfile::TempDir) -> SettingsStore {
        let db = Database::new(dir.path().join("stockscan.sqlite3")).unwrap();
        SettingsStore::load(db).await.unwrap()
    }

    #[tokio::test]
    async fn defaults_when_nothing_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        assert_eq!(store.threshold(), DEFAULT_LOW_STOCK_THRESHOLD);
        assert_eq!(store.selected_device(), None);
    }

    #[tokio::test]
    async fn threshold_persists_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let mut rx = store.subscribe();

        store.update_threshold(9).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().threshold, 9);

        drop(store);
        let reopened = open_store(&dir).await;
        assert_eq!(reopened.threshold(), 9);
    }

    #[tokio::test]
    async fn malformed_settings_fall_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("stockscan.sqlite3")).unwrap();
        db.put_document(SETTINGS_KEY, r#"{"threshold":"lots"}"#.into())
            .await
            .unwrap();

        let store = SettingsStore::load(db).await.unwrap();
        assert_eq!(store.threshold(), DEFAULT_LOW_STOCK_THRESHOLD);
    }

    #[tokio::test]
    async fn device_selection_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.remember_device(Some("rear-cam".into())).await.unwrap();
        assert_eq!(store.selected_device().as_deref(), Some("rear-cam"));

        let reopened = open_store(&dir).await;
        assert_eq!(reopened.selected_device().as_deref(), Some("rear-cam"));

        reopened.remember_device(None).await.unwrap();
        assert_eq!(reopened.selected_device(), None);
        let again = open_store(&dir).await;
        assert_eq!(again.selected_device(), None);
    }
}
