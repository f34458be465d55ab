use std::{sync::Arc, time::Instant};

use anyhow::{bail, Result};
use chrono::Utc;
use log::{error, info};
use serde::Serialize;
use tokio::sync::{watch, Mutex};

use crate::db::{repositories::INVENTORY_KEY, Database};
use crate::models::Product;

use super::{
    deletion::{DeleteOutcome, DeletionGuard},
    Inventory, NewProduct,
};

/// Where a scanned or typed barcode leads.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "route")]
pub enum ScanRoute {
    Existing { product: Product },
    New { barcode: String },
}

/// Authoritative product catalog. Mutations are serialized through a writer
/// lock, persisted as a whole-document snapshot, then published to subscribers.
#[derive(Clone)]
pub struct InventoryStore {
    db: Database,
    writer: Arc<Mutex<Inventory>>,
    published: Arc<watch::Sender<Arc<Inventory>>>,
    deletion: Arc<Mutex<DeletionGuard>>,
}

impl InventoryStore {
    pub async fn load(db: Database) -> Result<Self> {
        let inventory = match db.get_json::<Inventory>(INVENTORY_KEY).await {
            Ok(Some(inventory)) => inventory,
            Ok(None) => Inventory::default(),
            Err(err) => {
                // Left in storage untouched until the next successful commit.
                error!("Failed to load inventory: {err:#}");
                Inventory::default()
            }
        };

        info!("Inventory loaded with {} products", inventory.len());

        Ok(Self {
            db,
            published: Arc::new(watch::channel(Arc::new(inventory.clone())).0),
            writer: Arc::new(Mutex::new(inventory)),
            deletion: Arc::new(Mutex::new(DeletionGuard::default())),
        })
    }

    pub fn snapshot(&self) -> Arc<Inventory> {
        self.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Inventory>> {
        self.published.subscribe()
    }

    /// Replace the whole catalog with `next`.
    pub async fn commit(&self, next: Inventory) -> Result<()> {
        let mut current = self.writer.lock().await;
        self.persist_and_publish(&mut current, next).await
    }

    pub fn lookup(&self, barcode: &str) -> Option<Product> {
        self.snapshot().get(barcode).cloned()
    }

    pub fn route_scan(&self, barcode: &str) -> ScanRoute {
        let barcode = barcode.trim();
        match self.lookup(barcode) {
            Some(product) => ScanRoute::Existing { product },
            None => ScanRoute::New {
                barcode: barcode.to_string(),
            },
        }
    }

    /// Manual entry: the typed code is trimmed and routed like a scan.
    pub fn submit_manual_barcode(&self, input: &str) -> Result<ScanRoute> {
        let barcode = input.trim();
        if barcode.is_empty() {
            bail!("barcode must not be empty");
        }
        Ok(self.route_scan(barcode))
    }

    pub async fn add_product(&self, new: NewProduct) -> Result<Product> {
        let now = now_ms();
        self.mutate(move |inventory| inventory.insert_new(new, now).cloned())
            .await
    }

    pub async fn update_stock(&self, barcode: &str, delta: i64) -> Result<Product> {
        let now = now_ms();
        self.mutate(|inventory| inventory.apply_delta(barcode, delta, now).cloned())
            .await
    }

    pub async fn rename(&self, barcode: &str, name: String) -> Result<Product> {
        let now = now_ms();
        self.mutate(move |inventory| inventory.rename(barcode, name, now).cloned())
            .await
    }

    /// Two-step delete: the first call arms a confirmation, a second call for
    /// the same barcode within the window removes the product.
    pub async fn delete(&self, barcode: &str) -> Result<DeleteOutcome> {
        if !self.snapshot().contains(barcode) {
            self.deletion.lock().await.clear();
            return Ok(DeleteOutcome::NotFound);
        }

        let confirmed = self.deletion.lock().await.request(barcode, Instant::now());
        if !confirmed {
            return Ok(DeleteOutcome::ConfirmationRequired);
        }

        let removed = self
            .mutate(|inventory| Ok(inventory.remove(barcode)))
            .await?;

        Ok(match removed {
            Some(product) => {
                info!("Deleted product {}", product.barcode);
                DeleteOutcome::Deleted { product }
            }
            None => DeleteOutcome::NotFound,
        })
    }

    async fn mutate<F, T>(&self, apply: F) -> Result<T>
    where
        F: FnOnce(&mut Inventory) -> Result<T>,
    {
        let mut current = self.writer.lock().await;
        let mut next = current.clone();
        let output = apply(&mut next)?;
        self.persist_and_publish(&mut current, next).await?;
        Ok(output)
    }

    async fn persist_and_publish(&self, current: &mut Inventory, next: Inventory) -> Result<()> {
        self.db.put_json(INVENTORY_KEY, &next).await?;
        *current = next.clone();
        self.published.send_replace(Arc::new(next));
        Ok(())
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
