//! Product catalog data model.
//!
//! A product is keyed by its barcode and carries an append-only log of
//! quantity changes. `quantity` always mirrors the last history entry.

use serde::{Deserialize, Serialize};

/// One recorded stock level: the quantity right after a change, at `timestamp`
/// (epoch milliseconds).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub barcode: String,
    pub name: String,
    pub quantity: u32,
    pub last_updated: i64,
    /// Older documents predate history tracking.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl Product {
    pub fn new(barcode: String, name: String, quantity: u32, now_ms: i64) -> Self {
        Self {
            barcode,
            name,
            quantity,
            last_updated: now_ms,
            history: vec![HistoryEntry {
                timestamp: now_ms,
                quantity,
            }],
        }
    }

    /// Apply a signed stock delta, flooring at zero, and record the resulting level.
    pub fn apply_delta(&mut self, delta: i64, now_ms: i64) -> u32 {
        let next = i64::from(self.quantity)
            .saturating_add(delta)
            .clamp(0, i64::from(u32::MAX));
        self.quantity = next as u32;
        self.last_updated = now_ms;
        self.history.push(HistoryEntry {
            timestamp: now_ms,
            quantity: self.quantity,
        });
        self.quantity
    }

    pub fn rename(&mut self, name: String, now_ms: i64) {
        self.name = name;
        self.last_updated = now_ms;
    }

    pub fn is_low_stock(&self, threshold: u32) -> bool {
        self.quantity <= threshold
    }
}
