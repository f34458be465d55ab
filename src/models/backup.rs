use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Product, Settings};

/// Unit of export/import. Restoring one replaces the catalog and settings wholesale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupDocument {
    pub timestamp: DateTime<Utc>,
    pub inventory: Vec<Product>,
    pub settings: Settings,
}
