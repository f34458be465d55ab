use serde::{Deserialize, Serialize};

pub const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Products at or below this quantity count as low stock.
    pub threshold: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_LOW_STOCK_THRESHOLD,
        }
    }
}
