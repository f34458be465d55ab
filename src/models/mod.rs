pub mod backup;
pub mod product;
pub mod settings;

pub use backup::BackupDocument;
pub use product::{HistoryEntry, Product};
pub use settings::{Settings, DEFAULT_LOW_STOCK_THRESHOLD};
