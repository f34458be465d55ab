pub mod backup;
pub mod catalog;
pub mod commands;
pub mod dashboard;
pub mod deletion;
mod store;

pub use backup::{ImportCandidate, ImportPreview};
pub use catalog::{Inventory, NewProduct};
pub use dashboard::{DashboardSummary, InventoryStats, TopProduct};
pub use deletion::DeleteOutcome;
pub use store::{InventoryStore, ScanRoute};
