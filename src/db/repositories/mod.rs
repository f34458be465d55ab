pub mod documents;

pub use documents::{DEVICE_KEY, INVENTORY_KEY, SETTINGS_KEY};
