use std::path::PathBuf;

const DATA_DIR_VAR: &str = "STOCKSCAN_DATA_DIR";
const DEBUG_VAR: &str = "STOCKSCAN_DEBUG";
const DEFAULT_DATA_DIR: &str = "stockscan-data";

/// Process-level configuration read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Holds the database.
    pub data_dir: PathBuf,
    /// Backups and diagnostics are written here.
    pub export_dir: PathBuf,
    pub debug: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup(DATA_DIR_VAR)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let debug = lookup(DEBUG_VAR)
            .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true"))
            .unwrap_or(false);

        Self {
            export_dir: data_dir.join("exports"),
            data_dir,
            debug,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("stockscan.sqlite3")
    }
}
