use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use sysinfo::System;

use super::camera::VideoConstraints;

/// Host clipboard access.
pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<()>;
}

/// Support snapshot of the scanner state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub timestamp: DateTime<Utc>,
    pub user_agent: String,
    pub native_detector_available: bool,
    /// `None` until a session has probed the decoder.
    pub software_decoder_available: Option<bool>,
    pub selected_device_id: Option<String>,
    pub attempts: u32,
    pub last_result: Option<String>,
    pub consecutive_failures: u32,
    pub video_constraints: Option<VideoConstraints>,
}

/// `stockscan/<version> (<os> <version>; kernel <kernel>; <arch>)`
pub fn platform_descriptor() -> String {
    let os = System::name().unwrap_or_else(|| "unknown".into());
    let os_version = System::os_version().unwrap_or_default();
    let kernel = System::kernel_version().unwrap_or_else(|| "unknown".into());
    format!(
        "{}/{} ({} {}; kernel {}; {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        os,
        os_version,
        kernel,
        std::env::consts::ARCH
    )
}

pub fn diagnostics_file_name(timestamp: DateTime<Utc>) -> String {
    format!(
        "scanner_diagnostics_{}.json",
        timestamp.format("%Y-%m-%dT%H-%M-%S")
    )
}

/// Serialize `report`, offer it to the clipboard, and write it into `dir`.
/// Clipboard failures are logged and do not fail the export.
pub async fn export_report(
    report: &DiagnosticsReport,
    dir: &Path,
    clipboard: Option<&dyn Clipboard>,
) -> Result<PathBuf> {
    let contents =
        serde_json::to_string_pretty(report).context("failed to serialize diagnostics")?;

    if let Some(clipboard) = clipboard {
        if let Err(err) = clipboard.write_text(&contents) {
            warn!("Failed to copy diagnostics to clipboard: {err:#}");
        }
    }

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create diagnostics directory {}", dir.display()))?;
    let path = dir.join(diagnostics_file_name(report.timestamp));
    tokio::fs::write(&path, contents)
        .await
        .with_context(|| format!("failed to write diagnostics {}", path.display()))?;

    info!("Scanner diagnostics written to {}", path.display());
    Ok(path)
}
