use std::path::PathBuf;

use crate::{
    inventory::ScanRoute,
    scanner::{controller::TorchState, ScanStatus, ScannerController, VideoDevice},
    AppState,
};

fn controller_from_state(state: &AppState) -> ScannerController {
    state.scanner.clone()
}

pub async fn list_cameras(state: &AppState) -> Result<Vec<VideoDevice>, String> {
    Ok(controller_from_state(state).mount().await)
}

/// Run one scan session and route the decoded barcode. `None` when the
/// session was cancelled before anything was read.
pub async fn scan_once(state: &AppState) -> Result<Option<ScanRoute>, String> {
    let session = controller_from_state(state)
        .start_session()
        .await
        .map_err(|e| format!("{e:#}"))?;

    Ok(session
        .wait()
        .await
        .map(|hit| state.inventory.route_scan(&hit.text)))
}

pub async fn cancel_scan(state: &AppState) -> Result<(), String> {
    controller_from_state(state).cancel_session().await;
    Ok(())
}

pub async fn close_scanner(state: &AppState) -> Result<(), String> {
    controller_from_state(state).unmount().await;
    Ok(())
}

pub async fn select_camera(state: &AppState, device_id: Option<String>) -> Result<(), String> {
    controller_from_state(state)
        .select_device(device_id)
        .await
        .map_err(|e| format!("{e:#}"))
}

pub async fn set_torch(state: &AppState, on: bool) -> Result<TorchState, String> {
    Ok(controller_from_state(state).set_torch(on).await)
}

pub async fn toggle_torch(state: &AppState) -> Result<TorchState, String> {
    Ok(controller_from_state(state).toggle_torch().await)
}

pub async fn get_scanner_status(state: &AppState) -> Result<ScanStatus, String> {
    Ok(controller_from_state(state).status().await)
}

pub async fn export_scanner_diagnostics(state: &AppState) -> Result<PathBuf, String> {
    controller_from_state(state)
        .export_diagnostics(&state.export_dir, None)
        .await
        .map_err(|e| e.to_string())
}
