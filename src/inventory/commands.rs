use std::path::PathBuf;

use crate::{
    inventory::{
        backup, dashboard, DashboardSummary, DeleteOutcome, ImportPreview, InventoryStore,
        NewProduct, ScanRoute,
    },
    models::{Product, Settings},
    AppState,
};

fn store_from_state(state: &AppState) -> InventoryStore {
    state.inventory.clone()
}

pub async fn list_products(state: &AppState) -> Result<Vec<Product>, String> {
    let snapshot = store_from_state(state).snapshot();
    Ok(snapshot.by_recency().into_iter().cloned().collect())
}

pub async fn get_product(state: &AppState, barcode: String) -> Result<Option<Product>, String> {
    Ok(store_from_state(state).lookup(barcode.trim()))
}

pub async fn route_scanned_barcode(state: &AppState, barcode: String) -> Result<ScanRoute, String> {
    Ok(store_from_state(state).route_scan(&barcode))
}

pub async fn submit_manual_barcode(state: &AppState, input: String) -> Result<ScanRoute, String> {
    store_from_state(state)
        .submit_manual_barcode(&input)
        .map_err(|e| e.to_string())
}

pub async fn add_product(state: &AppState, input: NewProduct) -> Result<Product, String> {
    store_from_state(state)
        .add_product(input)
        .await
        .map_err(|e| e.to_string())
}

pub async fn update_stock(state: &AppState, barcode: String, delta: i64) -> Result<Product, String> {
    store_from_state(state)
        .update_stock(&barcode, delta)
        .await
        .map_err(|e| e.to_string())
}

pub async fn rename_product(
    state: &AppState,
    barcode: String,
    name: String,
) -> Result<Product, String> {
    if name.trim().is_empty() {
        return Err("product name must not be empty".into());
    }
    store_from_state(state)
        .rename(&barcode, name)
        .await
        .map_err(|e| e.to_string())
}

pub async fn delete_product(state: &AppState, barcode: String) -> Result<DeleteOutcome, String> {
    store_from_state(state)
        .delete(&barcode)
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_dashboard(state: &AppState) -> Result<DashboardSummary, String> {
    let snapshot = store_from_state(state).snapshot();
    Ok(dashboard::summarize(&snapshot, state.settings.threshold()))
}

pub async fn get_settings(state: &AppState) -> Result<Settings, String> {
    Ok(state.settings.settings())
}

pub async fn set_low_stock_threshold(state: &AppState, threshold: u32) -> Result<(), String> {
    state
        .settings
        .update_threshold(threshold)
        .await
        .map_err(|e| e.to_string())
}

pub async fn export_backup(state: &AppState) -> Result<PathBuf, String> {
    backup::export_backup(&state.inventory, &state.settings, &state.export_dir)
        .await
        .map_err(|e| e.to_string())
}

/// Parse a backup and report what a restore would replace. Nothing is applied.
pub async fn preview_import(state: &AppState, path: PathBuf) -> Result<ImportPreview, String> {
    let candidate = backup::read_backup(&path).await.map_err(|e| e.to_string())?;
    Ok(candidate.preview(&state.inventory.snapshot()))
}

pub async fn confirm_import(state: &AppState, path: PathBuf) -> Result<(), String> {
    let candidate = backup::read_backup(&path).await.map_err(|e| e.to_string())?;
    backup::restore_backup(&state.inventory, &state.settings, candidate)
        .await
        .map_err(|e| e.to_string())
}
