use chrono::{Local, Utc};
use serde::Serialize;

use crate::{
    history::{aggregate, bucket_label, AggregationConfig, SeriesPoint},
    AppState,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    #[serde(flatten)]
    pub point: SeriesPoint,
    pub label: String,
}

pub async fn get_product_history(
    state: &AppState,
    barcode: String,
    config: Option<AggregationConfig>,
) -> Result<Vec<ChartPoint>, String> {
    let product = state
        .inventory
        .lookup(barcode.trim())
        .ok_or_else(|| format!("unknown product {}", barcode.trim()))?;
    let config = config.unwrap_or_default();

    Ok(aggregate(&product.history, &config, Utc::now())
        .into_iter()
        .map(|point| ChartPoint {
            label: bucket_label(point.timestamp, config.granularity, &Local),
            point,
        })
        .collect())
}
