use std::collections::BTreeMap;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;

use crate::history::{
    bucket::bucket_start,
    config::{AggregationConfig, Granularity, TimeRange},
    reduce::reduce,
};
use crate::models::HistoryEntry;

/// One chart point. `count` is the number of history entries folded into a
/// bucketed point and absent for raw points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesPoint {
    pub timestamp: i64,
    pub value: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// Aggregate a quantity log in the host's local time zone.
pub fn aggregate(
    history: &[HistoryEntry],
    config: &AggregationConfig,
    now: DateTime<Utc>,
) -> Vec<SeriesPoint> {
    aggregate_in(history, config, now, &Local)
}

pub fn aggregate_in<Tz: TimeZone>(
    history: &[HistoryEntry],
    config: &AggregationConfig,
    now: DateTime<Utc>,
    tz: &Tz,
) -> Vec<SeriesPoint> {
    // Step 1: Range filter, sorted ascending (stable for equal timestamps)
    let entries = filter_range(history, config.range, now);
    if entries.is_empty() {
        return Vec::new();
    }

    // Step 2: Raw series needs no grouping
    if config.granularity == Granularity::None {
        return entries
            .into_iter()
            .map(|entry| SeriesPoint {
                timestamp: entry.timestamp,
                value: u64::from(entry.quantity),
                count: None,
            })
            .collect();
    }

    // Step 3: Group by local calendar bucket
    let mut buckets: BTreeMap<i64, Vec<u32>> = BTreeMap::new();
    for entry in &entries {
        buckets
            .entry(bucket_start(entry.timestamp, config.granularity, tz))
            .or_default()
            .push(entry.quantity);
    }

    // Step 4: Reduce each bucket
    buckets
        .into_iter()
        .map(|(start, values)| SeriesPoint {
            timestamp: start,
            value: reduce(&values, config.method),
            count: Some(values.len()),
        })
        .collect()
}

/// Entries with `timestamp >= now - window`, ascending by timestamp.
pub fn filter_range(history: &[HistoryEntry], range: TimeRange, now: DateTime<Utc>) -> Vec<HistoryEntry> {
    let cutoff = range
        .window()
        .map(|window| (now - window).timestamp_millis());

    let mut entries: Vec<HistoryEntry> = history
        .iter()
        .copied()
        .filter(|entry| cutoff.map_or(true, |cutoff| entry.timestamp >= cutoff))
        .collect();
    entries.sort_by_key(|entry| entry.timestamp);
    entries
}
