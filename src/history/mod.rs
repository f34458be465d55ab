//! Turns a product's quantity log into chart series.

pub mod algorithm;
pub mod bucket;
pub mod commands;
pub mod config;
pub mod reduce;

pub use algorithm::{aggregate, aggregate_in, SeriesPoint};
pub use bucket::bucket_label;
pub use config::{AggregationConfig, Granularity, Reduction, TimeRange};
