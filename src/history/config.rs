use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Lookback window applied before bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeRange {
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "1m")]
    Month,
    #[serde(rename = "3m")]
    Quarter,
    #[serde(rename = "1y")]
    Year,
    #[default]
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    /// `None` means unbounded.
    pub fn window(self) -> Option<Duration> {
        match self {
            TimeRange::Week => Some(Duration::days(7)),
            TimeRange::Month => Some(Duration::days(30)),
            TimeRange::Quarter => Some(Duration::days(90)),
            TimeRange::Year => Some(Duration::days(365)),
            TimeRange::All => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One point per history entry.
    #[default]
    None,
    Daily,
    Monthly,
    Quarterly,
    Yearly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Reduction {
    #[default]
    Average,
    Median,
    Sum,
    Max,
}

/// Chart query for one product's quantity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AggregationConfig {
    pub range: TimeRange,
    pub granularity: Granularity,
    pub method: Reduction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        let config: AggregationConfig =
            serde_json::from_str(r#"{"range":"3m","granularity":"quarterly","method":"median"}"#)
                .unwrap();
        assert_eq!(config.range, TimeRange::Quarter);
        assert_eq!(config.granularity, Granularity::Quarterly);
        assert_eq!(config.method, Reduction::Median);

        let defaults: AggregationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults, AggregationConfig::default());
        assert_eq!(defaults.range, TimeRange::All);
    }
}
