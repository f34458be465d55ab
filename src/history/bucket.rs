//! Calendar bucketing in a caller-supplied time zone.

use chrono::{DateTime, Datelike, LocalResult, NaiveDate, Offset, TimeZone};

use super::config::Granularity;

/// Start of the local calendar bucket containing `timestamp_ms`, in epoch
/// milliseconds. Returns the timestamp unchanged for [`Granularity::None`].
pub fn bucket_start<Tz: TimeZone>(timestamp_ms: i64, granularity: Granularity, tz: &Tz) -> i64 {
    let Some(local) = to_local(timestamp_ms, tz) else {
        return timestamp_ms;
    };

    let date = local.date_naive();
    let start = match granularity {
        Granularity::None => return timestamp_ms,
        Granularity::Daily => Some(date),
        Granularity::Monthly => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
        Granularity::Quarterly => {
            NaiveDate::from_ymd_opt(date.year(), quarter_first_month(date.month()), 1)
        }
        Granularity::Yearly => NaiveDate::from_ymd_opt(date.year(), 1, 1),
    };

    let Some(midnight) = start.and_then(|d| d.and_hms_opt(0, 0, 0)) else {
        return timestamp_ms;
    };

    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.timestamp_millis(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp_millis(),
        // Midnight skipped by a DST jump: reuse the entry's own offset.
        LocalResult::None => {
            let offset_ms = i64::from(local.offset().fix().local_minus_utc()) * 1000;
            midnight.and_utc().timestamp_millis() - offset_ms
        }
    }
}

/// Axis label for a point produced at `granularity`.
pub fn bucket_label<Tz: TimeZone>(timestamp_ms: i64, granularity: Granularity, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let Some(local) = to_local(timestamp_ms, tz) else {
        return timestamp_ms.to_string();
    };

    match granularity {
        Granularity::None => local.format("%Y-%m-%d %H:%M").to_string(),
        Granularity::Daily => local.format("%Y-%m-%d").to_string(),
        Granularity::Monthly => local.format("%Y-%m").to_string(),
        Granularity::Quarterly => format!("Q{} {}", local.month0() / 3 + 1, local.year()),
        Granularity::Yearly => local.format("%Y").to_string(),
    }
}

fn to_local<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> Option<DateTime<Tz>> {
    tz.timestamp_millis_opt(timestamp_ms).single()
}

fn quarter_first_month(month: u32) -> u32 {
    ((month - 1) / 3) * 3 + 1
}
