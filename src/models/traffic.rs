// Rate samples and the persisted / derived time-bucket models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ResourceClass;

/// One resource's throughput for one sampling tick. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    pub timestamp: DateTime<Utc>,
    pub resource: String,
    pub class: ResourceClass,
    /// Cumulative counters at the time of the sample.
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub ops_in: u64,
    pub ops_out: u64,
    /// Bytes per second.
    pub rate_in: f64,
    pub rate_out: f64,
    /// Packets (network) or IOPS (disk) per second.
    pub ops_rate_in: f64,
    pub ops_rate_out: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_in_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_out_ms: Option<f64>,
}

/// The unit of persistence: every sample of one calendar day plus aggregates
/// derived from them. Aggregates are only ever written by
/// `traffic_store::rollup::recompute_day`, always over the full record list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub total_bytes_in: u64,
    pub total_bytes_out: u64,
    pub peak_rate_in: f64,
    pub peak_rate_out: f64,
    pub avg_rate_in: f64,
    pub avg_rate_out: f64,
    pub records: Vec<RateSample>,
    /// `<resource>_in` / `<resource>_out` -> cumulative bytes.
    pub summary: BTreeMap<String, u64>,
}

impl DayBucket {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            total_bytes_in: 0,
            total_bytes_out: 0,
            peak_rate_in: 0.0,
            peak_rate_out: 0.0,
            avg_rate_in: 0.0,
            avg_rate_out: 0.0,
            records: Vec::new(),
            summary: BTreeMap::new(),
        }
    }

    pub fn resources(&self) -> impl Iterator<Item = &str> {
        let mut names: Vec<&str> = self.records.iter().map(|r| r.resource.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names.into_iter()
    }
}

/// Sum of the day buckets covering one ISO-8601 week (Monday to Sunday).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekRollup {
    /// `YYYY-Www`.
    pub week: String,
    pub iso_year: i32,
    pub iso_week: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_bytes_in: u64,
    pub total_bytes_out: u64,
    pub days: Vec<DayBucket>,
    pub summary: BTreeMap<String, u64>,
}

/// Sum of the day buckets of one calendar month, plus every ISO week that
/// overlaps the month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthRollup {
    /// `YYYY-MM`.
    pub month: String,
    pub year: i32,
    pub month_number: u32,
    pub total_bytes_in: u64,
    pub total_bytes_out: u64,
    pub weeks: Vec<WeekRollup>,
    pub days: Vec<DayBucket>,
    pub summary: BTreeMap<String, u64>,
}
