// Shared test helpers

#![allow(dead_code)]

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use trafficmon::models::*;

/// Noon local time on `date`, as UTC. Noon keeps DST transitions out of the way.
pub fn local_noon(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_hms_opt(12, 0, 0).unwrap();
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap()
        .with_timezone(&Utc)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn counters(bytes_in: u64, bytes_out: u64) -> ResourceCounters {
    ResourceCounters {
        bytes_in,
        bytes_out,
        ..Default::default()
    }
}

pub fn net_snapshot(at: DateTime<Utc>, resources: &[(&str, u64, u64)]) -> CounterSnapshot {
    let mut s = CounterSnapshot::new(ResourceClass::Network, at);
    for (name, bytes_in, bytes_out) in resources {
        s = s.with_resource(*name, counters(*bytes_in, *bytes_out));
    }
    s
}

pub fn at_secs(base: DateTime<Utc>, secs: f64) -> DateTime<Utc> {
    base + Duration::milliseconds((secs * 1000.0) as i64)
}

/// A sample with cumulative bytes and rates set; everything else zero.
pub fn sample(
    ts: DateTime<Utc>,
    resource: &str,
    bytes_in: u64,
    bytes_out: u64,
    rate_in: f64,
    rate_out: f64,
) -> RateSample {
    RateSample {
        timestamp: ts,
        resource: resource.to_string(),
        class: ResourceClass::Network,
        bytes_in,
        bytes_out,
        ops_in: 0,
        ops_out: 0,
        rate_in,
        rate_out,
        ops_rate_in: 0.0,
        ops_rate_out: 0.0,
        utilization_percent: None,
        latency_in_ms: None,
        latency_out_ms: None,
    }
}
