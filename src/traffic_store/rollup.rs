// Pure aggregation: day aggregates from the record list, and week/month rollups
// from day buckets. File access stays in traffic_store::mod.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::error::{Result, TrafficError};
use crate::models::{DayBucket, MonthRollup, RateSample, WeekRollup};

#[derive(Default)]
struct ResourceDay {
    bytes_in: u64,
    bytes_out: u64,
    peak_in: f64,
    peak_out: f64,
    rate_in_sum: f64,
    rate_out_sum: f64,
    samples: u32,
}

/// Recomputes every derived field of `bucket` from `bucket.records`.
///
/// Records carry cumulative counters, so the largest value seen per resource
/// stands in for that resource's daily total. Day totals sum those maxima;
/// peaks are the largest per-sample rate of any resource. The average is the
/// sum over resources of each resource's mean sampled rate.
pub fn recompute_day(bucket: &mut DayBucket) {
    let per_resource = fold_records(&bucket.records);

    bucket.total_bytes_in = 0;
    bucket.total_bytes_out = 0;
    bucket.peak_rate_in = 0.0;
    bucket.peak_rate_out = 0.0;
    bucket.avg_rate_in = 0.0;
    bucket.avg_rate_out = 0.0;
    bucket.summary.clear();

    for (name, r) in per_resource {
        bucket.total_bytes_in = bucket.total_bytes_in.saturating_add(r.bytes_in);
        bucket.total_bytes_out = bucket.total_bytes_out.saturating_add(r.bytes_out);
        bucket.peak_rate_in = bucket.peak_rate_in.max(r.peak_in);
        bucket.peak_rate_out = bucket.peak_rate_out.max(r.peak_out);
        if r.samples > 0 {
            bucket.avg_rate_in += r.rate_in_sum / r.samples as f64;
            bucket.avg_rate_out += r.rate_out_sum / r.samples as f64;
        }
        bucket.summary.insert(format!("{name}_in"), r.bytes_in);
        bucket.summary.insert(format!("{name}_out"), r.bytes_out);
    }
}

fn fold_records(records: &[RateSample]) -> BTreeMap<&str, ResourceDay> {
    let mut out: BTreeMap<&str, ResourceDay> = BTreeMap::new();
    for record in records {
        let r = out.entry(record.resource.as_str()).or_default();
        r.bytes_in = r.bytes_in.max(record.bytes_in);
        r.bytes_out = r.bytes_out.max(record.bytes_out);
        r.peak_in = r.peak_in.max(record.rate_in);
        r.peak_out = r.peak_out.max(record.rate_out);
        r.rate_in_sum += record.rate_in;
        r.rate_out_sum += record.rate_out;
        r.samples += 1;
    }
    out
}

/// Monday and Sunday of an ISO-8601 week.
pub fn iso_week_bounds(iso_year: i32, iso_week: u32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_isoywd_opt(iso_year, iso_week, Weekday::Mon).ok_or_else(|| {
        TrafficError::invalid_period(format!("ISO week {iso_year}-W{iso_week:02} does not exist"))
    })?;
    let end = start
        .checked_add_days(Days::new(6))
        .ok_or_else(|| TrafficError::invalid_period("week end out of range"))?;
    Ok((start, end))
}

/// First and last day of a calendar month.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| TrafficError::invalid_period(format!("month {year}-{month:02} does not exist")))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let end = next
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| TrafficError::invalid_period("month end out of range"))?;
    Ok((start, end))
}

/// Every (ISO year, ISO week) that has at least one day inside the month, in order.
/// Weeks straddling the month boundary are included.
pub fn iso_weeks_overlapping(start: NaiveDate, end: NaiveDate) -> Vec<(i32, u32)> {
    let mut weeks = Vec::new();
    for day in start.iter_days().take_while(|d| *d <= end) {
        let w = day.iso_week();
        let key = (w.year(), w.week());
        if weeks.last() != Some(&key) {
            weeks.push(key);
        }
    }
    weeks
}

struct Totals {
    bytes_in: u64,
    bytes_out: u64,
    summary: BTreeMap<String, u64>,
}

fn sum_days(days: &[DayBucket]) -> Totals {
    let mut summary: HashMap<&str, u64> = HashMap::new();
    let mut bytes_in = 0u64;
    let mut bytes_out = 0u64;
    for day in days {
        bytes_in = bytes_in.saturating_add(day.total_bytes_in);
        bytes_out = bytes_out.saturating_add(day.total_bytes_out);
        for (key, value) in &day.summary {
            let slot = summary.entry(key.as_str()).or_default();
            *slot = slot.saturating_add(*value);
        }
    }
    Totals {
        bytes_in,
        bytes_out,
        summary: summary.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
    }
}

/// Builds a week rollup from whichever of its days exist. `days` must be ascending.
pub fn week_rollup(
    iso_year: i32,
    iso_week: u32,
    start_date: NaiveDate,
    end_date: NaiveDate,
    days: Vec<DayBucket>,
) -> WeekRollup {
    let totals = sum_days(&days);
    WeekRollup {
        week: format!("{iso_year}-W{iso_week:02}"),
        iso_year,
        iso_week,
        start_date,
        end_date,
        total_bytes_in: totals.bytes_in,
        total_bytes_out: totals.bytes_out,
        days,
        summary: totals.summary,
    }
}

/// Builds a month rollup. Totals come from the month's own days only; `weeks`
/// may reach into neighbouring months.
pub fn month_rollup(year: i32, month: u32, days: Vec<DayBucket>, weeks: Vec<WeekRollup>) -> MonthRollup {
    let totals = sum_days(&days);
    MonthRollup {
        month: format!("{year}-{month:02}"),
        year,
        month_number: month,
        total_bytes_in: totals.bytes_in,
        total_bytes_out: totals.bytes_out,
        weeks,
        days,
        summary: totals.summary,
    }
}
