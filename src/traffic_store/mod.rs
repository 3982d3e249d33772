// File-per-day traffic store. Each calendar day (local time) is one JSON file,
// `traffic_<YYYY-MM-DD>.json`, holding every sample of that day plus aggregates
// recomputed on each append. Week and month rollups are derived at read time.
//
// Appends are read-modify-write without locking: there must be a single writer
// per data directory. Writes go through a temp file + rename so readers never
// observe a partially written bucket.

pub mod rollup;

use crate::error::{Result, TrafficError};
use crate::models::{DayBucket, MonthRollup, RateSample, WeekRollup};
use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::instrument;

const FILE_PREFIX: &str = "traffic_";
const FILE_EXT: &str = ".json";
const TMP_SUFFIX: &str = ".tmp";
const CORRUPT_MARKER: &str = ".corrupt-";

/// Outcome of a retention pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Day buckets deleted.
    pub removed: usize,
    /// Stale temp files and set-aside corrupt buckets deleted.
    pub leftovers_removed: usize,
    pub failed: usize,
}

pub struct TrafficStore {
    data_dir: PathBuf,
}

impl TrafficStore {
    /// Opens a store rooted at `data_dir`, creating the directory if absent.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn day_path(&self, date: NaiveDate) -> PathBuf {
        self.data_dir.join(day_file_name(date))
    }

    /// Appends one sample to the bucket of its (local) day.
    pub fn append(&self, sample: &RateSample) -> Result<()> {
        self.append_batch(std::slice::from_ref(sample)).map(|_| ())
    }

    /// Appends samples in order, one read-modify-write per day touched.
    /// Returns the number of samples written.
    #[instrument(skip(self, samples), fields(store = "traffic", operation = "append_batch", samples_count = samples.len()))]
    pub fn append_batch(&self, samples: &[RateSample]) -> Result<usize> {
        if samples.is_empty() {
            return Ok(0);
        }
        let mut by_day: BTreeMap<NaiveDate, Vec<&RateSample>> = BTreeMap::new();
        for s in samples {
            by_day.entry(local_date(s.timestamp)).or_default().push(s);
        }

        for (date, day_samples) in by_day {
            let mut bucket = self.load_for_append(date)?;
            bucket.records.extend(day_samples.into_iter().cloned());
            rollup::recompute_day(&mut bucket);
            self.write_day(&bucket)?;
        }
        Ok(samples.len())
    }

    /// Loads the bucket for `date`; `Ok(None)` when no data exists for that day.
    pub fn get_day(&self, date: NaiveDate) -> Result<Option<DayBucket>> {
        let bytes = match std::fs::read(self.day_path(date)) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let bucket: DayBucket = serde_json::from_slice(&bytes)?;
        Ok(Some(bucket))
    }

    /// Rollup of the ISO week (Monday to Sunday). Missing days count as empty.
    #[instrument(skip(self), fields(store = "traffic", operation = "get_week"))]
    pub fn get_week(&self, iso_year: i32, iso_week: u32) -> Result<WeekRollup> {
        let (start, end) = rollup::iso_week_bounds(iso_year, iso_week)?;
        let days = self.days_in_range(start, end)?;
        Ok(rollup::week_rollup(iso_year, iso_week, start, end, days))
    }

    /// Rollup of a calendar month plus every ISO week overlapping it.
    #[instrument(skip(self), fields(store = "traffic", operation = "get_month"))]
    pub fn get_month(&self, year: i32, month: u32) -> Result<MonthRollup> {
        let (start, end) = rollup::month_bounds(year, month)?;
        let days = self.days_in_range(start, end)?;
        let mut weeks = Vec::new();
        for (iso_year, iso_week) in rollup::iso_weeks_overlapping(start, end) {
            weeks.push(self.get_week(iso_year, iso_week)?);
        }
        Ok(rollup::month_rollup(year, month, days, weeks))
    }

    /// Up to `n` most recent existing day buckets, from today back, ascending by date.
    pub fn get_recent(&self, n: u32) -> Result<Vec<DayBucket>> {
        self.get_recent_from(Local::now().date_naive(), n)
    }

    pub fn get_recent_from(&self, today: NaiveDate, n: u32) -> Result<Vec<DayBucket>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let start = today
            .checked_sub_days(Days::new(u64::from(n - 1)))
            .unwrap_or(NaiveDate::MIN);
        self.days_in_range(start, today)
    }

    /// Dates that have a persisted bucket, ascending.
    pub fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        let mut dates = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(date) = entry.file_name().to_str().and_then(parse_day_file_name) {
                dates.push(date);
            }
        }
        dates.sort_unstable();
        Ok(dates)
    }

    /// Keeps the `retention_days` most recent calendar days (today included) and
    /// deletes every older bucket. Today's bucket is never touched, even for 0.
    pub fn prune(&self, retention_days: u32) -> Result<PruneReport> {
        let today = Local::now().date_naive();
        let kept_before_today = u64::from(retention_days.saturating_sub(1));
        let cutoff = today
            .checked_sub_days(Days::new(kept_before_today))
            .unwrap_or(NaiveDate::MIN);
        self.prune_before(cutoff)
    }

    /// Deletes every bucket dated strictly before `cutoff`, along with leftover
    /// temp files and set-aside corrupt buckets of those dates. A file that
    /// cannot be removed is logged and counted; the pass continues.
    #[instrument(skip(self), fields(store = "traffic", operation = "prune"))]
    pub fn prune_before(&self, cutoff: NaiveDate) -> Result<PruneReport> {
        let mut report = PruneReport::default();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let (date, is_bucket) = match parse_day_file_name(name) {
                Some(date) => (date, true),
                None => match parse_day_leftover_name(name) {
                    Some(date) => (date, false),
                    None => continue,
                },
            };
            if date >= cutoff {
                continue;
            }
            let path = entry.path();
            match std::fs::remove_file(&path) {
                Ok(()) if is_bucket => report.removed += 1,
                Ok(()) => report.leftovers_removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), "failed to remove expired day file");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    fn days_in_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DayBucket>> {
        let mut days = Vec::new();
        for date in start.iter_days().take_while(|d| *d <= end) {
            match self.get_day(date) {
                Ok(Some(day)) => days.push(day),
                Ok(None) => {}
                Err(TrafficError::Serialization(e)) => {
                    tracing::warn!(error = %e, date = %date, "skipping unreadable day bucket");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(days)
    }

    /// Existing bucket for `date`, or a fresh one. An unparsable file is moved
    /// aside so sampling can continue.
    fn load_for_append(&self, date: NaiveDate) -> Result<DayBucket> {
        match self.get_day(date) {
            Ok(Some(bucket)) => Ok(bucket),
            Ok(None) => Ok(DayBucket::new(date)),
            Err(TrafficError::Serialization(e)) => {
                let path = self.day_path(date);
                let aside = path.with_extension(format!(
                    "json{CORRUPT_MARKER}{}",
                    Utc::now().timestamp_millis()
                ));
                tracing::warn!(
                    error = %e,
                    path = %path.display(),
                    moved_to = %aside.display(),
                    "corrupt day bucket; starting a new one"
                );
                std::fs::rename(&path, &aside)?;
                Ok(DayBucket::new(date))
            }
            Err(e) => Err(e),
        }
    }

    fn write_day(&self, bucket: &DayBucket) -> Result<()> {
        let path = self.day_path(bucket.date);
        let tmp = path.with_extension(format!("json{TMP_SUFFIX}"));
        let data = serde_json::to_vec_pretty(bucket)?;
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Calendar day (local time) a timestamp belongs to.
pub fn local_date(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Local).date_naive()
}

pub fn day_file_name(date: NaiveDate) -> String {
    format!("{FILE_PREFIX}{}{FILE_EXT}", date.format("%Y-%m-%d"))
}

/// Parses `traffic_<YYYY-MM-DD>.json`; anything else is `None`.
pub fn parse_day_file_name(name: &str) -> Option<NaiveDate> {
    let date = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_EXT)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Parses the date out of a day file's leftovers: an interrupted write
/// (`traffic_<date>.json.tmp`) or a set-aside corrupt bucket
/// (`traffic_<date>.json.corrupt-<millis>`).
pub fn parse_day_leftover_name(name: &str) -> Option<NaiveDate> {
    let (date, suffix) = name.strip_prefix(FILE_PREFIX)?.split_once(FILE_EXT)?;
    if suffix != TMP_SUFFIX && !suffix.starts_with(CORRUPT_MARKER) {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
