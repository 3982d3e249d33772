// Linux disk counters from /proc/diskstats.

use crate::error::Result;
use crate::models::{CounterSnapshot, ResourceClass, ResourceCounters};
use chrono::Utc;
use std::collections::BTreeMap;

const SECTOR_SIZE: u64 = 512;

/// Reads whole-disk counters. `Ok(None)` when /proc/diskstats is not available
/// (non-Linux, or hidden inside a container), so the caller can fall back.
pub(super) fn read_diskstats() -> Result<Option<CounterSnapshot>> {
    #[cfg(target_os = "linux")]
    {
        let content = match std::fs::read_to_string("/proc/diskstats") {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(crate::error::TrafficError::source_unavailable(format!(
                    "/proc/diskstats: {e}"
                )));
            }
        };
        let mut resources = parse_diskstats(&content);
        let sys_block = std::path::Path::new("/sys/block");
        if sys_block.is_dir() {
            resources.retain(|name, _| sys_block.join(name).exists());
        }
        Ok(Some(CounterSnapshot {
            class: ResourceClass::Disk,
            captured_at: Utc::now(),
            resources,
        }))
    }
    #[cfg(not(target_os = "linux"))]
    Ok(None)
}

/// Parses the contents of /proc/diskstats. Loop and RAM devices and malformed
/// lines are skipped.
pub fn parse_diskstats(content: &str) -> BTreeMap<String, ResourceCounters> {
    let mut out = BTreeMap::new();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 14 {
            continue;
        }
        let name = fields[2];
        if name.starts_with("loop") || name.starts_with("ram") {
            continue;
        }
        let num = |i: usize| fields[i].parse::<u64>().ok();
        let (
            Some(reads),
            Some(sectors_read),
            Some(read_ms),
            Some(writes),
            Some(sectors_written),
            Some(write_ms),
            Some(io_ms),
        ) = (num(3), num(5), num(6), num(7), num(9), num(10), num(12))
        else {
            continue;
        };
        out.insert(
            name.to_string(),
            ResourceCounters {
                bytes_in: sectors_read.saturating_mul(SECTOR_SIZE),
                bytes_out: sectors_written.saturating_mul(SECTOR_SIZE),
                ops_in: reads,
                ops_out: writes,
                busy_time_ms: Some(io_ms),
                time_in_ms: Some(read_ms),
                time_out_ms: Some(write_ms),
            },
        );
    }
    out
}
