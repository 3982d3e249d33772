// Model tests: JSON field names, counter snapshot helpers, /proc/diskstats parsing, formatting

mod common;

use common::*;
use std::str::FromStr;
use trafficmon::counter_source::parse_diskstats;
use trafficmon::format::{format_bytes, format_rate};
use trafficmon::models::*;

#[test]
fn test_day_bucket_json_field_names() {
    let mut day = DayBucket::new(date(2026, 5, 4));
    day.records.push(sample(local_noon(day.date), "eth0", 1, 2, 0.5, 0.25));
    trafficmon::traffic_store::rollup::recompute_day(&mut day);

    let json = serde_json::to_value(&day).unwrap();
    for key in [
        "date",
        "total_bytes_in",
        "total_bytes_out",
        "peak_rate_in",
        "peak_rate_out",
        "avg_rate_in",
        "avg_rate_out",
        "records",
        "summary",
    ] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert_eq!(json["date"], "2026-05-04");
    assert_eq!(json["summary"]["eth0_out"], 2);
    let record = &json["records"][0];
    assert_eq!(record["class"], "network");
    assert!(record.get("utilization_percent").is_none());
}

#[test]
fn test_rate_sample_optional_fields_default_when_absent() {
    let s = sample(local_noon(date(2026, 5, 4)), "eth0", 1, 2, 3.0, 4.0);
    let json = serde_json::to_string(&s).unwrap();
    let back: RateSample = serde_json::from_str(&json).unwrap();
    assert_eq!(back, s);
}

#[test]
fn test_day_bucket_resources_sorted_unique() {
    let mut day = DayBucket::new(date(2026, 5, 4));
    let t = local_noon(day.date);
    day.records.push(sample(t, "wlan0", 0, 0, 0.0, 0.0));
    day.records.push(sample(t, "eth0", 0, 0, 0.0, 0.0));
    day.records.push(sample(t, "wlan0", 0, 0, 0.0, 0.0));
    assert_eq!(day.resources().collect::<Vec<_>>(), vec!["eth0", "wlan0"]);
}

#[test]
fn test_resource_class_parse_and_display() {
    assert_eq!(ResourceClass::from_str("network").unwrap(), ResourceClass::Network);
    assert_eq!(ResourceClass::from_str("DISK").unwrap(), ResourceClass::Disk);
    assert!(ResourceClass::from_str("gpu").is_err());
    assert_eq!(ResourceClass::Disk.to_string(), "disk");
}

#[test]
fn test_retain_tracked_drops_excluded_prefixes() {
    let mut snap = net_snapshot(
        local_noon(date(2026, 5, 4)),
        &[("lo", 1, 1), ("docker0", 1, 1), ("veth12ab", 1, 1), ("eth0", 1, 1), ("wlan0", 1, 1)],
    );
    snap.retain_tracked(&trafficmon::config::default_exclude_prefixes());
    let names: Vec<_> = snap.resources.keys().cloned().collect();
    assert_eq!(names, vec!["eth0", "wlan0"]);
}

const DISKSTATS: &str = "\
   7       0 loop0 57 0 2208 14 0 0 0 0 0 40 14 0 0 0 0
   8       0 sda 1000 10 20000 300 500 5 8000 700 0 900 1000 0 0 0 0
   8       1 sda1 900 10 18000 280 480 5 7800 690 0 880 970 0 0 0 0
 259       0 nvme0n1 42 0 84 1 7 0 16 2 0 3 3
   1       0 ram0 0 0 0 0 0 0 0 0 0 0 0
garbage line
";

#[test]
fn test_parse_diskstats() {
    let disks = parse_diskstats(DISKSTATS);
    assert!(!disks.contains_key("loop0"));
    assert!(!disks.contains_key("ram0"));
    let sda = &disks["sda"];
    assert_eq!(sda.bytes_in, 20000 * 512);
    assert_eq!(sda.bytes_out, 8000 * 512);
    assert_eq!(sda.ops_in, 1000);
    assert_eq!(sda.ops_out, 500);
    assert_eq!(sda.time_in_ms, Some(300));
    assert_eq!(sda.time_out_ms, Some(700));
    assert_eq!(sda.busy_time_ms, Some(900));
    // Partitions are parsed here; whole-device filtering happens against /sys/block.
    assert!(disks.contains_key("sda1"));
    assert_eq!(disks["nvme0n1"].ops_out, 7);
}

#[test]
fn test_format_bytes() {
    assert_eq!(format_bytes(0), "0 B");
    assert_eq!(format_bytes(1023), "1023 B");
    assert_eq!(format_bytes(1536), "1.50 KB");
    assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.00 GB");
    assert!(format_bytes(u64::MAX).ends_with("EB"));
}

#[test]
fn test_format_rate() {
    assert_eq!(format_rate(0.0), "0 B/s");
    assert_eq!(format_rate(999.9), "999 B/s");
    assert_eq!(format_rate(1500.0), "1.5 KB/s");
    assert_eq!(format_rate(2_500_000.0), "2.5 MB/s");
    assert_eq!(format_rate(-3.0), "0 B/s");
    assert_eq!(format_rate(f64::NAN), "0 B/s");
}
