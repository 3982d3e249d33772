// Rate estimator tests: elapsed-time guard, counter resets, first-call priming, disks

mod common;

use chrono::{TimeZone, Utc};
use common::*;
use trafficmon::collector::Baselines;
use trafficmon::models::*;
use trafficmon::rate::{TickOutcome, counter_rate, estimate, estimate_tick, utilization_percent};

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap()
}

#[test]
fn estimate_two_second_interval() {
    let prev = net_snapshot(t0(), &[("eth0", 1000, 500)]);
    let cur = net_snapshot(at_secs(t0(), 2.0), &[("eth0", 2000, 1500)]);

    let s = estimate(&prev, &cur, "eth0").unwrap();
    assert_eq!(s.rate_in, 500.0);
    assert_eq!(s.rate_out, 500.0);
    assert_eq!(s.bytes_in, 2000);
    assert_eq!(s.bytes_out, 1500);
    assert_eq!(s.timestamp, cur.captured_at);
    assert_eq!(s.class, ResourceClass::Network);
    assert!(s.utilization_percent.is_none());
}

#[test]
fn estimate_counter_reset_reports_zero_not_negative() {
    let prev = net_snapshot(t0(), &[("eth0", 5000, 0)]);
    let cur = net_snapshot(at_secs(t0(), 1.0), &[("eth0", 100, 0)]);

    let s = estimate(&prev, &cur, "eth0").unwrap();
    assert_eq!(s.rate_in, 0.0);
    assert_eq!(s.bytes_in, 100);
}

#[test]
fn estimate_reset_affects_only_that_field() {
    let prev = net_snapshot(t0(), &[("eth0", 5000, 1000)]);
    let cur = net_snapshot(at_secs(t0(), 4.0), &[("eth0", 10, 3000)]);

    let s = estimate(&prev, &cur, "eth0").unwrap();
    assert_eq!(s.rate_in, 0.0);
    assert_eq!(s.rate_out, 500.0);
}

#[test]
fn estimate_skips_removed_resource() {
    let prev = net_snapshot(t0(), &[("eth0", 1, 1), ("wlan0", 1, 1)]);
    let cur = net_snapshot(at_secs(t0(), 1.0), &[("eth0", 2, 2)]);
    assert!(estimate(&prev, &cur, "wlan0").is_none());
}

#[test]
fn estimate_new_resource_gets_zero_rates_and_current_cumulative() {
    let prev = net_snapshot(t0(), &[("eth0", 1, 1)]);
    let cur = net_snapshot(at_secs(t0(), 1.0), &[("eth0", 2, 2), ("wlan0", 700, 300)]);

    let s = estimate(&prev, &cur, "wlan0").unwrap();
    assert_eq!(s.rate_in, 0.0);
    assert_eq!(s.rate_out, 0.0);
    assert_eq!(s.bytes_in, 700);
    assert_eq!(s.bytes_out, 300);
}

#[test]
fn estimate_tick_without_baseline_primes_every_resource() {
    let cur = net_snapshot(t0(), &[("eth0", 10, 20), ("wlan0", 30, 40)]);

    let outcome = estimate_tick(None, &cur);
    let TickOutcome::Primed(samples) = outcome else {
        panic!("expected Primed, got {outcome:?}");
    };
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|s| s.rate_in == 0.0 && s.rate_out == 0.0));
    assert_eq!(samples[0].resource, "eth0");
    assert_eq!(samples[0].bytes_out, 20);
}

#[test]
fn estimate_tick_discards_non_positive_elapsed() {
    let prev = net_snapshot(t0(), &[("eth0", 1000, 500)]);
    let same = net_snapshot(t0(), &[("eth0", 2000, 1500)]);
    let earlier = net_snapshot(at_secs(t0(), -5.0), &[("eth0", 2000, 1500)]);

    assert!(matches!(estimate_tick(Some(&prev), &same), TickOutcome::Discarded { .. }));
    assert!(matches!(
        estimate_tick(Some(&prev), &earlier),
        TickOutcome::Discarded { elapsed_secs } if elapsed_secs < 0.0
    ));
    assert!(estimate(&prev, &same, "eth0").is_none());
}

#[test]
fn estimate_tick_discards_elapsed_at_or_beyond_sixty_seconds() {
    let prev = net_snapshot(t0(), &[("eth0", 1000, 500)]);
    let at_limit = net_snapshot(at_secs(t0(), 60.0), &[("eth0", 2000, 1500)]);
    let just_under = net_snapshot(at_secs(t0(), 59.5), &[("eth0", 2000, 1500)]);

    let outcome = estimate_tick(Some(&prev), &at_limit);
    assert!(outcome.samples().is_empty());
    assert!(matches!(outcome, TickOutcome::Discarded { .. }));
    assert!(matches!(estimate_tick(Some(&prev), &just_under), TickOutcome::Rated(_)));
}

#[test]
fn rates_never_negative_across_mixed_counters() {
    let prev = net_snapshot(t0(), &[("a", 100, 0), ("b", 0, 100), ("c", 50, 50)]);
    for secs in [0.001, 0.5, 1.0, 30.0, 59.999] {
        let cur = net_snapshot(at_secs(t0(), secs), &[("a", 0, 10), ("b", 10, 0), ("c", 50, 49)]);
        for s in estimate_tick(Some(&prev), &cur).samples() {
            assert!(s.rate_in >= 0.0 && s.rate_out >= 0.0, "{s:?}");
            assert!(s.ops_rate_in >= 0.0 && s.ops_rate_out >= 0.0);
        }
    }
}

#[test]
fn baselines_replaced_after_discarded_tick() {
    let mut baselines = Baselines::default();
    let first = net_snapshot(t0(), &[("eth0", 0, 0)]);
    let late = net_snapshot(at_secs(t0(), 120.0), &[("eth0", 1_000_000, 0)]);
    let next = net_snapshot(at_secs(t0(), 122.0), &[("eth0", 1_000_200, 0)]);

    assert!(matches!(baselines.advance(first), TickOutcome::Primed(_)));
    assert!(matches!(baselines.advance(late.clone()), TickOutcome::Discarded { .. }));
    assert_eq!(baselines.get(ResourceClass::Network), Some(&late));

    let outcome = baselines.advance(next);
    assert_eq!(outcome.samples().len(), 1);
    assert_eq!(outcome.samples()[0].rate_in, 100.0);
}

#[test]
fn baselines_keep_classes_independent() {
    let mut baselines = Baselines::default();
    baselines.advance(net_snapshot(t0(), &[("eth0", 0, 0)]));
    let disk = CounterSnapshot::new(ResourceClass::Disk, at_secs(t0(), 1.0))
        .with_resource("sda", counters(0, 0));

    // First disk snapshot primes, even though a network baseline exists.
    assert!(matches!(baselines.advance(disk), TickOutcome::Primed(_)));
    assert!(baselines.get(ResourceClass::Network).is_some());
}

#[test]
fn disk_sample_has_iops_utilization_and_latency() {
    let prev = CounterSnapshot::new(ResourceClass::Disk, t0()).with_resource(
        "sda",
        ResourceCounters {
            bytes_in: 0,
            bytes_out: 0,
            ops_in: 100,
            ops_out: 50,
            busy_time_ms: Some(1_000),
            time_in_ms: Some(200),
            time_out_ms: Some(100),
        },
    );
    let cur = CounterSnapshot::new(ResourceClass::Disk, at_secs(t0(), 2.0)).with_resource(
        "sda",
        ResourceCounters {
            bytes_in: 4096,
            bytes_out: 8192,
            ops_in: 120,
            ops_out: 60,
            busy_time_ms: Some(1_500),
            time_in_ms: Some(240),
            time_out_ms: Some(150),
        },
    );

    let s = estimate(&prev, &cur, "sda").unwrap();
    assert_eq!(s.rate_in, 2048.0);
    assert_eq!(s.rate_out, 4096.0);
    assert_eq!(s.ops_rate_in, 10.0);
    assert_eq!(s.ops_rate_out, 5.0);
    assert_eq!(s.utilization_percent, Some(25.0));
    assert_eq!(s.latency_in_ms, Some(2.0));
    assert_eq!(s.latency_out_ms, Some(5.0));
}

#[test]
fn utilization_is_clamped() {
    assert_eq!(utilization_percent(0, 5_000, 1.0), 100.0);
    assert_eq!(utilization_percent(5_000, 0, 1.0), 0.0);
    assert_eq!(utilization_percent(0, 500, 1.0), 50.0);
}

#[test]
fn counter_rate_guards() {
    assert_eq!(counter_rate(10, 5, 1.0), 0.0);
    assert_eq!(counter_rate(0, 10, 0.0), 0.0);
    assert_eq!(counter_rate(0, 10, 4.0), 2.5);
}
