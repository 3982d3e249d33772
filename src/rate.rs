// Turns two cumulative counter snapshots into per-resource rates.
// Stateless: the caller keeps the previous snapshot and swaps it after every tick.

use crate::models::{CounterSnapshot, RateSample, ResourceClass, ResourceCounters};

/// Ticks whose elapsed time is at or beyond this are discarded.
pub const MAX_ELAPSED_SECS: f64 = 60.0;

/// Result of rating one snapshot against the held baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No baseline existed; every resource got a zero-rate sample.
    Primed(Vec<RateSample>),
    /// Normal tick. Resources that disappeared since the baseline are absent;
    /// resources that newly appeared carry zero rates.
    Rated(Vec<RateSample>),
    /// Elapsed time was not in `(0, MAX_ELAPSED_SECS)`; nothing is emitted.
    Discarded { elapsed_secs: f64 },
}

impl TickOutcome {
    pub fn samples(&self) -> &[RateSample] {
        match self {
            Self::Primed(s) | Self::Rated(s) => s,
            Self::Discarded { .. } => &[],
        }
    }
}

/// Seconds between two snapshots, or `None` when the elapsed-time guard trips.
pub fn elapsed_secs(previous: &CounterSnapshot, current: &CounterSnapshot) -> Option<f64> {
    let dt = raw_elapsed_secs(previous, current);
    (dt > 0.0 && dt < MAX_ELAPSED_SECS).then_some(dt)
}

fn raw_elapsed_secs(previous: &CounterSnapshot, current: &CounterSnapshot) -> f64 {
    let delta = current.captured_at - previous.captured_at;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1000.0,
    }
}

/// Rates a single resource.
///
/// Returns `None` when `current` lacks the resource (device removed) or when the
/// elapsed-time guard trips. A resource missing only from `previous` yields a
/// zero-rate sample carrying the current cumulative values.
pub fn estimate(
    previous: &CounterSnapshot,
    current: &CounterSnapshot,
    resource: &str,
) -> Option<RateSample> {
    let cur = current.get(resource)?;
    let dt = elapsed_secs(previous, current)?;
    Some(match previous.get(resource) {
        Some(prev) => rated_sample(current, resource, prev, cur, dt),
        None => zero_sample(current, resource, cur),
    })
}

/// Rates every resource of `current` against `previous` (if any).
pub fn estimate_tick(previous: Option<&CounterSnapshot>, current: &CounterSnapshot) -> TickOutcome {
    let Some(previous) = previous else {
        let samples = current
            .resources
            .iter()
            .map(|(name, cur)| zero_sample(current, name, cur))
            .collect();
        return TickOutcome::Primed(samples);
    };

    let Some(dt) = elapsed_secs(previous, current) else {
        return TickOutcome::Discarded {
            elapsed_secs: raw_elapsed_secs(previous, current),
        };
    };

    let samples = current
        .resources
        .iter()
        .map(|(name, cur)| match previous.get(name) {
            Some(prev) => rated_sample(current, name, prev, cur, dt),
            None => zero_sample(current, name, cur),
        })
        .collect();
    TickOutcome::Rated(samples)
}

/// Per-second change of one counter. A counter that went backwards (reset) reports 0.
pub fn counter_rate(previous: u64, current: u64, elapsed_secs: f64) -> f64 {
    if current < previous || elapsed_secs <= 0.0 {
        return 0.0;
    }
    (current - previous) as f64 / elapsed_secs
}

/// Share of wall time the device was busy, clamped to `[0, 100]`.
pub fn utilization_percent(previous_busy_ms: u64, current_busy_ms: u64, elapsed_secs: f64) -> f64 {
    if current_busy_ms < previous_busy_ms || elapsed_secs <= 0.0 {
        return 0.0;
    }
    let busy = (current_busy_ms - previous_busy_ms) as f64;
    (busy / (elapsed_secs * 1000.0) * 100.0).clamp(0.0, 100.0)
}

/// Average milliseconds per completed operation over the interval.
fn latency_ms(prev_time: Option<u64>, cur_time: Option<u64>, prev_ops: u64, cur_ops: u64) -> Option<f64> {
    let (prev_time, cur_time) = (prev_time?, cur_time?);
    if cur_ops <= prev_ops || cur_time < prev_time {
        return Some(0.0);
    }
    Some((cur_time - prev_time) as f64 / (cur_ops - prev_ops) as f64)
}

fn rated_sample(
    current: &CounterSnapshot,
    resource: &str,
    prev: &ResourceCounters,
    cur: &ResourceCounters,
    dt: f64,
) -> RateSample {
    let utilization = match (current.class, prev.busy_time_ms, cur.busy_time_ms) {
        (ResourceClass::Disk, Some(p), Some(c)) => Some(utilization_percent(p, c, dt)),
        _ => None,
    };
    RateSample {
        rate_in: counter_rate(prev.bytes_in, cur.bytes_in, dt),
        rate_out: counter_rate(prev.bytes_out, cur.bytes_out, dt),
        ops_rate_in: counter_rate(prev.ops_in, cur.ops_in, dt),
        ops_rate_out: counter_rate(prev.ops_out, cur.ops_out, dt),
        utilization_percent: utilization,
        latency_in_ms: latency_ms(prev.time_in_ms, cur.time_in_ms, prev.ops_in, cur.ops_in),
        latency_out_ms: latency_ms(prev.time_out_ms, cur.time_out_ms, prev.ops_out, cur.ops_out),
        ..zero_sample(current, resource, cur)
    }
}

fn zero_sample(current: &CounterSnapshot, resource: &str, cur: &ResourceCounters) -> RateSample {
    let is_disk = current.class == ResourceClass::Disk;
    RateSample {
        timestamp: current.captured_at,
        resource: resource.to_string(),
        class: current.class,
        bytes_in: cur.bytes_in,
        bytes_out: cur.bytes_out,
        ops_in: cur.ops_in,
        ops_out: cur.ops_out,
        rate_in: 0.0,
        rate_out: 0.0,
        ops_rate_in: 0.0,
        ops_rate_out: 0.0,
        utilization_percent: (is_disk && cur.busy_time_ms.is_some()).then_some(0.0),
        latency_in_ms: cur.time_in_ms.map(|_| 0.0),
        latency_out_ms: cur.time_out_ms.map(|_| 0.0),
    }
}
