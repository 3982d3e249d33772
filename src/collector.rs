// Traffic collector: a sampling loop (counter source -> rate estimator -> store)
// and a retention loop (prune expired day buckets), both stopped by one shared
// watch signal. Each tick's blocking work (source, file I/O) runs on the
// blocking pool and completes before the stop signal is observed.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::CollectorConfig;
use crate::counter_source::CounterSource;
use crate::error::{Result, TrafficError};
use crate::format::format_rate;
use crate::models::{CounterSnapshot, ResourceClass};
use crate::rate::{self, TickOutcome};
use crate::traffic_store::TrafficStore;

/// Used when a cron schedule has no upcoming fire time.
const CRON_IDLE_RECHECK: Duration = Duration::from_secs(3600);
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Last snapshot per resource class; owned by the sampling loop.
#[derive(Debug, Default)]
pub struct Baselines {
    previous: HashMap<ResourceClass, CounterSnapshot>,
}

impl Baselines {
    /// Rates `current` against the held baseline of its class, then makes
    /// `current` the new baseline whatever the outcome.
    pub fn advance(&mut self, current: CounterSnapshot) -> TickOutcome {
        let outcome = rate::estimate_tick(self.previous.get(&current.class), &current);
        self.previous.insert(current.class, current);
        outcome
    }

    pub fn get(&self, class: ResourceClass) -> Option<&CounterSnapshot> {
        self.previous.get(&class)
    }
}

/// Point-in-time copy of the collector's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectorStats {
    pub samples_written: u64,
    pub ticks_discarded: u64,
    pub source_failures: u64,
    pub storage_failures: u64,
    pub buckets_pruned: u64,
}

#[derive(Default)]
struct Counters {
    samples_written: AtomicU64,
    ticks_discarded: AtomicU64,
    source_failures: AtomicU64,
    storage_failures: AtomicU64,
    buckets_pruned: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CollectorStats {
        CollectorStats {
            samples_written: self.samples_written.load(Ordering::Relaxed),
            ticks_discarded: self.ticks_discarded.load(Ordering::Relaxed),
            source_failures: self.source_failures.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
            buckets_pruned: self.buckets_pruned.load(Ordering::Relaxed),
        }
    }
}

struct LoopContext {
    config: CollectorConfig,
    source: Arc<dyn CounterSource>,
    store: Arc<TrafficStore>,
    counters: Counters,
}

struct RunningLoops {
    stop_tx: watch::Sender<bool>,
    sampling: JoinHandle<()>,
    retention: JoinHandle<()>,
}

pub struct TrafficCollector {
    ctx: Arc<LoopContext>,
    running: Mutex<Option<RunningLoops>>,
}

impl TrafficCollector {
    /// Opens the store under `config.data_dir` (creating it if absent). Does not start sampling.
    pub fn new(config: CollectorConfig, source: Arc<dyn CounterSource>) -> Result<Self> {
        let store = Arc::new(TrafficStore::open(&config.data_dir)?);
        Ok(Self {
            ctx: Arc::new(LoopContext {
                config,
                source,
                store,
                counters: Counters::default(),
            }),
            running: Mutex::new(None),
        })
    }

    /// Read access to the persisted buckets.
    pub fn store(&self) -> Arc<TrafficStore> {
        self.ctx.store.clone()
    }

    pub fn stats(&self) -> CollectorStats {
        self.ctx.counters.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.lock_running().is_some()
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<RunningLoops>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Spawns both loops on the current tokio runtime.
    pub fn start(&self) -> Result<()> {
        let mut running = self.lock_running();
        if running.is_some() {
            return Err(TrafficError::AlreadyRunning);
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TrafficError::Task(format!("no tokio runtime: {e}")))?;
        std::fs::create_dir_all(self.ctx.store.data_dir())?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let sampling = runtime.spawn(sampling_loop(self.ctx.clone(), stop_rx.clone()));
        let retention = runtime.spawn(retention_loop(self.ctx.clone(), stop_rx));
        *running = Some(RunningLoops {
            stop_tx,
            sampling,
            retention,
        });

        info!(
            data_dir = %self.ctx.config.data_dir.display(),
            sample_interval_ms = self.ctx.config.sample_interval.as_millis() as u64,
            retention_days = self.ctx.config.retention_days,
            "traffic collector started"
        );
        Ok(())
    }

    /// Signals both loops and waits for them to finish their current operation.
    /// Returns `NotRunning` (without side effects) if the collector is stopped.
    pub async fn stop(&self) -> Result<()> {
        let loops = self.lock_running().take();
        let Some(loops) = loops else {
            return Err(TrafficError::NotRunning);
        };
        // Fails only if both loops already exited; nothing left to signal.
        let _ = loops.stop_tx.send(true);
        for (name, handle) in [("sampling", loops.sampling), ("retention", loops.retention)] {
            if let Err(e) = handle.await {
                warn!(error = %e, task = name, "collector loop ended abnormally");
            }
        }
        info!("traffic collector stopped");
        Ok(())
    }
}

impl Drop for TrafficCollector {
    fn drop(&mut self) {
        if let Some(loops) = self.lock_running().take() {
            let _ = loops.stop_tx.send(true);
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

#[instrument(skip_all, fields(sample_interval_ms = ctx.config.sample_interval.as_millis() as u64))]
async fn sampling_loop(ctx: Arc<LoopContext>, mut stop_rx: watch::Receiver<bool>) {
    let mut tick = interval(ctx.config.sample_interval.max(MIN_PERIOD));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats_log_tick = interval(ctx.config.stats_log_interval.max(MIN_PERIOD));
    stats_log_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut baselines = Baselines::default();

    loop {
        tokio::select! {
            _ = tick.tick() => {
                for &class in &ctx.config.classes {
                    sample_class(&ctx, &mut baselines, class).await;
                }
            }
            _ = stats_log_tick.tick() => {
                let s = ctx.counters.snapshot();
                info!(
                    samples_written_total = s.samples_written,
                    ticks_discarded_total = s.ticks_discarded,
                    source_failures_total = s.source_failures,
                    storage_failures_total = s.storage_failures,
                    buckets_pruned_total = s.buckets_pruned,
                    "collector stats"
                );
            }
            _ = stop_rx.changed() => {
                debug!("sampling loop shutting down");
                break;
            }
        }
    }
}

/// One class of one tick. A source failure keeps the previous baseline.
async fn sample_class(ctx: &Arc<LoopContext>, baselines: &mut Baselines, class: ResourceClass) {
    let source = ctx.source.clone();
    let mut snapshot = match blocking(move || source.snapshot(class)).await {
        Ok(s) => s,
        Err(e) => {
            ctx.counters.source_failures.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, class = %class, operation = "snapshot", "counter source failed; tick skipped");
            return;
        }
    };
    if class == ResourceClass::Network {
        snapshot.retain_tracked(&ctx.config.exclude_prefixes);
    }

    let samples = match baselines.advance(snapshot) {
        TickOutcome::Discarded { elapsed_secs } => {
            ctx.counters.ticks_discarded.fetch_add(1, Ordering::Relaxed);
            debug!(class = %class, elapsed_secs, "elapsed time out of range; tick discarded");
            return;
        }
        TickOutcome::Primed(samples) => {
            debug!(class = %class, resources = samples.len(), "baseline primed");
            samples
        }
        TickOutcome::Rated(samples) => samples,
    };
    if samples.is_empty() {
        return;
    }
    for s in &samples {
        trace!(
            class = %class,
            resource = %s.resource,
            rate_in = %format_rate(s.rate_in),
            rate_out = %format_rate(s.rate_out),
            "sample"
        );
    }

    let store = ctx.store.clone();
    match blocking(move || store.append_batch(&samples)).await {
        Ok(n) => {
            ctx.counters
                .samples_written
                .fetch_add(n as u64, Ordering::Relaxed);
        }
        Err(e) => {
            ctx.counters.storage_failures.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, class = %class, operation = "append_batch", "failed to persist samples");
        }
    }
}

#[instrument(skip_all, fields(retention_days = ctx.config.retention_days))]
async fn retention_loop(ctx: Arc<LoopContext>, mut stop_rx: watch::Receiver<bool>) {
    let schedule = ctx.config.prune_schedule.as_deref().and_then(|expr| {
        match cron::Schedule::from_str(expr) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(cron = %expr, error = %e, "invalid prune_schedule; using prune_interval");
                None
            }
        }
    });

    if ctx.config.prune_on_start {
        prune_once(&ctx).await;
    }

    loop {
        let delay = next_prune_delay(schedule.as_ref(), ctx.config.prune_interval.max(MIN_PERIOD));
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                prune_once(&ctx).await;
            }
            _ = stop_rx.changed() => {
                debug!("retention loop shutting down");
                break;
            }
        }
    }
}

/// Time until the next prune: next cron fire time (local), else the fixed interval.
pub fn next_prune_delay(schedule: Option<&cron::Schedule>, fallback: Duration) -> Duration {
    let Some(schedule) = schedule else {
        return fallback;
    };
    let now = chrono::Local::now();
    match schedule.after(&now).next() {
        Some(next) => (next - now).to_std().unwrap_or(Duration::from_secs(1)),
        None => CRON_IDLE_RECHECK,
    }
}

async fn prune_once(ctx: &Arc<LoopContext>) {
    let store = ctx.store.clone();
    let retention_days = ctx.config.retention_days;
    match blocking(move || store.prune(retention_days)).await {
        Ok(report) => {
            ctx.counters
                .buckets_pruned
                .fetch_add(report.removed as u64, Ordering::Relaxed);
            if report.removed > 0 || report.leftovers_removed > 0 || report.failed > 0 {
                info!(
                    removed = report.removed,
                    leftovers_removed = report.leftovers_removed,
                    failed = report.failed,
                    operation = "prune",
                    "expired day buckets pruned"
                );
            } else {
                debug!(operation = "prune", "nothing to prune");
            }
        }
        Err(e) => {
            warn!(error = %e, operation = "prune", "failed to prune old data");
        }
    }
}
