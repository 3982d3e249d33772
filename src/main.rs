use anyhow::Result;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;
use trafficmon::collector::TrafficCollector;
use trafficmon::config::{AppConfig, CollectorConfig};
use trafficmon::counter_source::SysinfoSource;
use trafficmon::format::format_bytes;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    tracing::info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        "starting"
    );

    let app_config = AppConfig::load()?;
    let collector = TrafficCollector::new(
        CollectorConfig::from(&app_config),
        Arc::new(SysinfoSource::new()),
    )?;

    let store = collector.store();
    let existing = tokio::task::spawn_blocking(move || store.get_recent(1)).await??;
    if let Some(today) = existing.last() {
        tracing::info!(
            date = %today.date,
            records = today.records.len(),
            total_in = %format_bytes(today.total_bytes_in),
            total_out = %format_bytes(today.total_bytes_out),
            "resuming day bucket"
        );
    }

    collector.start()?;

    shutdown_signal().await;
    tracing::info!("Received shutdown signal");
    collector.stop().await?;

    let s = collector.stats();
    tracing::info!(
        samples_written_total = s.samples_written,
        ticks_discarded_total = s.ticks_discarded,
        "shutdown complete"
    );
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(_) => {
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
