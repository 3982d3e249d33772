// Counter snapshot source: the seam between the collector and the host OS.

mod linux;

pub use linux::parse_diskstats;

use crate::error::{Result, TrafficError};
use crate::models::{CounterSnapshot, ResourceClass, ResourceCounters};
use chrono::Utc;
use std::sync::Mutex;
use sysinfo::{Disks, Networks};
use tracing::instrument;

/// Returns the current cumulative counters for every resource of a class.
///
/// Implementations are synchronous and may block; the collector calls them
/// from a blocking task.
pub trait CounterSource: Send + Sync {
    fn snapshot(&self, class: ResourceClass) -> Result<CounterSnapshot>;
}

/// Host counters via sysinfo, with /proc/diskstats for disks on Linux.
pub struct SysinfoSource {
    networks: Mutex<Networks>,
    disks: Mutex<Disks>,
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            networks: Mutex::new(Networks::new_with_refreshed_list()),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
        }
    }

    #[instrument(skip(self), fields(source = "sysinfo", operation = "network_snapshot"))]
    fn network_snapshot(&self) -> Result<CounterSnapshot> {
        let mut networks = self
            .networks
            .lock()
            .map_err(|e| TrafficError::source_unavailable(format!("networks lock poisoned: {e}")))?;
        networks.refresh(true);
        let mut snapshot = CounterSnapshot::new(ResourceClass::Network, Utc::now());
        for (name, data) in networks.list() {
            snapshot.resources.insert(
                name.clone(),
                ResourceCounters {
                    bytes_in: data.total_received(),
                    bytes_out: data.total_transmitted(),
                    ops_in: data.total_packets_received(),
                    ops_out: data.total_packets_transmitted(),
                    ..Default::default()
                },
            );
        }
        Ok(snapshot)
    }

    #[instrument(skip(self), fields(source = "sysinfo", operation = "disk_snapshot"))]
    fn disk_snapshot(&self) -> Result<CounterSnapshot> {
        if let Some(snapshot) = linux::read_diskstats()? {
            return Ok(snapshot);
        }

        let mut disks = self
            .disks
            .lock()
            .map_err(|e| TrafficError::source_unavailable(format!("disks lock poisoned: {e}")))?;
        disks.refresh(true);
        let mut snapshot = CounterSnapshot::new(ResourceClass::Disk, Utc::now());
        for disk in disks.list() {
            let usage = disk.usage();
            let name = disk.name().to_string_lossy().into_owned();
            // Several mount points can share one device; keep the first.
            snapshot.resources.entry(name).or_insert(ResourceCounters {
                bytes_in: usage.total_read_bytes,
                bytes_out: usage.total_written_bytes,
                ..Default::default()
            });
        }
        Ok(snapshot)
    }
}

impl CounterSource for SysinfoSource {
    fn snapshot(&self, class: ResourceClass) -> Result<CounterSnapshot> {
        match class {
            ResourceClass::Network => self.network_snapshot(),
            ResourceClass::Disk => self.disk_snapshot(),
        }
    }
}
