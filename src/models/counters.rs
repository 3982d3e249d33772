// Cumulative counter snapshots as reported by the host.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of countable resource. Each class is sampled and rated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceClass {
    Network,
    Disk,
}

impl ResourceClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Disk => "disk",
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "network" | "net" => Ok(Self::Network),
            "disk" => Ok(Self::Disk),
            other => Err(format!("unknown resource class '{other}'")),
        }
    }
}

/// Cumulative totals for one resource since it was initialized by the OS.
///
/// For network interfaces "in" is received and "out" is transmitted, and the
/// op counters are packets. For disks "in" is read and "out" is written, and
/// the op counters are completed I/O operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceCounters {
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub ops_in: u64,
    pub ops_out: u64,
    /// Milliseconds spent doing I/O (disks only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub busy_time_ms: Option<u64>,
    /// Milliseconds spent on reads / writes (disks only), for latency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_in_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_out_ms: Option<u64>,
}

/// All counters of one class captured at one wall-clock instant. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterSnapshot {
    pub class: ResourceClass,
    pub captured_at: DateTime<Utc>,
    pub resources: BTreeMap<String, ResourceCounters>,
}

impl CounterSnapshot {
    pub fn new(class: ResourceClass, captured_at: DateTime<Utc>) -> Self {
        Self {
            class,
            captured_at,
            resources: BTreeMap::new(),
        }
    }

    pub fn with_resource(mut self, name: impl Into<String>, counters: ResourceCounters) -> Self {
        self.resources.insert(name.into(), counters);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ResourceCounters> {
        self.resources.get(name)
    }

    /// Drops resources whose name starts with any of `prefixes`.
    pub fn retain_tracked(&mut self, prefixes: &[String]) {
        self.resources
            .retain(|name, _| !prefixes.iter().any(|p| name.starts_with(p.as_str())));
    }
}
