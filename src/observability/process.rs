//! Process resource metrics.
//!
//! # Metrics
//! - `process_cpu_user_seconds_total`, `process_cpu_system_seconds_total`,
//!   `process_cpu_seconds_total`: CPU time consumed
//! - `process_start_time_seconds`: unix time the process started
//! - `process_resident_memory_bytes`, `process_virtual_memory_bytes`
//! - `process_open_fds`, `process_max_fds`
//!
//! # Design Decisions
//! - Values are read from `/proc/self` when the scrape happens, not sampled
//!   in the background
//! - On platforms without procfs the series stay at zero and the health
//!   memory fields are `null`
//! - CPU totals are exported as gauges set to the kernel's running total

#[cfg(target_os = "linux")]
use std::fs;

use serde::Serialize;

use crate::observability::metrics::{Gauge, MetricRegistry, MetricsError};

/// Kernel CPU accounting unit (`USER_HZ`), fixed at 100 on Linux.
const CLOCK_TICKS_PER_SEC: f64 = 100.0;

/// One reading of the process counters. Fields the platform cannot report
/// are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessStats {
    pub cpu_user_seconds: Option<f64>,
    pub cpu_system_seconds: Option<f64>,
    pub resident_memory_bytes: Option<u64>,
    pub virtual_memory_bytes: Option<u64>,
    pub open_fds: Option<u64>,
    pub max_fds: Option<u64>,
}

impl ProcessStats {
    #[cfg(target_os = "linux")]
    pub fn collect() -> Self {
        let (cpu_user_seconds, cpu_system_seconds) =
            match fs::read_to_string("/proc/self/stat").ok().as_deref().and_then(parse_cpu_times) {
                Some((user, system)) => (Some(user), Some(system)),
                None => (None, None),
            };
        let status = fs::read_to_string("/proc/self/status").ok();
        let status = status.as_deref();

        Self {
            cpu_user_seconds,
            cpu_system_seconds,
            resident_memory_bytes: status.and_then(|s| parse_status_bytes(s, "VmRSS")),
            virtual_memory_bytes: status.and_then(|s| parse_status_bytes(s, "VmSize")),
            open_fds: fs::read_dir("/proc/self/fd")
                .ok()
                .map(|entries| entries.count() as u64),
            max_fds: fs::read_to_string("/proc/self/limits")
                .ok()
                .as_deref()
                .and_then(parse_max_open_files),
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn collect() -> Self {
        Self::default()
    }

    pub fn cpu_seconds(&self) -> Option<f64> {
        Some(self.cpu_user_seconds? + self.cpu_system_seconds?)
    }
}

/// `utime` and `stime` from `/proc/<pid>/stat`, in seconds.
fn parse_cpu_times(stat: &str) -> Option<(f64, f64)> {
    // The command name is parenthesised and may itself contain spaces or ')'.
    let rest = &stat[stat.rfind(')')? + 1..];
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // `rest` starts at field 3 (state); utime and stime are fields 14 and 15.
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some((
        utime as f64 / CLOCK_TICKS_PER_SEC,
        stime as f64 / CLOCK_TICKS_PER_SEC,
    ))
}

/// A `Key:   1234 kB` line from `/proc/<pid>/status`, in bytes.
fn parse_status_bytes(status: &str, key: &str) -> Option<u64> {
    status.lines().find_map(|line| {
        let value = line.strip_prefix(key)?.strip_prefix(':')?;
        let mut parts = value.split_whitespace();
        let amount: u64 = parts.next()?.parse().ok()?;
        match parts.next() {
            Some("kB") => Some(amount * 1024),
            None => Some(amount),
            Some(_) => None,
        }
    })
}

/// Soft limit from the `Max open files` row of `/proc/<pid>/limits`.
fn parse_max_open_files(limits: &str) -> Option<u64> {
    let row = limits.lines().find(|l| l.starts_with("Max open files"))?;
    row["Max open files".len()..]
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// Process gauges registered on the application registry.
#[derive(Debug, Clone)]
pub struct ProcessMetrics {
    cpu_user: Gauge,
    cpu_system: Gauge,
    cpu_total: Gauge,
    start_time: Gauge,
    resident_memory: Gauge,
    virtual_memory: Gauge,
    open_fds: Gauge,
    max_fds: Gauge,
}

impl ProcessMetrics {
    pub fn register(registry: &MetricRegistry) -> Result<Self, MetricsError> {
        let metrics = Self {
            cpu_user: registry.gauge(
                "process_cpu_user_seconds_total",
                "Total user CPU time spent in seconds",
                &[],
            )?,
            cpu_system: registry.gauge(
                "process_cpu_system_seconds_total",
                "Total system CPU time spent in seconds",
                &[],
            )?,
            cpu_total: registry.gauge(
                "process_cpu_seconds_total",
                "Total user and system CPU time spent in seconds",
                &[],
            )?,
            start_time: registry.gauge(
                "process_start_time_seconds",
                "Start time of the process since unix epoch in seconds",
                &[],
            )?,
            resident_memory: registry.gauge(
                "process_resident_memory_bytes",
                "Resident memory size in bytes",
                &[],
            )?,
            virtual_memory: registry.gauge(
                "process_virtual_memory_bytes",
                "Virtual memory size in bytes",
                &[],
            )?,
            open_fds: registry.gauge(
                "process_open_fds",
                "Number of open file descriptors",
                &[],
            )?,
            max_fds: registry.gauge(
                "process_max_fds",
                "Maximum number of open file descriptors",
                &[],
            )?,
        };
        metrics
            .start_time
            .set(&[], chrono::Utc::now().timestamp() as f64)?;
        Ok(metrics)
    }

    /// Read the process counters and store them. Returns the reading.
    pub fn refresh(&self) -> Result<ProcessStats, MetricsError> {
        let stats = ProcessStats::collect();
        let readings = [
            (&self.cpu_user, stats.cpu_user_seconds),
            (&self.cpu_system, stats.cpu_system_seconds),
            (&self.cpu_total, stats.cpu_seconds()),
            (&self.resident_memory, stats.resident_memory_bytes.map(|b| b as f64)),
            (&self.virtual_memory, stats.virtual_memory_bytes.map(|b| b as f64)),
            (&self.open_fds, stats.open_fds.map(|n| n as f64)),
            (&self.max_fds, stats.max_fds.map(|n| n as f64)),
        ];
        for (gauge, value) in readings {
            if let Some(value) = value {
                gauge.set(&[], value)?;
            }
        }
        Ok(stats)
    }

    pub fn resident_memory(&self) -> Option<f64> {
        self.resident_memory.get(&[])
    }

    pub fn cpu_seconds(&self) -> Option<f64> {
        self.cpu_total.get(&[])
    }
}
