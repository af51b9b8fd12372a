//! Host telemetry via sysinfo.

use crate::capability::{SystemTelemetry, TelemetrySnapshot};
use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use sysinfo::{Disks, System};
use tracing::debug;

/// Live readings from the local host.
///
/// CPU measurement needs two refreshes separated by sysinfo's minimum
/// interval, so the whole collection runs on the blocking pool.
pub struct SysinfoTelemetry;

impl SysinfoTelemetry {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SysinfoTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_snapshot() -> TelemetrySnapshot {
    let mut sys = System::new();

    sys.refresh_cpu();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();
    let cpus = sys.cpus();
    let cpu_percent = if cpus.is_empty() {
        0.0
    } else {
        cpus.iter().map(|c| c.cpu_usage() as f64).sum::<f64>() / cpus.len() as f64
    };

    sys.refresh_memory();
    let memory_percent = if sys.total_memory() == 0 {
        0.0
    } else {
        sys.used_memory() as f64 / sys.total_memory() as f64 * 100.0
    };

    let disks = Disks::new_with_refreshed_list();
    let disk_percent = disks
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .map(|d| {
            let total = d.total_space();
            if total == 0 {
                0.0
            } else {
                (total - d.available_space()) as f64 / total as f64 * 100.0
            }
        })
        .unwrap_or(0.0);

    TelemetrySnapshot {
        cpu_percent,
        memory_percent,
        disk_percent,
    }
}

#[async_trait]
impl SystemTelemetry for SysinfoTelemetry {
    async fn query(&self) -> anyhow::Result<TelemetrySnapshot> {
        let snapshot = tokio::task::spawn_blocking(collect_snapshot)
            .await
            .context("telemetry collection task failed")?;
        debug!(
            cpu = format!("{:.1}", snapshot.cpu_percent),
            memory = format!("{:.1}", snapshot.memory_percent),
            disk = format!("{:.1}", snapshot.disk_percent),
            "collected host telemetry"
        );
        Ok(snapshot)
    }
}
