//! Native readings of the executing host, for loopback targets.

use std::path::Path;

use async_trait::async_trait;
use sysinfo::{Disks, System};
use tracing::trace;

use crate::{MetricReading, targets};

use super::{MetricProvider, Outcome};

pub struct LocalProvider;

impl LocalProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricProvider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn supports(&self, target: &targets::MonitoredTarget) -> bool {
        targets::is_loopback(&target.address) && sysinfo::IS_SUPPORTED_SYSTEM
    }

    async fn acquire(&self, target: &targets::MonitoredTarget) -> Outcome {
        trace!("reading local metrics for {}", target.name);

        let mut sys = System::new_all();
        sys.refresh_all();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_all();

        let cpus = sys.cpus();
        let cpu = if cpus.is_empty() {
            None
        } else {
            let usage_sum = cpus.iter().map(|cpu| cpu.cpu_usage()).sum::<f32>();
            Some(usage_sum / cpus.len() as f32)
        };

        let total_memory = sys.total_memory();
        let ram = if total_memory > 0 {
            Some(sys.used_memory() as f32 / total_memory as f32 * 100.0)
        } else {
            None
        };

        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .find(|disk| disk.mount_point() == Path::new("/"))
            .or_else(|| disks.list().iter().max_by_key(|disk| disk.total_space()))
            .and_then(|disk| {
                let total = disk.total_space();
                if total == 0 {
                    return None;
                }
                let used = total.saturating_sub(disk.available_space());
                Some(used as f32 / total as f32 * 100.0)
            });

        Outcome::Reading(MetricReading { cpu, ram, disk })
    }
}
