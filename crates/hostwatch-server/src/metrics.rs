use anyhow::Result;
use async_trait::async_trait;
use hostwatch_alert::MetricSource;
use sysinfo::{Disks, System};
use tokio::sync::Mutex;

/// Metric source backed by the local host via `sysinfo`.
///
/// Known keys: `cpu.usage`, `memory.used_percent`, `disk.used_percent`,
/// all as percentages. Any other key is reported as unknown. The
/// `server_id` scope is ignored; this source only sees the host it runs
/// on.
pub struct SystemMetricSource {
    system: Mutex<System>,
}

impl SystemMetricSource {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    async fn cpu_usage(&self) -> f64 {
        let mut sys = self.system.lock().await;
        // CPU usage is a delta; two refreshes are needed for a reading.
        sys.refresh_cpu_all();
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_cpu_all();
        sys.global_cpu_usage() as f64
    }

    async fn memory_used_percent(&self) -> Option<f64> {
        let mut sys = self.system.lock().await;
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return None;
        }
        Some(sys.used_memory() as f64 / total as f64 * 100.0)
    }

    fn disk_used_percent() -> Option<f64> {
        let disks = Disks::new_with_refreshed_list();
        let mut total = 0u64;
        let mut available = 0u64;
        for disk in disks.list() {
            total += disk.total_space();
            available += disk.available_space();
        }
        if total == 0 {
            return None;
        }
        Some((total - available) as f64 / total as f64 * 100.0)
    }
}

impl Default for SystemMetricSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricSource for SystemMetricSource {
    async fn get_value(&self, metric: &str, _server_id: Option<&str>) -> Result<Option<f64>> {
        match metric {
            "cpu.usage" => Ok(Some(self.cpu_usage().await)),
            "memory.used_percent" => Ok(self.memory_used_percent().await),
            "disk.used_percent" => Ok(Self::disk_used_percent()),
            _ => Ok(None),
        }
    }
}
