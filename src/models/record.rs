// Persisted record: the scalar projection of a snapshot written to the monthly shards.

use serde::{Deserialize, Serialize};

use super::Snapshot;

/// One raw row per (agent, timestamp). Throughput fields are bytes per second.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRecord {
    pub agent_id: String,
    pub timestamp: i64,
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub disk_read_bps: u64,
    pub disk_write_bps: u64,
    pub net_rx_bps: u64,
    pub net_tx_bps: u64,
    pub gpu_percent: f64,
    pub load_avg1: f64,
}

impl MetricsRecord {
    /// Reduce a snapshot: disk and network rates summed over all devices, GPU usage averaged.
    pub fn from_snapshot(agent_id: &str, snapshot: &Snapshot) -> Self {
        let disk_read_bps = snapshot.disks.iter().map(|d| d.read_bytes_per_sec).sum();
        let disk_write_bps = snapshot.disks.iter().map(|d| d.write_bytes_per_sec).sum();
        let net_rx_bps = snapshot.networks.iter().map(|n| n.rx_bytes_per_sec).sum();
        let net_tx_bps = snapshot.networks.iter().map(|n| n.tx_bytes_per_sec).sum();

        let gpu_percent = if snapshot.gpus.is_empty() {
            0.0
        } else {
            snapshot.gpus.iter().map(|g| g.usage_percent).sum::<f64>() / snapshot.gpus.len() as f64
        };

        Self {
            agent_id: agent_id.to_owned(),
            timestamp: snapshot.timestamp,
            cpu_percent: snapshot.cpu.usage_percent,
            mem_percent: snapshot.memory_percent(),
            disk_read_bps,
            disk_write_bps,
            net_rx_bps,
            net_tx_bps,
            gpu_percent,
            load_avg1: snapshot.load_average.first().copied().unwrap_or(0.0),
        }
    }
}
