// Partial updates, one per reporting cadence. Each carries only the fields its cadence owns.

use serde::{Deserialize, Serialize};

use super::{SystemInfo, UserSession};

/// Second-scale counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeUpdate {
    pub cpu_usage: f64,
    pub cpu_per_core: Vec<f64>,
    pub cpu_temperature: f64,
    pub cpu_frequency_mhz: u64,
    pub memory_used: u64,
    pub memory_cached: u64,
    pub swap_used: u64,
    pub load_average: Vec<f64>,
    pub disk_io: Vec<DiskIo>,
    pub network_io: Vec<NetworkIo>,
    pub gpu_usage: Vec<GpuUsage>,
    pub npu_usage: Vec<NpuUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiskIo {
    pub device: String,
    pub read_bytes_per_sec: u64,
    pub write_bytes_per_sec: u64,
    pub read_iops: u64,
    pub write_iops: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkIo {
    pub interface: String,
    pub rx_bytes_per_sec: u64,
    pub tx_bytes_per_sec: u64,
    pub rx_packets_per_sec: u64,
    pub tx_packets_per_sec: u64,
    pub is_up: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GpuUsage {
    pub index: u32,
    pub usage_percent: f64,
    pub memory_used: u64,
    pub temperature: f64,
    pub power_watts: u32,
    pub clock_core_mhz: u64,
    pub clock_memory_mhz: u64,
    pub encoder_usage: f64,
    pub decoder_usage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NpuUsage {
    pub index: u32,
    pub usage_percent: f64,
    pub memory_used: u64,
    pub temperature: f64,
    pub power_watts: u32,
}

/// Hardware description, sent on connect or on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StaticUpdate {
    pub cpu: Option<CpuInfo>,
    pub memory: Option<MemoryInfo>,
    pub disks: Vec<DiskInfo>,
    pub networks: Vec<InterfaceInfo>,
    pub gpus: Vec<GpuInfo>,
    pub npus: Vec<NpuInfo>,
    pub system_info: Option<SystemInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CpuInfo {
    pub model: String,
    pub vendor: String,
    pub physical_cores: u32,
    pub logical_cores: u32,
    pub architecture: String,
    pub frequency_max_mhz: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryInfo {
    pub total: u64,
    pub swap_total: u64,
    pub memory_type: String,
    pub memory_speed_mhz: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiskInfo {
    pub device: String,
    pub mount_point: String,
    pub model: String,
    pub serial: String,
    pub disk_type: String,
    pub fs_type: String,
    pub health_status: String,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterfaceInfo {
    pub interface: String,
    pub mac_address: String,
    pub ip_addresses: Vec<String>,
    pub speed_mbps: u64,
    pub interface_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GpuInfo {
    pub index: u32,
    pub name: String,
    pub vendor: String,
    pub memory_total: u64,
    pub driver_version: String,
    pub pcie_generation: String,
    pub power_limit_watts: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NpuInfo {
    pub index: u32,
    pub name: String,
    pub vendor: String,
    pub memory_total: u64,
    pub driver_version: String,
}

/// Tens-of-seconds facts: disk usage, logged-in sessions, interface state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PeriodicUpdate {
    pub disk_usage: Vec<DiskUsage>,
    /// `None` keeps the current sessions; `Some` replaces them, even with an empty list.
    pub user_sessions: Option<Vec<UserSession>>,
    pub network_updates: Vec<NetworkState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiskUsage {
    pub device: String,
    pub mount_point: String,
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub usage_percent: f64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkState {
    pub interface: String,
    pub ip_addresses: Vec<String>,
    pub is_up: bool,
}
