// Per-agent snapshot: CPU, memory, devices, system identity and sessions.

use serde::{Deserialize, Serialize};

use super::keyed::{Keyed, KeyedList};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CpuStats {
    pub usage_percent: f64,
    pub per_core_usage: Vec<f64>,
    pub temperature: f64,
    pub frequency_mhz: u64,
    pub frequency_max_mhz: u64,
    pub model: String,
    pub vendor: String,
    pub physical_cores: u32,
    pub logical_cores: u32,
    pub architecture: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryStats {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub swap_total: u64,
    pub swap_used: u64,
    pub cached: u64,
    pub buffers: u64,
    pub memory_type: String,
    pub memory_speed_mhz: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiskStat {
    pub device: String,
    pub mount_point: String,
    pub fs_type: String,
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub usage_percent: f64,
    pub read_bytes_per_sec: u64,
    pub write_bytes_per_sec: u64,
    pub read_iops: u64,
    pub write_iops: u64,
    pub model: String,
    pub serial: String,
    pub disk_type: String,
    pub temperature: f64,
    pub health_status: String,
}

impl Keyed for DiskStat {
    type Key = String;

    fn key(&self) -> String {
        self.device.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterfaceStat {
    pub interface: String,
    pub rx_bytes_per_sec: u64,
    pub tx_bytes_per_sec: u64,
    pub rx_packets_per_sec: u64,
    pub tx_packets_per_sec: u64,
    pub is_up: bool,
    pub mac_address: String,
    pub ip_addresses: Vec<String>,
    pub speed_mbps: u64,
    pub interface_type: String,
}

impl Keyed for InterfaceStat {
    type Key = String;

    fn key(&self) -> String {
        self.interface.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GpuStat {
    pub index: u32,
    pub name: String,
    pub vendor: String,
    pub usage_percent: f64,
    pub memory_total: u64,
    pub memory_used: u64,
    pub temperature: f64,
    pub fan_speed_percent: u32,
    pub power_watts: u32,
    pub power_limit_watts: u32,
    pub clock_core_mhz: u64,
    pub clock_memory_mhz: u64,
    pub driver_version: String,
    pub pcie_generation: String,
    pub encoder_usage: f64,
    pub decoder_usage: f64,
}

impl Keyed for GpuStat {
    type Key = u32;

    fn key(&self) -> u32 {
        self.index
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NpuStat {
    pub index: u32,
    pub name: String,
    pub vendor: String,
    pub usage_percent: f64,
    pub memory_total: u64,
    pub memory_used: u64,
    pub temperature: f64,
    pub power_watts: u32,
    pub driver_version: String,
}

impl Keyed for NpuStat {
    type Key = u32;

    fn key(&self) -> u32 {
        self.index
    }
}

/// Host identity; replaced wholesale by static updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemInfo {
    pub os_name: String,
    pub os_version: String,
    pub kernel_version: String,
    pub hostname: String,
    pub boot_time: i64,
    pub uptime_seconds: i64,
    pub motherboard_model: String,
    pub motherboard_vendor: String,
    pub bios_version: String,
    pub system_model: String,
    pub system_vendor: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserSession {
    pub username: String,
    pub tty: String,
    pub login_time: i64,
    pub remote_host: String,
    pub idle_seconds: i64,
    pub session_type: String,
}

/// Best-known state of one agent. `timestamp` is Unix ms of the last store or merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub timestamp: i64,
    pub cpu: CpuStats,
    pub memory: MemoryStats,
    pub disks: KeyedList<DiskStat>,
    pub networks: KeyedList<InterfaceStat>,
    pub gpus: KeyedList<GpuStat>,
    pub npus: KeyedList<NpuStat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_info: Option<SystemInfo>,
    pub user_sessions: Vec<UserSession>,
    pub load_average: Vec<f64>,
}

impl Snapshot {
    /// used / total * 100, or 0 when total is unknown.
    pub fn memory_percent(&self) -> f64 {
        if self.memory.total == 0 {
            return 0.0;
        }
        self.memory.used as f64 / self.memory.total as f64 * 100.0
    }
}
