// Domain models

mod aggregation;
mod keyed;
mod record;
mod snapshot;
mod update;

pub use aggregation::{DailySummary, HourlySummary};
pub use keyed::{Keyed, KeyedList};
pub use record::MetricsRecord;
pub use snapshot::{
    CpuStats, DiskStat, GpuStat, InterfaceStat, MemoryStats, NpuStat, Snapshot, SystemInfo,
    UserSession,
};
pub use update::{
    CpuInfo, DiskInfo, DiskIo, DiskUsage, GpuInfo, GpuUsage, InterfaceInfo, MemoryInfo,
    NetworkIo, NetworkState, NpuInfo, NpuUsage, PeriodicUpdate, RealtimeUpdate, StaticUpdate,
};
