// Snapshot merger: folds one partial update into a snapshot in place.
// Later calls win on overlapping fields; there is no timestamp reconciliation between kinds.
// Devices are matched by key (disk device, interface name, GPU/NPU index).

use crate::models::{
    DiskStat, GpuStat, InterfaceStat, NpuStat, PeriodicUpdate, RealtimeUpdate, Snapshot,
    StaticUpdate,
};

/// Overwrites the volatile counters. Unknown devices are appended with only those counters set.
pub fn apply_realtime(snapshot: &mut Snapshot, update: &RealtimeUpdate) {
    snapshot.cpu.usage_percent = update.cpu_usage;
    if !update.cpu_per_core.is_empty() {
        snapshot.cpu.per_core_usage = update.cpu_per_core.clone();
    }
    snapshot.cpu.temperature = update.cpu_temperature;
    snapshot.cpu.frequency_mhz = update.cpu_frequency_mhz;
    snapshot.memory.used = update.memory_used;
    snapshot.memory.cached = update.memory_cached;
    snapshot.memory.swap_used = update.swap_used;
    snapshot.load_average = update.load_average.clone();

    for io in &update.disk_io {
        let apply = |d: &mut DiskStat| {
            d.read_bytes_per_sec = io.read_bytes_per_sec;
            d.write_bytes_per_sec = io.write_bytes_per_sec;
            d.read_iops = io.read_iops;
            d.write_iops = io.write_iops;
        };
        snapshot.disks.upsert_with(
            io.device.clone(),
            || {
                let mut d = DiskStat {
                    device: io.device.clone(),
                    ..Default::default()
                };
                apply(&mut d);
                d
            },
            &apply,
        );
    }

    for io in &update.network_io {
        let apply = |n: &mut InterfaceStat| {
            n.rx_bytes_per_sec = io.rx_bytes_per_sec;
            n.tx_bytes_per_sec = io.tx_bytes_per_sec;
            n.rx_packets_per_sec = io.rx_packets_per_sec;
            n.tx_packets_per_sec = io.tx_packets_per_sec;
            n.is_up = io.is_up;
        };
        snapshot.networks.upsert_with(
            io.interface.clone(),
            || {
                let mut n = InterfaceStat {
                    interface: io.interface.clone(),
                    ..Default::default()
                };
                apply(&mut n);
                n
            },
            &apply,
        );
    }

    for g in &update.gpu_usage {
        let apply = |gpu: &mut GpuStat| {
            gpu.usage_percent = g.usage_percent;
            gpu.memory_used = g.memory_used;
            gpu.temperature = g.temperature;
            gpu.power_watts = g.power_watts;
            gpu.clock_core_mhz = g.clock_core_mhz;
            gpu.clock_memory_mhz = g.clock_memory_mhz;
            gpu.encoder_usage = g.encoder_usage;
            gpu.decoder_usage = g.decoder_usage;
        };
        snapshot.gpus.upsert_with(
            g.index,
            || {
                let mut gpu = GpuStat {
                    index: g.index,
                    ..Default::default()
                };
                apply(&mut gpu);
                gpu
            },
            &apply,
        );
    }

    for n in &update.npu_usage {
        let apply = |npu: &mut NpuStat| {
            npu.usage_percent = n.usage_percent;
            npu.memory_used = n.memory_used;
            npu.temperature = n.temperature;
            npu.power_watts = n.power_watts;
        };
        snapshot.npus.upsert_with(
            n.index,
            || {
                let mut npu = NpuStat {
                    index: n.index,
                    ..Default::default()
                };
                apply(&mut npu);
                npu
            },
            &apply,
        );
    }
}

/// Overwrites descriptive hardware fields. SystemInfo is replaced as a whole.
pub fn apply_static(snapshot: &mut Snapshot, update: &StaticUpdate) {
    if let Some(cpu) = &update.cpu {
        snapshot.cpu.model = cpu.model.clone();
        snapshot.cpu.vendor = cpu.vendor.clone();
        snapshot.cpu.physical_cores = cpu.physical_cores;
        snapshot.cpu.logical_cores = cpu.logical_cores;
        snapshot.cpu.architecture = cpu.architecture.clone();
        snapshot.cpu.frequency_max_mhz = cpu.frequency_max_mhz;
    }

    if let Some(mem) = &update.memory {
        snapshot.memory.total = mem.total;
        snapshot.memory.swap_total = mem.swap_total;
        snapshot.memory.memory_type = mem.memory_type.clone();
        snapshot.memory.memory_speed_mhz = mem.memory_speed_mhz;
    }

    for info in &update.disks {
        let apply = |d: &mut DiskStat| {
            if !info.mount_point.is_empty() {
                d.mount_point = info.mount_point.clone();
            }
            d.model = info.model.clone();
            d.serial = info.serial.clone();
            d.disk_type = info.disk_type.clone();
            d.fs_type = info.fs_type.clone();
            d.health_status = info.health_status.clone();
            if info.total > 0 {
                d.total = info.total;
            }
        };
        snapshot.disks.upsert_with(
            info.device.clone(),
            || {
                let mut d = DiskStat {
                    device: info.device.clone(),
                    ..Default::default()
                };
                apply(&mut d);
                d
            },
            &apply,
        );
    }

    for info in &update.networks {
        let apply = |n: &mut InterfaceStat| {
            n.mac_address = info.mac_address.clone();
            n.ip_addresses = info.ip_addresses.clone();
            n.speed_mbps = info.speed_mbps;
            n.interface_type = info.interface_type.clone();
        };
        snapshot.networks.upsert_with(
            info.interface.clone(),
            || {
                let mut n = InterfaceStat {
                    interface: info.interface.clone(),
                    ..Default::default()
                };
                apply(&mut n);
                n
            },
            &apply,
        );
    }

    for info in &update.gpus {
        let apply = |g: &mut GpuStat| {
            g.name = info.name.clone();
            g.vendor = info.vendor.clone();
            g.memory_total = info.memory_total;
            g.driver_version = info.driver_version.clone();
            g.pcie_generation = info.pcie_generation.clone();
            g.power_limit_watts = info.power_limit_watts;
        };
        snapshot.gpus.upsert_with(
            info.index,
            || {
                let mut g = GpuStat {
                    index: info.index,
                    ..Default::default()
                };
                apply(&mut g);
                g
            },
            &apply,
        );
    }

    for info in &update.npus {
        let apply = |n: &mut NpuStat| {
            n.name = info.name.clone();
            n.vendor = info.vendor.clone();
            n.memory_total = info.memory_total;
            n.driver_version = info.driver_version.clone();
        };
        snapshot.npus.upsert_with(
            info.index,
            || {
                let mut n = NpuStat {
                    index: info.index,
                    ..Default::default()
                };
                apply(&mut n);
                n
            },
            &apply,
        );
    }

    if let Some(system_info) = &update.system_info {
        snapshot.system_info = Some(system_info.clone());
    }
}

/// Disk usage is merged or appended; sessions are replaced; interfaces are only ever updated,
/// never introduced.
pub fn apply_periodic(snapshot: &mut Snapshot, update: &PeriodicUpdate) {
    for usage in &update.disk_usage {
        let apply = |d: &mut DiskStat| {
            if !usage.mount_point.is_empty() {
                d.mount_point = usage.mount_point.clone();
            }
            d.used = usage.used;
            d.available = usage.available;
            d.usage_percent = usage.usage_percent;
            if usage.total > 0 {
                d.total = usage.total;
            }
            if usage.temperature > 0.0 {
                d.temperature = usage.temperature;
            }
        };
        snapshot.disks.upsert_with(
            usage.device.clone(),
            || {
                let mut d = DiskStat {
                    device: usage.device.clone(),
                    ..Default::default()
                };
                apply(&mut d);
                d
            },
            &apply,
        );
    }

    if let Some(sessions) = &update.user_sessions {
        snapshot.user_sessions = sessions.clone();
    }

    for state in &update.network_updates {
        if let Some(n) = snapshot.networks.get_mut(&state.interface) {
            if !state.ip_addresses.is_empty() {
                n.ip_addresses = state.ip_addresses.clone();
            }
            n.is_up = state.is_up;
        }
    }
}
