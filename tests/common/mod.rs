// Shared test helpers
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use fleetstat::metrics_store::MetricsStore;
use fleetstat::models::*;
use tempfile::TempDir;

/// Unix ms for a UTC calendar instant.
pub fn utc_ms(year: i32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> i64 {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .unwrap()
        .timestamp_millis()
}

pub fn record(agent_id: &str, timestamp: i64, cpu_percent: f64, mem_percent: f64) -> MetricsRecord {
    MetricsRecord {
        agent_id: agent_id.to_string(),
        timestamp,
        cpu_percent,
        mem_percent,
        ..Default::default()
    }
}

/// Store backed by a fresh on-disk database. Keep the TempDir alive for the test.
pub async fn temp_store() -> (TempDir, Arc<MetricsStore>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("metrics.db");
    let store = MetricsStore::connect(path.to_str().unwrap(), 2).await.unwrap();
    store.init().await.unwrap();
    (dir, Arc::new(store))
}

pub fn snapshot(cpu_usage: f64, memory_total: u64, memory_used: u64) -> Snapshot {
    Snapshot {
        cpu: CpuStats {
            usage_percent: cpu_usage,
            ..Default::default()
        },
        memory: MemoryStats {
            total: memory_total,
            used: memory_used,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn realtime(cpu_usage: f64) -> RealtimeUpdate {
    RealtimeUpdate {
        cpu_usage,
        ..Default::default()
    }
}
