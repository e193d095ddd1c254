// MetricsService tests: inbound events reach the cache and the record channel

mod common;

use std::sync::Arc;

use common::{realtime, snapshot, temp_store};
use fleetstat::live_cache::LiveCache;
use fleetstat::models::*;
use fleetstat::service::MetricsService;
use tokio::sync::mpsc;

#[tokio::test]
async fn every_inbound_event_emits_a_record() {
    let (_dir, store) = temp_store().await;
    let (tx, mut rx) = mpsc::channel(16);
    let service = MetricsService::new(LiveCache::new(10), store, Some(tx));

    let mut full = snapshot(20.0, 1000, 250);
    full.disks = vec![DiskStat {
        device: "sda".to_string(),
        read_bytes_per_sec: 100,
        ..Default::default()
    }]
    .into();
    service.on_full_metrics("a1", full);
    service.on_realtime_update("a1", &realtime(40.0));
    service.on_static_update("a1", &StaticUpdate::default());
    service.on_periodic_update("a1", &PeriodicUpdate::default());

    let mut records = Vec::new();
    while let Ok(r) = rx.try_recv() {
        records.push(r);
    }
    assert_eq!(records.len(), 4);
    assert_eq!(records[0].agent_id, "a1");
    assert_eq!(records[0].cpu_percent, 20.0);
    assert_eq!(records[0].mem_percent, 25.0);
    assert_eq!(records[0].disk_read_bps, 100);
    assert_eq!(records[1].cpu_percent, 40.0);
    assert!(records.iter().all(|r| r.timestamp > 0));
}

#[tokio::test]
async fn full_channel_drops_points_without_blocking() {
    let (_dir, store) = temp_store().await;
    let (tx, mut rx) = mpsc::channel(1);
    let service = MetricsService::new(LiveCache::new(10), store, Some(tx));

    for i in 0..5 {
        service.on_realtime_update("a1", &realtime(i as f64));
    }
    assert_eq!(service.get_current("a1").unwrap().cpu.usage_percent, 4.0);
    assert_eq!(service.get_history("a1", 0).len(), 5);

    let first = rx.try_recv().unwrap();
    assert_eq!(first.cpu_percent, 0.0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn persistence_disabled_still_serves_live_reads() {
    let (_dir, store) = temp_store().await;
    let service = MetricsService::new(LiveCache::new(10), store, None);
    service.on_realtime_update("a1", &realtime(12.0));
    assert_eq!(service.get_summary().agent_count, 1);
    assert_eq!(service.get_all_current().len(), 1);
}

#[tokio::test]
async fn disconnect_forgets_live_state_only() {
    let (_dir, store) = temp_store().await;
    let service = MetricsService::new(LiveCache::new(10), store.clone(), None);
    let ts = chrono::Utc::now().timestamp_millis();
    store
        .save_record(&MetricsRecord {
            agent_id: "a1".to_string(),
            timestamp: ts,
            cpu_percent: 5.0,
            ..Default::default()
        })
        .await
        .unwrap();
    service.on_realtime_update("a1", &realtime(5.0));

    assert!(service.on_agent_disconnect("a1"));
    assert!(service.get_current("a1").is_none());
    assert!(!service.on_agent_disconnect("a1"));

    let rows = service.query_range("a1", ts, ts, 0).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn broadcast_callback_through_service() {
    let (_dir, store) = temp_store().await;
    let service = Arc::new(MetricsService::new(LiveCache::new(10), store, None));
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    assert!(service.set_broadcast_callback(move |agent_id, _| {
        let _ = tx.send(agent_id.to_string());
    }));

    service.on_realtime_update("a7", &realtime(1.0));
    let got = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got, "a7");
}
