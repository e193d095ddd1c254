// Integration tests: HTTP endpoints over a real service and on-disk store

mod common;

use std::sync::Arc;

use axum_test::TestServer;
use common::{record, temp_store, utc_ms};
use fleetstat::live_cache::LiveCache;
use fleetstat::metrics_store::MetricsStore;
use fleetstat::models::*;
use fleetstat::routes;
use fleetstat::service::MetricsService;
use tempfile::TempDir;

async fn test_server() -> (TempDir, Arc<MetricsStore>, TestServer) {
    let (dir, store) = temp_store().await;
    let service = Arc::new(MetricsService::new(LiveCache::new(10), store.clone(), None));
    let server = TestServer::new(routes::app(service));
    (dir, store, server)
}

#[tokio::test]
async fn test_version_endpoint() {
    let (_dir, _store, server) = test_server().await;
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(
        json.get("name").and_then(|v| v.as_str()),
        Some("fleetstat")
    );
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_unknown_agent_is_404() {
    let (_dir, _store, server) = test_server().await;
    server.get("/api/agents/ghost").await.assert_status_not_found();
    server.delete("/api/agents/ghost").await.assert_status_not_found();
}

#[tokio::test]
async fn test_realtime_post_then_get_agent() {
    let (_dir, _store, server) = test_server().await;
    let response = server
        .post("/api/agents/a1/realtime")
        .json(&serde_json::json!({ "cpuUsage": 55.0, "memoryUsed": 2048 }))
        .await;
    response.assert_status_ok();

    let snapshot: Snapshot = server.get("/api/agents/a1").await.json();
    assert_eq!(snapshot.cpu.usage_percent, 55.0);
    assert_eq!(snapshot.memory.used, 2048);

    let agents: serde_json::Value = server.get("/api/agents").await.json();
    assert!(agents.get("a1").is_some());
}

#[tokio::test]
async fn test_static_and_periodic_merge_over_http() {
    let (_dir, _store, server) = test_server().await;
    server
        .post("/api/agents/a1/static")
        .json(&StaticUpdate {
            disks: vec![DiskInfo {
                device: "sda".to_string(),
                model: "WD Red".to_string(),
                total: 1000,
                ..Default::default()
            }],
            ..Default::default()
        })
        .await
        .assert_status_ok();
    let response = server
        .post("/api/agents/a1/periodic")
        .json(&PeriodicUpdate {
            disk_usage: vec![DiskUsage {
                device: "sda".to_string(),
                used: 400,
                ..Default::default()
            }],
            ..Default::default()
        })
        .await;
    response.assert_status_ok();

    let snapshot: Snapshot = response.json();
    assert_eq!(snapshot.disks.len(), 1);
    let disk = snapshot.disks.get(&"sda".to_string()).unwrap();
    assert_eq!(disk.model, "WD Red");
    assert_eq!(disk.total, 1000);
    assert_eq!(disk.used, 400);
}

#[tokio::test]
async fn test_history_summary_and_delete() {
    let (_dir, _store, server) = test_server().await;
    let mut full = Snapshot::default();
    full.cpu.usage_percent = 20.0;
    full.memory.total = 1000;
    full.memory.used = 500;
    server
        .post("/api/agents/a1/metrics")
        .json(&full)
        .await
        .assert_status_ok();
    server
        .post("/api/agents/a1/realtime")
        .json(&RealtimeUpdate {
            cpu_usage: 40.0,
            memory_used: 500,
            ..Default::default()
        })
        .await
        .assert_status_ok();

    let history: Vec<Snapshot> = server.get("/api/agents/a1/history").await.json();
    assert_eq!(history.len(), 2);
    let last: Vec<Snapshot> = server
        .get("/api/agents/a1/history")
        .add_query_param("limit", 1)
        .await
        .json();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].cpu.usage_percent, 40.0);

    let summary: serde_json::Value = server.get("/api/summary").await.json();
    assert_eq!(summary["agentCount"], 1);
    assert_eq!(summary["memoryPercent"], 50.0);

    server.delete("/api/agents/a1").await.assert_status(axum::http::StatusCode::NO_CONTENT);
    server.get("/api/agents/a1").await.assert_status_not_found();
}

#[tokio::test]
async fn test_all_history_endpoint() {
    let (_dir, _store, server) = test_server().await;
    for (agent, cpu) in [("a1", 10.0), ("a1", 20.0), ("a1", 30.0), ("a2", 5.0)] {
        server
            .post(&format!("/api/agents/{agent}/realtime"))
            .json(&RealtimeUpdate {
                cpu_usage: cpu,
                ..Default::default()
            })
            .await
            .assert_status_ok();
    }

    let all: std::collections::HashMap<String, Vec<Snapshot>> = server
        .get("/api/history")
        .add_query_param("limit", 2)
        .await
        .json();
    assert_eq!(all.len(), 2);
    let a1: Vec<f64> = all["a1"].iter().map(|s| s.cpu.usage_percent).collect();
    assert_eq!(a1, vec![20.0, 30.0]);
    assert_eq!(all["a2"].len(), 1);
}

#[tokio::test]
async fn test_range_and_aggregated_endpoints() {
    let (_dir, store, server) = test_server().await;
    let base = utc_ms(2024, 1, 31, 23, 0, 0);
    store.save_record(&record("a1", base, 10.0, 10.0)).await.unwrap();
    store.save_record(&record("a1", base + 30_000, 30.0, 10.0)).await.unwrap();
    store
        .save_record(&record("a1", utc_ms(2024, 2, 1, 0, 30, 0), 50.0, 10.0))
        .await
        .unwrap();
    let end = utc_ms(2024, 2, 1, 1, 0, 0);

    let rows: Vec<MetricsRecord> = server
        .get("/api/agents/a1/range")
        .add_query_param("start", base)
        .add_query_param("end", end)
        .await
        .json();
    assert_eq!(rows.len(), 3);

    let rows: Vec<MetricsRecord> = server
        .get("/api/agents/a1/aggregated")
        .add_query_param("start", base)
        .add_query_param("end", end)
        .add_query_param("interval", "1h")
        .await
        .json();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].cpu_percent, 20.0);
    assert_eq!(rows[1].cpu_percent, 50.0);
}

#[tokio::test]
async fn test_inverted_range_is_400() {
    let (_dir, _store, server) = test_server().await;
    server
        .get("/api/agents/a1/range")
        .add_query_param("start", 10)
        .add_query_param("end", 5)
        .await
        .assert_status_bad_request();
    server
        .get("/api/agents/a1/hourly")
        .add_query_param("start", 10)
        .add_query_param("end", 5)
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_hourly_and_daily_endpoints() {
    let (_dir, store, server) = test_server().await;
    let hour = utc_ms(2024, 1, 10, 5, 0, 0);
    store.save_record(&record("a1", hour + 1, 25.0, 10.0)).await.unwrap();
    store.rollup_hour(hour).await.unwrap();
    store.rollup_day(utc_ms(2024, 1, 10, 0, 0, 0)).await.unwrap();

    let hourly: Vec<HourlySummary> = server
        .get("/api/agents/a1/hourly")
        .add_query_param("start", hour)
        .add_query_param("end", hour)
        .await
        .json();
    assert_eq!(hourly.len(), 1);
    assert_eq!(hourly[0].cpu_avg, 25.0);

    let daily: Vec<DailySummary> = server
        .get("/api/agents/a1/daily")
        .add_query_param("start", utc_ms(2024, 1, 1, 0, 0, 0))
        .add_query_param("end", utc_ms(2024, 1, 31, 0, 0, 0))
        .await
        .json();
    assert_eq!(daily.len(), 1);
    assert_eq!(daily[0].data_points, 1);
}
