// Durable store tests: shard routing, range queries across months, aggregated queries

mod common;

use common::{record, temp_store, utc_ms};
use fleetstat::metrics_store::shard::{ShardId, shard_table_name, shards_in_window};
use fleetstat::models::MetricsRecord;

#[test]
fn shard_name_is_deterministic() {
    assert_eq!(shard_table_name(2024, 1), "metrics_history_2024_01");
    assert_eq!(shard_table_name(2024, 12), "metrics_history_2024_12");
    assert_eq!(shard_table_name(2024, 1), shard_table_name(2024, 1));

    let jan = ShardId::containing(utc_ms(2024, 1, 31, 23, 59, 59)).unwrap();
    let feb = ShardId::containing(utc_ms(2024, 2, 1, 0, 0, 0)).unwrap();
    assert_eq!(jan.table_name(), "metrics_history_2024_01");
    assert_eq!(feb.table_name(), "metrics_history_2024_02");
}

#[test]
fn shard_parse_roundtrips_and_rejects_other_tables() {
    let shard = ShardId::new(2023, 7).unwrap();
    assert_eq!(ShardId::parse(&shard.table_name()), Some(shard));
    assert_eq!(ShardId::parse("metrics_hourly"), None);
    assert_eq!(ShardId::parse("metrics_history_2023_13"), None);
    assert!(ShardId::new(2023, 0).is_none());
}

#[test]
fn shard_bounds_cover_the_month() {
    let dec = ShardId::new(2023, 12).unwrap();
    assert_eq!(dec.start_ms(), utc_ms(2023, 12, 1, 0, 0, 0));
    assert_eq!(dec.end_ms(), utc_ms(2024, 1, 1, 0, 0, 0));
    assert_eq!(dec.next(), ShardId::new(2024, 1).unwrap());
}

#[test]
fn shards_in_window_includes_both_boundary_months() {
    let existing: Vec<ShardId> = [(2023, 10), (2023, 11), (2023, 12), (2024, 1), (2024, 2), (2024, 3)]
        .iter()
        .map(|(y, m)| ShardId::new(*y, *m).unwrap())
        .collect();
    let shards = shards_in_window(&existing, utc_ms(2023, 11, 15, 0, 0, 0), utc_ms(2024, 2, 3, 0, 0, 0));
    let names: Vec<String> = shards.iter().map(|s| s.table_name()).collect();
    assert_eq!(
        names,
        vec![
            "metrics_history_2023_11",
            "metrics_history_2023_12",
            "metrics_history_2024_01",
            "metrics_history_2024_02",
        ]
    );
    assert!(shards_in_window(&existing, 10, 5).is_empty());
    assert_eq!(shards_in_window(&existing, i64::MIN, i64::MAX), existing);
}

#[tokio::test]
async fn save_creates_shard_for_record_month() {
    let (_dir, store) = temp_store().await;
    let jan = ShardId::new(2024, 1).unwrap();
    assert!(!store.shard_exists(jan).await.unwrap());

    store
        .save_record(&record("a1", utc_ms(2024, 1, 10, 12, 0, 0), 10.0, 20.0))
        .await
        .unwrap();
    assert!(store.shard_exists(jan).await.unwrap());
    assert!(store.list_shards().await.unwrap().contains(&jan));
}

#[tokio::test]
async fn save_and_query_preserves_fields() {
    let (_dir, store) = temp_store().await;
    let ts = utc_ms(2024, 3, 5, 8, 0, 0);
    let rec = MetricsRecord {
        agent_id: "a1".to_string(),
        timestamp: ts,
        cpu_percent: 12.5,
        mem_percent: 40.0,
        disk_read_bps: 1_000,
        disk_write_bps: 2_000,
        net_rx_bps: 3_000,
        net_tx_bps: 4_000,
        gpu_percent: 75.0,
        load_avg1: 0.5,
    };
    store.save_record(&rec).await.unwrap();

    let rows = store.query_range("a1", ts, ts, 0).await.unwrap();
    assert_eq!(rows, vec![rec]);
}

#[tokio::test]
async fn query_range_spans_two_monthly_shards() {
    let (_dir, store) = temp_store().await;
    let days = [(1, 28), (1, 30), (2, 1), (2, 2)];
    for (i, (month, day)) in days.iter().enumerate() {
        store
            .save_record(&record("a1", utc_ms(2024, *month, *day, 12, 0, 0), i as f64, 0.0))
            .await
            .unwrap();
    }
    store
        .save_record(&record("other", utc_ms(2024, 1, 29, 12, 0, 0), 99.0, 0.0))
        .await
        .unwrap();

    let rows = store
        .query_range("a1", utc_ms(2024, 1, 28, 0, 0, 0), utc_ms(2024, 2, 3, 0, 0, 0), 0)
        .await
        .unwrap();
    let cpus: Vec<f64> = rows.iter().map(|r| r.cpu_percent).collect();
    assert_eq!(cpus, vec![0.0, 1.0, 2.0, 3.0]);
    assert!(rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert!(rows.iter().all(|r| r.agent_id == "a1"));
}

#[tokio::test]
async fn query_range_bounds_are_inclusive() {
    let (_dir, store) = temp_store().await;
    let start = utc_ms(2024, 5, 1, 0, 0, 0);
    let end = start + 10_000;
    for ts in [start - 1, start, end, end + 1] {
        store.save_record(&record("a1", ts, 1.0, 1.0)).await.unwrap();
    }
    let rows = store.query_range("a1", start, end, 0).await.unwrap();
    let stamps: Vec<i64> = rows.iter().map(|r| r.timestamp).collect();
    assert_eq!(stamps, vec![start, end]);
}

#[tokio::test]
async fn query_range_with_missing_shards_is_empty_not_error() {
    let (_dir, store) = temp_store().await;
    let rows = store
        .query_range("a1", utc_ms(2001, 1, 1, 0, 0, 0), utc_ms(2001, 6, 1, 0, 0, 0), 0)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn query_range_start_after_end_is_empty() {
    let (_dir, store) = temp_store().await;
    let ts = utc_ms(2024, 1, 10, 0, 0, 0);
    store.save_record(&record("a1", ts, 1.0, 1.0)).await.unwrap();
    assert!(store.query_range("a1", ts + 1, ts - 1, 0).await.unwrap().is_empty());
}

/// The limit applies to each monthly shard separately, so a two-month range can return 2 * limit.
#[tokio::test]
async fn query_range_limit_is_applied_per_shard() {
    let (_dir, store) = temp_store().await;
    for i in 0..5 {
        store
            .save_record(&record("a1", utc_ms(2024, 1, 20, 0, i, 0), 1.0, 1.0))
            .await
            .unwrap();
        store
            .save_record(&record("a1", utc_ms(2024, 2, 5, 0, i, 0), 2.0, 1.0))
            .await
            .unwrap();
    }

    let rows = store
        .query_range("a1", utc_ms(2024, 1, 1, 0, 0, 0), utc_ms(2024, 2, 28, 0, 0, 0), 3)
        .await
        .unwrap();
    assert_eq!(rows.len(), 6);
    assert_eq!(rows.iter().filter(|r| r.cpu_percent == 1.0).count(), 3);
    assert_eq!(rows.iter().filter(|r| r.cpu_percent == 2.0).count(), 3);
    assert_eq!(rows[0].timestamp, utc_ms(2024, 1, 20, 0, 0, 0));
}

#[tokio::test]
async fn query_aggregated_buckets_by_named_width() {
    let (_dir, store) = temp_store().await;
    let base = utc_ms(2024, 4, 1, 10, 0, 0);
    // Two in the first 5-minute bucket, one in the second.
    store.save_record(&record("a1", base + 10_000, 10.0, 40.0)).await.unwrap();
    store.save_record(&record("a1", base + 200_000, 30.0, 60.0)).await.unwrap();
    store.save_record(&record("a1", base + 310_000, 50.0, 80.0)).await.unwrap();

    let rows = store
        .query_aggregated("a1", base, base + 3_600_000, Some("5m"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].timestamp, base);
    assert_eq!(rows[0].cpu_percent, 20.0);
    assert_eq!(rows[0].mem_percent, 50.0);
    assert_eq!(rows[1].timestamp, base + 300_000);
    assert_eq!(rows[1].cpu_percent, 50.0);
}

#[tokio::test]
async fn query_aggregated_auto_selects_width() {
    let (_dir, store) = temp_store().await;
    let base = utc_ms(2024, 4, 1, 0, 0, 0);
    store.save_record(&record("a1", base + 30_000, 10.0, 0.0)).await.unwrap();
    store.save_record(&record("a1", base + 90_000, 20.0, 0.0)).await.unwrap();

    // One hour range: 1-minute buckets.
    let rows = store
        .query_aggregated("a1", base, base + 3_600_000, None)
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].timestamp, base + 60_000);

    // Unknown interval falls back to auto-selection: two days -> 1h buckets.
    let rows = store
        .query_aggregated("a1", base, base + 2 * 86_400_000, Some("7m"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].timestamp, base);
    assert_eq!(rows[0].cpu_percent, 15.0);
}

#[tokio::test]
async fn query_aggregated_without_data_is_empty() {
    let (_dir, store) = temp_store().await;
    let rows = store
        .query_aggregated("ghost", 0, 3_600_000, Some("1m"))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn open_ended_window_reads_existing_shards_only() {
    let (_dir, store) = temp_store().await;
    let ts = utc_ms(2024, 8, 1, 0, 0, 0);
    store.save_record(&record("a1", ts, 7.0, 1.0)).await.unwrap();

    let rows = store.query_range("a1", 0, i64::MAX, 0).await.unwrap();
    assert_eq!(rows.len(), 1);
    let rows = store.query_range("a1", i64::MIN, i64::MAX, 0).await.unwrap();
    assert_eq!(rows.len(), 1);

    let buckets = store
        .query_aggregated("a1", i64::MIN, i64::MAX, None)
        .await
        .unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].cpu_percent, 7.0);
}

#[tokio::test]
async fn wide_window_does_not_walk_every_month() {
    let (_dir, store) = temp_store().await;
    let ts = utc_ms(2024, 8, 1, 0, 0, 0);
    store.save_record(&record("a1", ts, 7.0, 1.0)).await.unwrap();

    let started = std::time::Instant::now();
    let rows = store
        .query_range("a1", utc_ms(1000, 1, 1, 0, 0, 0), ts, 0)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(started.elapsed() < std::time::Duration::from_millis(200));
}
