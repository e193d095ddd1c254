// Summary tables schema + pure aggregation logic (bucketed means, hourly and daily rollups).
// DB access for reading and writing rows stays in metrics_store::mod.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::models::{DailySummary, HourlySummary, MetricsRecord};
use sqlx::SqlitePool;

pub const MS_PER_MINUTE: i64 = 60_000;
pub const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// Creates metrics_hourly and metrics_daily if not present. Both are shared across months.
pub async fn init_summary_tables(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metrics_hourly (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_id TEXT NOT NULL,
            hour_start INTEGER NOT NULL,
            cpu_avg REAL NOT NULL,
            cpu_max REAL NOT NULL,
            mem_avg REAL NOT NULL,
            mem_max REAL NOT NULL,
            net_rx_total INTEGER NOT NULL,
            net_tx_total INTEGER NOT NULL,
            data_points INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_hourly_agent_hour ON metrics_hourly(agent_id, hour_start)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS metrics_daily (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_id TEXT NOT NULL,
            day_start INTEGER NOT NULL,
            cpu_avg REAL NOT NULL,
            cpu_max REAL NOT NULL,
            mem_avg REAL NOT NULL,
            mem_max REAL NOT NULL,
            net_rx_total INTEGER NOT NULL,
            net_tx_total INTEGER NOT NULL,
            data_points INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_daily_agent_day ON metrics_daily(agent_id, day_start)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Fixed bucket widths accepted by aggregated queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketWidth {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    OneDay,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bucket width {0:?} (expected 1m, 5m, 15m, 1h or 1d)")]
pub struct ParseBucketWidthError(pub String);

impl FromStr for BucketWidth {
    type Err = ParseBucketWidthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(BucketWidth::OneMinute),
            "5m" => Ok(BucketWidth::FiveMinutes),
            "15m" => Ok(BucketWidth::FifteenMinutes),
            "1h" => Ok(BucketWidth::OneHour),
            "1d" => Ok(BucketWidth::OneDay),
            other => Err(ParseBucketWidthError(other.to_owned())),
        }
    }
}

impl fmt::Display for BucketWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BucketWidth::OneMinute => "1m",
            BucketWidth::FiveMinutes => "5m",
            BucketWidth::FifteenMinutes => "15m",
            BucketWidth::OneHour => "1h",
            BucketWidth::OneDay => "1d",
        };
        f.write_str(s)
    }
}

impl BucketWidth {
    pub fn millis(self) -> i64 {
        match self {
            BucketWidth::OneMinute => MS_PER_MINUTE,
            BucketWidth::FiveMinutes => 5 * MS_PER_MINUTE,
            BucketWidth::FifteenMinutes => 15 * MS_PER_MINUTE,
            BucketWidth::OneHour => MS_PER_HOUR,
            BucketWidth::OneDay => MS_PER_DAY,
        }
    }

    /// Smallest range gets the smallest bucket: <=1h 1m, <=6h 5m, <=24h 15m, <=7d 1h, else 1d.
    pub fn for_range(range_ms: i64) -> Self {
        if range_ms <= MS_PER_HOUR {
            BucketWidth::OneMinute
        } else if range_ms <= 6 * MS_PER_HOUR {
            BucketWidth::FiveMinutes
        } else if range_ms <= MS_PER_DAY {
            BucketWidth::FifteenMinutes
        } else if range_ms <= 7 * MS_PER_DAY {
            BucketWidth::OneHour
        } else {
            BucketWidth::OneDay
        }
    }

    /// Named width when `interval` is one, otherwise chosen from the range length.
    pub fn resolve(interval: Option<&str>, range_ms: i64) -> Self {
        interval
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| Self::for_range(range_ms))
    }
}

/// floor(ts / width) * width, also for timestamps before the epoch.
pub fn bucket_start(ts_ms: i64, width_ms: i64) -> i64 {
    ts_ms.div_euclid(width_ms) * width_ms
}

#[derive(Default)]
struct BucketAccumulator {
    cpu_sum: f64,
    mem_sum: f64,
    disk_read_sum: u128,
    disk_write_sum: u128,
    net_rx_sum: u128,
    net_tx_sum: u128,
    gpu_sum: f64,
    load_sum: f64,
    count: u64,
}

impl BucketAccumulator {
    fn add(&mut self, r: &MetricsRecord) {
        self.cpu_sum += r.cpu_percent;
        self.mem_sum += r.mem_percent;
        self.disk_read_sum += r.disk_read_bps as u128;
        self.disk_write_sum += r.disk_write_bps as u128;
        self.net_rx_sum += r.net_rx_bps as u128;
        self.net_tx_sum += r.net_tx_bps as u128;
        self.gpu_sum += r.gpu_percent;
        self.load_sum += r.load_avg1;
        self.count += 1;
    }

    fn into_record(self, agent_id: String, timestamp: i64) -> MetricsRecord {
        let n = self.count.max(1);
        let mean_u64 = |sum: u128| (sum / n as u128) as u64;
        MetricsRecord {
            agent_id,
            timestamp,
            cpu_percent: self.cpu_sum / n as f64,
            mem_percent: self.mem_sum / n as f64,
            disk_read_bps: mean_u64(self.disk_read_sum),
            disk_write_bps: mean_u64(self.disk_write_sum),
            net_rx_bps: mean_u64(self.net_rx_sum),
            net_tx_bps: mean_u64(self.net_tx_sum),
            gpu_percent: self.gpu_sum / n as f64,
            load_avg1: self.load_sum / n as f64,
        }
    }
}

/// Groups records by bucket start and averages every scalar field. One output row per
/// non-empty bucket, ascending, timestamped at the bucket start.
pub fn bucket_records(records: &[MetricsRecord], width: BucketWidth) -> Vec<MetricsRecord> {
    let width_ms = width.millis();
    let mut buckets: BTreeMap<i64, (String, BucketAccumulator)> = BTreeMap::new();
    for r in records {
        let start = bucket_start(r.timestamp, width_ms);
        buckets
            .entry(start)
            .or_insert_with(|| (r.agent_id.clone(), BucketAccumulator::default()))
            .1
            .add(r);
    }
    buckets
        .into_iter()
        .map(|(start, (agent_id, acc))| acc.into_record(agent_id, start))
        .collect()
}

/// Rolls one hour of raw records for a single agent. None when there are no records.
pub fn summarize_hour(
    agent_id: &str,
    hour_start: i64,
    records: &[MetricsRecord],
) -> Option<HourlySummary> {
    if records.is_empty() {
        return None;
    }

    let count = records.len() as f64;
    let cpu_avg = records.iter().map(|r| r.cpu_percent).sum::<f64>() / count;
    let mem_avg = records.iter().map(|r| r.mem_percent).sum::<f64>() / count;
    let cpu_max = records
        .iter()
        .map(|r| r.cpu_percent)
        .fold(f64::NEG_INFINITY, f64::max);
    let mem_max = records
        .iter()
        .map(|r| r.mem_percent)
        .fold(f64::NEG_INFINITY, f64::max);
    let net_rx_total = records
        .iter()
        .fold(0u64, |acc, r| acc.saturating_add(r.net_rx_bps));
    let net_tx_total = records
        .iter()
        .fold(0u64, |acc, r| acc.saturating_add(r.net_tx_bps));

    Some(HourlySummary {
        agent_id: agent_id.to_owned(),
        hour_start,
        cpu_avg,
        cpu_max,
        mem_avg,
        mem_max,
        net_rx_total,
        net_tx_total,
        data_points: records.len() as i64,
    })
}

/// Rolls one day of hourly rows for a single agent; averages are weighted by data points.
pub fn summarize_day(
    agent_id: &str,
    day_start: i64,
    hours: &[HourlySummary],
) -> Option<DailySummary> {
    let data_points: i64 = hours.iter().map(|h| h.data_points).sum();
    if hours.is_empty() || data_points <= 0 {
        return None;
    }

    let weight = data_points as f64;
    let cpu_avg = hours
        .iter()
        .map(|h| h.cpu_avg * h.data_points as f64)
        .sum::<f64>()
        / weight;
    let mem_avg = hours
        .iter()
        .map(|h| h.mem_avg * h.data_points as f64)
        .sum::<f64>()
        / weight;
    let cpu_max = hours
        .iter()
        .map(|h| h.cpu_max)
        .fold(f64::NEG_INFINITY, f64::max);
    let mem_max = hours
        .iter()
        .map(|h| h.mem_max)
        .fold(f64::NEG_INFINITY, f64::max);

    Some(DailySummary {
        agent_id: agent_id.to_owned(),
        day_start,
        cpu_avg,
        cpu_max,
        mem_avg,
        mem_max,
        net_rx_total: hours
            .iter()
            .fold(0u64, |acc, h| acc.saturating_add(h.net_rx_total)),
        net_tx_total: hours
            .iter()
            .fold(0u64, |acc, h| acc.saturating_add(h.net_tx_total)),
        data_points,
    })
}
