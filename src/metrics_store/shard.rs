// Monthly shard routing. One raw table per UTC calendar month: metrics_history_YYYY_MM.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use sqlx::SqlitePool;

pub const SHARD_PREFIX: &str = "metrics_history_";

/// Table name for (year, month). Pure: same input, same name.
pub fn shard_table_name(year: i32, month: u32) -> String {
    format!("{}{:04}_{:02}", SHARD_PREFIX, year, month)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardId {
    pub year: i32,
    pub month: u32,
}

impl ShardId {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Shard holding a Unix-ms timestamp.
    pub fn containing(ts_ms: i64) -> anyhow::Result<Self> {
        let dt = DateTime::<Utc>::from_timestamp_millis(ts_ms)
            .ok_or_else(|| anyhow::anyhow!("timestamp out of range: {}", ts_ms))?;
        Ok(Self {
            year: dt.year(),
            month: dt.month(),
        })
    }

    /// Inverse of `table_name`; None for anything that is not a raw shard.
    pub fn parse(table: &str) -> Option<Self> {
        let rest = table.strip_prefix(SHARD_PREFIX)?;
        let (year, month) = rest.split_once('_')?;
        if year.len() != 4 || month.len() != 2 {
            return None;
        }
        Self::new(year.parse().ok()?, month.parse().ok()?)
    }

    pub fn table_name(&self) -> String {
        shard_table_name(self.year, self.month)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Unix ms of the first instant of the month.
    pub fn start_ms(&self) -> i64 {
        month_start_ms(self.year, self.month)
    }

    /// Unix ms of the first instant of the following month (exclusive end).
    pub fn end_ms(&self) -> i64 {
        let next = self.next();
        month_start_ms(next.year, next.month)
    }

    /// Whether any instant of this month lies in [start_ms, end_ms].
    pub fn overlaps(&self, start_ms: i64, end_ms: i64) -> bool {
        self.start_ms() <= end_ms && self.end_ms() > start_ms
    }
}

fn month_start_ms(year: i32, month: u32) -> i64 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt).timestamp_millis())
        .unwrap_or(i64::MAX)
}

/// The shards in `existing` whose month overlaps [start_ms, end_ms], both boundary months
/// included, in input order. Empty when start_ms > end_ms. Any i64 bounds are accepted:
/// only months that have a table are considered, so an open-ended window costs nothing extra.
pub fn shards_in_window(existing: &[ShardId], start_ms: i64, end_ms: i64) -> Vec<ShardId> {
    if start_ms > end_ms {
        return Vec::new();
    }
    existing
        .iter()
        .copied()
        .filter(|s| s.overlaps(start_ms, end_ms))
        .collect()
}

/// Create the shard table and its indexes if missing.
pub(super) async fn create_shard_table(pool: &SqlitePool, shard: ShardId) -> anyhow::Result<()> {
    let table = shard.table_name();
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            agent_id TEXT NOT NULL,
            timestamp INTEGER NOT NULL,
            cpu_percent REAL NOT NULL,
            mem_percent REAL NOT NULL,
            disk_read_bps INTEGER NOT NULL,
            disk_write_bps INTEGER NOT NULL,
            net_rx_bps INTEGER NOT NULL,
            net_tx_bps INTEGER NOT NULL,
            gpu_percent REAL NOT NULL,
            load_avg1 REAL NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_agent_time ON {table}(agent_id, timestamp)"
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_time ON {table}(timestamp)"
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn shard_exists(pool: &SqlitePool, shard: ShardId) -> anyhow::Result<bool> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
    )
    .bind(shard.table_name())
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// All raw shards present in the database, oldest first.
pub(super) async fn list_shards(pool: &SqlitePool) -> anyhow::Result<Vec<ShardId>> {
    let names = sqlx::query_scalar::<_, String>(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'metrics_history_%'",
    )
    .fetch_all(pool)
    .await?;
    let mut shards: Vec<ShardId> = names.iter().filter_map(|n| ShardId::parse(n)).collect();
    shards.sort();
    Ok(shards)
}
