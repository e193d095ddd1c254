// SQLite time-series store. Raw records live in one table per UTC month (see shard.rs);
// hourly and daily summaries live in two shared tables (see aggregation.rs).
// Every operation runs under one store lock: rollup and cleanup never see a half-written
// insert, and an insert never lands in a shard that is being dropped.

pub mod aggregation;
pub mod shard;

use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use std::str::FromStr;

use crate::models::{DailySummary, HourlySummary, MetricsRecord};
use aggregation::{BucketWidth, MS_PER_DAY, MS_PER_HOUR};
use shard::ShardId;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::Mutex;
use tracing::{instrument, warn};

const RECORD_COLUMNS: &str = "agent_id, timestamp, cpu_percent, mem_percent, disk_read_bps, disk_write_bps, net_rx_bps, net_tx_bps, gpu_percent, load_avg1";

const SUMMARY_COLUMNS: &str =
    "cpu_avg, cpu_max, mem_avg, mem_max, net_rx_total, net_tx_total, data_points";

/// How long each kind of row is kept, in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub raw_days: u32,
    pub hourly_days: u32,
    pub daily_days: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollupReport {
    pub agents: usize,
    pub rows_written: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub shards_dropped: usize,
    pub raw_rows_deleted: u64,
    pub hourly_rows_deleted: u64,
    pub daily_rows_deleted: u64,
    pub failures: usize,
}

/// Shards already created in this process lifetime.
#[derive(Default)]
struct StoreState {
    ensured: HashSet<ShardId>,
}

pub struct MetricsStore {
    pool: SqlitePool,
    state: Mutex<StoreState>,
}

impl MetricsStore {
    /// Connect to SQLite at `path`, creating the parent dir and DB if missing; WAL + pragmas.
    pub async fn connect(path: &str, max_connections: u32) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(opts)
            .await?;
        Ok(Self {
            pool,
            state: Mutex::new(StoreState::default()),
        })
    }

    /// Summary tables plus the current month's shard. Safe to call repeatedly.
    pub async fn init(&self) -> anyhow::Result<()> {
        aggregation::init_summary_tables(&self.pool).await?;
        let current = ShardId::containing(chrono::Utc::now().timestamp_millis())?;
        let mut state = self.state.lock().await;
        self.ensure_shard(&mut state, current).await?;
        Ok(())
    }

    async fn ensure_shard(&self, state: &mut StoreState, shard: ShardId) -> anyhow::Result<()> {
        if state.ensured.contains(&shard) {
            return Ok(());
        }
        shard::create_shard_table(&self.pool, shard).await?;
        state.ensured.insert(shard);
        tracing::debug!(table = %shard.table_name(), "shard ready");
        Ok(())
    }

    /// Insert one record into the shard of its month.
    #[instrument(skip(self, record), fields(repo = "metrics", operation = "save_record", agent_id = %record.agent_id))]
    pub async fn save_record(&self, record: &MetricsRecord) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        self.insert_record(&mut state, record).await
    }

    /// Insert each record on its own; a failed insert is logged and only that point is lost.
    /// Returns how many were written.
    #[instrument(skip(self, records), fields(repo = "metrics", operation = "save_records", records_count = records.len()))]
    pub async fn save_records(&self, records: &[MetricsRecord]) -> usize {
        let mut state = self.state.lock().await;
        let mut saved = 0;
        for record in records {
            match self.insert_record(&mut state, record).await {
                Ok(()) => saved += 1,
                Err(e) => warn!(
                    error = %e,
                    agent_id = %record.agent_id,
                    timestamp = record.timestamp,
                    "insert failed; point dropped"
                ),
            }
        }
        saved
    }

    async fn insert_record(
        &self,
        state: &mut StoreState,
        record: &MetricsRecord,
    ) -> anyhow::Result<()> {
        let shard = ShardId::containing(record.timestamp)?;
        self.ensure_shard(state, shard).await?;
        sqlx::query(&format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            shard.table_name(),
            RECORD_COLUMNS
        ))
        .bind(&record.agent_id)
        .bind(record.timestamp)
        .bind(record.cpu_percent)
        .bind(record.mem_percent)
        .bind(record.disk_read_bps as i64)
        .bind(record.disk_write_bps as i64)
        .bind(record.net_rx_bps as i64)
        .bind(record.net_tx_bps as i64)
        .bind(record.gpu_percent)
        .bind(record.load_avg1)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Raw records for `agent_id` with timestamp in [start_ms, end_ms], ascending.
    ///
    /// Only shards that exist are read, so missing months and open-ended windows (e.g. end =
    /// i64::MAX) count as empty. `limit` (0 = none) is applied to each shard on its own,
    /// so a range spanning two months can return up to twice `limit` rows.
    #[instrument(skip(self), fields(repo = "metrics", operation = "query_range"))]
    pub async fn query_range(
        &self,
        agent_id: &str,
        start_ms: i64,
        end_ms: i64,
        limit: u32,
    ) -> anyhow::Result<Vec<MetricsRecord>> {
        let _state = self.state.lock().await;
        self.query_range_locked(agent_id, start_ms, end_ms, limit)
            .await
    }

    /// `query_range` without a limit, averaged into buckets. `interval` is a named width
    /// (1m, 5m, 15m, 1h, 1d); anything else picks a width from the range length.
    #[instrument(skip(self), fields(repo = "metrics", operation = "query_aggregated"))]
    pub async fn query_aggregated(
        &self,
        agent_id: &str,
        start_ms: i64,
        end_ms: i64,
        interval: Option<&str>,
    ) -> anyhow::Result<Vec<MetricsRecord>> {
        let raw = {
            let _state = self.state.lock().await;
            self.query_range_locked(agent_id, start_ms, end_ms, 0)
                .await?
        };
        if raw.is_empty() {
            return Ok(raw);
        }
        let width = BucketWidth::resolve(interval, end_ms.saturating_sub(start_ms));
        Ok(aggregation::bucket_records(&raw, width))
    }

    async fn query_range_locked(
        &self,
        agent_id: &str,
        start_ms: i64,
        end_ms: i64,
        limit: u32,
    ) -> anyhow::Result<Vec<MetricsRecord>> {
        let mut out = Vec::new();
        let existing = shard::list_shards(&self.pool).await?;
        for shard in shard::shards_in_window(&existing, start_ms, end_ms) {
            let mut sql = format!(
                "SELECT {} FROM {} WHERE agent_id = $1 AND timestamp >= $2 AND timestamp <= $3 ORDER BY timestamp ASC, id ASC",
                RECORD_COLUMNS,
                shard.table_name()
            );
            if limit > 0 {
                sql.push_str(" LIMIT $4");
            }
            let mut query = sqlx::query(&sql).bind(agent_id).bind(start_ms).bind(end_ms);
            if limit > 0 {
                query = query.bind(limit as i64);
            }
            match query.fetch_all(&self.pool).await {
                Ok(rows) => {
                    for row in rows {
                        out.push(parse_record_row(&row)?);
                    }
                }
                Err(e) => {
                    warn!(error = %e, table = %shard.table_name(), "shard query failed; skipping");
                }
            }
        }
        Ok(out)
    }

    /// Records in the half-open window [start_ms, end_ms) for one agent, ascending.
    async fn records_in_window(
        &self,
        agent_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> anyhow::Result<Vec<MetricsRecord>> {
        let mut out = Vec::new();
        let existing = shard::list_shards(&self.pool).await?;
        for shard in shard::shards_in_window(&existing, start_ms, end_ms.saturating_sub(1)) {
            let rows = sqlx::query(&format!(
                "SELECT {} FROM {} WHERE agent_id = $1 AND timestamp >= $2 AND timestamp < $3 ORDER BY timestamp ASC, id ASC",
                RECORD_COLUMNS,
                shard.table_name()
            ))
            .bind(agent_id)
            .bind(start_ms)
            .bind(end_ms)
            .fetch_all(&self.pool)
            .await?;
            for row in rows {
                out.push(parse_record_row(&row)?);
            }
        }
        Ok(out)
    }

    /// Distinct agents with at least one raw record in [start_ms, end_ms), sorted.
    async fn agents_with_data(&self, start_ms: i64, end_ms: i64) -> anyhow::Result<Vec<String>> {
        let mut agents = BTreeSet::new();
        let existing = shard::list_shards(&self.pool).await?;
        for shard in shard::shards_in_window(&existing, start_ms, end_ms.saturating_sub(1)) {
            let ids = sqlx::query_scalar::<_, String>(&format!(
                "SELECT DISTINCT agent_id FROM {} WHERE timestamp >= $1 AND timestamp < $2",
                shard.table_name()
            ))
            .bind(start_ms)
            .bind(end_ms)
            .fetch_all(&self.pool)
            .await?;
            agents.extend(ids);
        }
        Ok(agents.into_iter().collect())
    }

    /// Summarize [hour_start, hour_start + 1h) for every agent that reported in it.
    /// Re-running the same hour replaces its rows.
    #[instrument(skip(self), fields(repo = "metrics", operation = "rollup_hour"))]
    pub async fn rollup_hour(&self, hour_start: i64) -> anyhow::Result<RollupReport> {
        let _state = self.state.lock().await;
        let hour_end = hour_start + MS_PER_HOUR;
        let agents = self.agents_with_data(hour_start, hour_end).await?;
        let mut report = RollupReport {
            agents: agents.len(),
            ..Default::default()
        };

        for agent_id in &agents {
            let result: anyhow::Result<bool> = async {
                let records = self.records_in_window(agent_id, hour_start, hour_end).await?;
                match aggregation::summarize_hour(agent_id, hour_start, &records) {
                    Some(summary) => self.upsert_hourly(&summary).await.map(|_| true),
                    None => Ok(false),
                }
            }
            .await;
            match result {
                Ok(true) => report.rows_written += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failures += 1;
                    warn!(error = %e, agent_id = %agent_id, hour_start, "hourly rollup failed for agent");
                }
            }
        }
        Ok(report)
    }

    async fn upsert_hourly(&self, s: &HourlySummary) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO metrics_hourly (agent_id, hour_start, {}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            SUMMARY_COLUMNS
        ))
        .bind(&s.agent_id)
        .bind(s.hour_start)
        .bind(s.cpu_avg)
        .bind(s.cpu_max)
        .bind(s.mem_avg)
        .bind(s.mem_max)
        .bind(s.net_rx_total as i64)
        .bind(s.net_tx_total as i64)
        .bind(s.data_points)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Summarize the UTC day starting at `day_start` from its hourly rows.
    #[instrument(skip(self), fields(repo = "metrics", operation = "rollup_day"))]
    pub async fn rollup_day(&self, day_start: i64) -> anyhow::Result<RollupReport> {
        let _state = self.state.lock().await;
        let day_end = day_start + MS_PER_DAY;
        let agents = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT agent_id FROM metrics_hourly WHERE hour_start >= $1 AND hour_start < $2 ORDER BY agent_id",
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_all(&self.pool)
        .await?;
        let mut report = RollupReport {
            agents: agents.len(),
            ..Default::default()
        };

        for agent_id in &agents {
            let result: anyhow::Result<bool> = async {
                let hours = self.hourly_in_window(agent_id, day_start, day_end).await?;
                match aggregation::summarize_day(agent_id, day_start, &hours) {
                    Some(summary) => self.upsert_daily(&summary).await.map(|_| true),
                    None => Ok(false),
                }
            }
            .await;
            match result {
                Ok(true) => report.rows_written += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failures += 1;
                    warn!(error = %e, agent_id = %agent_id, day_start, "daily rollup failed for agent");
                }
            }
        }
        Ok(report)
    }

    async fn upsert_daily(&self, s: &DailySummary) -> anyhow::Result<()> {
        sqlx::query(&format!(
            "INSERT OR REPLACE INTO metrics_daily (agent_id, day_start, {}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            SUMMARY_COLUMNS
        ))
        .bind(&s.agent_id)
        .bind(s.day_start)
        .bind(s.cpu_avg)
        .bind(s.cpu_max)
        .bind(s.mem_avg)
        .bind(s.mem_max)
        .bind(s.net_rx_total as i64)
        .bind(s.net_tx_total as i64)
        .bind(s.data_points)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn hourly_in_window(
        &self,
        agent_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> anyhow::Result<Vec<HourlySummary>> {
        let rows = sqlx::query(&format!(
            "SELECT agent_id, hour_start, {} FROM metrics_hourly
             WHERE agent_id = $1 AND hour_start >= $2 AND hour_start < $3 ORDER BY hour_start ASC",
            SUMMARY_COLUMNS
        ))
        .bind(agent_id)
        .bind(start_ms)
        .bind(end_ms)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(parse_hourly_row(&row)?);
        }
        Ok(out)
    }

    /// Hourly rows with hour_start in [start_ms, end_ms], ascending.
    pub async fn hourly_summaries(
        &self,
        agent_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> anyhow::Result<Vec<HourlySummary>> {
        let _state = self.state.lock().await;
        self.hourly_in_window(agent_id, start_ms, end_ms.saturating_add(1))
            .await
    }

    /// Daily rows with day_start in [start_ms, end_ms], ascending.
    pub async fn daily_summaries(
        &self,
        agent_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> anyhow::Result<Vec<DailySummary>> {
        let _state = self.state.lock().await;
        let rows = sqlx::query(&format!(
            "SELECT agent_id, day_start, {} FROM metrics_daily
             WHERE agent_id = $1 AND day_start >= $2 AND day_start <= $3 ORDER BY day_start ASC",
            SUMMARY_COLUMNS
        ))
        .bind(agent_id)
        .bind(start_ms)
        .bind(end_ms)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(parse_daily_row(&row)?);
        }
        Ok(out)
    }

    /// Drop raw shards whose whole month is past raw retention, trim older rows from the shard
    /// holding the cutoff, and delete expired summary rows. Failures are logged per step and
    /// the remaining steps still run.
    #[instrument(skip(self), fields(repo = "metrics", operation = "cleanup"))]
    pub async fn cleanup(&self, now_ms: i64, policy: &RetentionPolicy) -> CleanupReport {
        let mut state = self.state.lock().await;
        let mut report = CleanupReport::default();

        let raw_cutoff = now_ms - policy.raw_days as i64 * MS_PER_DAY;
        match ShardId::containing(raw_cutoff) {
            Ok(cutoff_shard) => match shard::list_shards(&self.pool).await {
                Ok(shards) => {
                    for s in shards {
                        let table = s.table_name();
                        if s < cutoff_shard {
                            match sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                                .execute(&self.pool)
                                .await
                            {
                                Ok(_) => {
                                    state.ensured.remove(&s);
                                    report.shards_dropped += 1;
                                    tracing::info!(table = %table, "dropped expired shard");
                                }
                                Err(e) => {
                                    report.failures += 1;
                                    warn!(error = %e, table = %table, "failed to drop shard");
                                }
                            }
                        } else if s == cutoff_shard {
                            match sqlx::query(&format!(
                                "DELETE FROM {} WHERE timestamp < $1",
                                table
                            ))
                            .bind(raw_cutoff)
                            .execute(&self.pool)
                            .await
                            {
                                Ok(r) => report.raw_rows_deleted += r.rows_affected(),
                                Err(e) => {
                                    report.failures += 1;
                                    warn!(error = %e, table = %table, "failed to trim shard");
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    report.failures += 1;
                    warn!(error = %e, "failed to list shards");
                }
            },
            Err(e) => {
                report.failures += 1;
                warn!(error = %e, "invalid raw retention cutoff");
            }
        }

        let hourly_cutoff = now_ms - policy.hourly_days as i64 * MS_PER_DAY;
        match sqlx::query("DELETE FROM metrics_hourly WHERE hour_start < $1")
            .bind(hourly_cutoff)
            .execute(&self.pool)
            .await
        {
            Ok(r) => report.hourly_rows_deleted = r.rows_affected(),
            Err(e) => {
                report.failures += 1;
                warn!(error = %e, "failed to prune hourly summaries");
            }
        }

        let daily_cutoff = now_ms - policy.daily_days as i64 * MS_PER_DAY;
        match sqlx::query("DELETE FROM metrics_daily WHERE day_start < $1")
            .bind(daily_cutoff)
            .execute(&self.pool)
            .await
        {
            Ok(r) => report.daily_rows_deleted = r.rows_affected(),
            Err(e) => {
                report.failures += 1;
                warn!(error = %e, "failed to prune daily summaries");
            }
        }

        report
    }

    /// Raw shards currently present, oldest first.
    pub async fn list_shards(&self) -> anyhow::Result<Vec<ShardId>> {
        shard::list_shards(&self.pool).await
    }

    pub async fn shard_exists(&self, shard: ShardId) -> anyhow::Result<bool> {
        shard::shard_exists(&self.pool, shard).await
    }

    /// Reclaim space after deletes (run after cleanup).
    #[instrument(skip(self), fields(repo = "metrics", operation = "vacuum"))]
    pub async fn vacuum(&self) -> anyhow::Result<()> {
        let _state = self.state.lock().await;
        sqlx::query("VACUUM").execute(&self.pool).await?;
        Ok(())
    }
}

fn parse_record_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<MetricsRecord> {
    Ok(MetricsRecord {
        agent_id: row.try_get("agent_id")?,
        timestamp: row.try_get("timestamp")?,
        cpu_percent: row.try_get("cpu_percent")?,
        mem_percent: row.try_get("mem_percent")?,
        disk_read_bps: row.try_get::<i64, _>("disk_read_bps")? as u64,
        disk_write_bps: row.try_get::<i64, _>("disk_write_bps")? as u64,
        net_rx_bps: row.try_get::<i64, _>("net_rx_bps")? as u64,
        net_tx_bps: row.try_get::<i64, _>("net_tx_bps")? as u64,
        gpu_percent: row.try_get("gpu_percent")?,
        load_avg1: row.try_get("load_avg1")?,
    })
}

fn parse_hourly_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<HourlySummary> {
    Ok(HourlySummary {
        agent_id: row.try_get("agent_id")?,
        hour_start: row.try_get("hour_start")?,
        cpu_avg: row.try_get("cpu_avg")?,
        cpu_max: row.try_get("cpu_max")?,
        mem_avg: row.try_get("mem_avg")?,
        mem_max: row.try_get("mem_max")?,
        net_rx_total: row.try_get::<i64, _>("net_rx_total")? as u64,
        net_tx_total: row.try_get::<i64, _>("net_tx_total")? as u64,
        data_points: row.try_get("data_points")?,
    })
}

fn parse_daily_row(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<DailySummary> {
    Ok(DailySummary {
        agent_id: row.try_get("agent_id")?,
        day_start: row.try_get("day_start")?,
        cpu_avg: row.try_get("cpu_avg")?,
        cpu_max: row.try_get("cpu_max")?,
        mem_avg: row.try_get("mem_avg")?,
        mem_max: row.try_get("mem_max")?,
        net_rx_total: row.try_get::<i64, _>("net_rx_total")? as u64,
        net_tx_total: row.try_get::<i64, _>("net_tx_total")? as u64,
        data_points: row.try_get("data_points")?,
    })
}
