// MetricsService: the one entry point for transports. Inbound updates go to the live cache
// and, when persistence is on, a reduced record is handed to the record writer.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::live_cache::{CacheSummary, LiveCache};
use crate::metrics_store::MetricsStore;
use crate::models::{
    DailySummary, HourlySummary, MetricsRecord, PeriodicUpdate, RealtimeUpdate, Snapshot,
    StaticUpdate,
};

pub struct MetricsService {
    cache: LiveCache,
    store: Arc<MetricsStore>,
    write_tx: Option<mpsc::Sender<MetricsRecord>>,
}

impl MetricsService {
    /// `write_tx` is None when persistence is disabled; reads from the store still work.
    pub fn new(
        cache: LiveCache,
        store: Arc<MetricsStore>,
        write_tx: Option<mpsc::Sender<MetricsRecord>>,
    ) -> Self {
        Self {
            cache,
            store,
            write_tx,
        }
    }

    pub fn cache(&self) -> &LiveCache {
        &self.cache
    }

    pub fn store(&self) -> &Arc<MetricsStore> {
        &self.store
    }

    pub fn on_full_metrics(&self, agent_id: &str, snapshot: Snapshot) -> Arc<Snapshot> {
        let stored = self.cache.store(agent_id, snapshot);
        self.persist(agent_id, &stored);
        stored
    }

    pub fn on_realtime_update(&self, agent_id: &str, update: &RealtimeUpdate) -> Arc<Snapshot> {
        let stored = self.cache.merge_realtime(agent_id, update);
        self.persist(agent_id, &stored);
        stored
    }

    pub fn on_static_update(&self, agent_id: &str, update: &StaticUpdate) -> Arc<Snapshot> {
        let stored = self.cache.merge_static(agent_id, update);
        self.persist(agent_id, &stored);
        stored
    }

    pub fn on_periodic_update(&self, agent_id: &str, update: &PeriodicUpdate) -> Arc<Snapshot> {
        let stored = self.cache.merge_periodic(agent_id, update);
        self.persist(agent_id, &stored);
        stored
    }

    /// Forgets the agent's live state. Durable history is kept.
    pub fn on_agent_disconnect(&self, agent_id: &str) -> bool {
        let removed = self.cache.remove_agent(agent_id);
        tracing::debug!(agent_id = %agent_id, removed, "agent disconnected");
        removed
    }

    fn persist(&self, agent_id: &str, snapshot: &Snapshot) {
        let Some(tx) = &self.write_tx else {
            return;
        };
        let record = MetricsRecord::from_snapshot(agent_id, snapshot);
        match tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(agent_id = %agent_id, "record writer backlog full; point dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(agent_id = %agent_id, "record writer closed; point dropped");
            }
        }
    }

    pub fn get_current(&self, agent_id: &str) -> Option<Arc<Snapshot>> {
        self.cache.get_current(agent_id)
    }

    pub fn get_all_current(&self) -> HashMap<String, Arc<Snapshot>> {
        self.cache.get_all_current()
    }

    pub fn get_history(&self, agent_id: &str, limit: usize) -> Vec<Arc<Snapshot>> {
        self.cache.get_history(agent_id, limit)
    }

    pub fn get_all_history(&self, limit: usize) -> HashMap<String, Vec<Arc<Snapshot>>> {
        self.cache.get_all_history(limit)
    }

    pub fn get_summary(&self) -> CacheSummary {
        self.cache.get_summary()
    }

    pub fn set_broadcast_callback<F>(&self, callback: F) -> bool
    where
        F: Fn(&str, Arc<Snapshot>) + Send + Sync + 'static,
    {
        self.cache.set_broadcast_callback(callback)
    }

    pub async fn query_range(
        &self,
        agent_id: &str,
        start_ms: i64,
        end_ms: i64,
        limit: u32,
    ) -> anyhow::Result<Vec<MetricsRecord>> {
        self.store.query_range(agent_id, start_ms, end_ms, limit).await
    }

    pub async fn query_aggregated(
        &self,
        agent_id: &str,
        start_ms: i64,
        end_ms: i64,
        interval: Option<&str>,
    ) -> anyhow::Result<Vec<MetricsRecord>> {
        self.store
            .query_aggregated(agent_id, start_ms, end_ms, interval)
            .await
    }

    pub async fn hourly_summaries(
        &self,
        agent_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> anyhow::Result<Vec<HourlySummary>> {
        self.store.hourly_summaries(agent_id, start_ms, end_ms).await
    }

    pub async fn daily_summaries(
        &self,
        agent_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> anyhow::Result<Vec<DailySummary>> {
        self.store.daily_summaries(agent_id, start_ms, end_ms).await
    }
}
