// Live per-agent cache: current snapshot + bounded history, behind one reader/writer lock.
// Snapshots are handed out as Arc<Snapshot>; merges go through Arc::make_mut, so anything
// already returned (or sitting in history) is cloned away from before it could change.
// Broadcasts go through one bounded queue drained by a single dispatcher thread: per-agent
// delivery order matches write order, and a lagging subscriber loses frames instead of
// holding up ingestion.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::merge;
use crate::models::{PeriodicUpdate, RealtimeUpdate, Snapshot, StaticUpdate};

/// 10 minutes at 1 Hz.
pub const DEFAULT_HISTORY_CAPACITY: usize = 600;

/// Frames queued for the broadcast hook before new ones are dropped.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// Invoked after every store/merge with the agent id and the stored snapshot.
pub type BroadcastCallback = dyn Fn(&str, Arc<Snapshot>) + Send + Sync;

type BroadcastFrame = (String, Arc<Snapshot>);

/// Fleet-wide rollup of the current snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSummary {
    pub agent_count: usize,
    pub avg_cpu_percent: f64,
    pub total_memory: u64,
    pub used_memory: u64,
    pub memory_percent: f64,
}

#[derive(Default)]
struct CacheState {
    current: HashMap<String, Arc<Snapshot>>,
    history: HashMap<String, VecDeque<Arc<Snapshot>>>,
}

impl CacheState {
    fn push_history(&mut self, agent_id: &str, snapshot: Arc<Snapshot>, capacity: usize) {
        let ring = self
            .history
            .entry(agent_id.to_owned())
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        while ring.len() >= capacity {
            ring.pop_front();
        }
        ring.push_back(snapshot);
    }
}

pub struct LiveCache {
    state: RwLock<CacheState>,
    history_capacity: usize,
    broadcast_capacity: usize,
    broadcast: OnceLock<mpsc::Sender<BroadcastFrame>>,
    broadcasts_dropped: AtomicU64,
}

impl Default for LiveCache {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl LiveCache {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            history_capacity: history_capacity.max(1),
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            broadcast: OnceLock::new(),
            broadcasts_dropped: AtomicU64::new(0),
        }
    }

    /// Queue length for the broadcast hook. Takes effect when the hook is set.
    pub fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    /// Frames dropped because the broadcast queue was full.
    pub fn broadcasts_dropped(&self) -> u64 {
        self.broadcasts_dropped.load(Ordering::Relaxed)
    }

    /// Sets the broadcast hook and starts its dispatcher thread. Only the first call takes
    /// effect; returns false afterwards. The dispatcher exits when the cache is dropped.
    pub fn set_broadcast_callback<F>(&self, callback: F) -> bool
    where
        F: Fn(&str, Arc<Snapshot>) + Send + Sync + 'static,
    {
        if self.broadcast.get().is_some() {
            tracing::warn!("broadcast callback already set; ignoring");
            return false;
        }
        let (tx, rx) = mpsc::channel::<BroadcastFrame>(self.broadcast_capacity);
        if self.broadcast.set(tx).is_err() {
            tracing::warn!("broadcast callback already set; ignoring");
            return false;
        }
        let spawned = std::thread::Builder::new()
            .name("broadcast-dispatch".into())
            .spawn(move || dispatch(rx, callback));
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "failed to start broadcast dispatcher");
        }
        true
    }

    /// Replaces the agent's snapshot wholesale.
    pub fn store(&self, agent_id: &str, mut snapshot: Snapshot) -> Arc<Snapshot> {
        snapshot.timestamp = now_ms();
        let snapshot = Arc::new(snapshot);
        {
            let mut state = self.state.write();
            state
                .current
                .insert(agent_id.to_owned(), Arc::clone(&snapshot));
            state.push_history(agent_id, Arc::clone(&snapshot), self.history_capacity);
            self.notify(agent_id, &snapshot);
        }
        snapshot
    }

    pub fn merge_realtime(&self, agent_id: &str, update: &RealtimeUpdate) -> Arc<Snapshot> {
        self.merge_with(agent_id, |s| merge::apply_realtime(s, update))
    }

    pub fn merge_static(&self, agent_id: &str, update: &StaticUpdate) -> Arc<Snapshot> {
        self.merge_with(agent_id, |s| merge::apply_static(s, update))
    }

    pub fn merge_periodic(&self, agent_id: &str, update: &PeriodicUpdate) -> Arc<Snapshot> {
        self.merge_with(agent_id, |s| merge::apply_periodic(s, update))
    }

    fn merge_with<F>(&self, agent_id: &str, apply: F) -> Arc<Snapshot>
    where
        F: FnOnce(&mut Snapshot),
    {
        let mut state = self.state.write();
        let entry = state.current.entry(agent_id.to_owned()).or_default();
        let snapshot = Arc::make_mut(entry);
        apply(snapshot);
        snapshot.timestamp = now_ms();
        let stored = Arc::clone(entry);
        state.push_history(agent_id, Arc::clone(&stored), self.history_capacity);
        self.notify(agent_id, &stored);
        stored
    }

    pub fn get_current(&self, agent_id: &str) -> Option<Arc<Snapshot>> {
        self.state.read().current.get(agent_id).cloned()
    }

    pub fn get_all_current(&self) -> HashMap<String, Arc<Snapshot>> {
        self.state.read().current.clone()
    }

    /// Most recent `limit` entries, oldest first. `limit == 0` or larger than the ring returns all.
    pub fn get_history(&self, agent_id: &str, limit: usize) -> Vec<Arc<Snapshot>> {
        let state = self.state.read();
        state
            .history
            .get(agent_id)
            .map(|ring| tail(ring, limit))
            .unwrap_or_default()
    }

    /// `get_history` for every agent that has any.
    pub fn get_all_history(&self, limit: usize) -> HashMap<String, Vec<Arc<Snapshot>>> {
        let state = self.state.read();
        state
            .history
            .iter()
            .map(|(agent_id, ring)| (agent_id.clone(), tail(ring, limit)))
            .collect()
    }

    /// Drops both the snapshot and the history. Returns whether the agent was known.
    pub fn remove_agent(&self, agent_id: &str) -> bool {
        let mut state = self.state.write();
        let had_current = state.current.remove(agent_id).is_some();
        let had_history = state.history.remove(agent_id).is_some();
        had_current || had_history
    }

    pub fn get_summary(&self) -> CacheSummary {
        let state = self.state.read();
        let agent_count = state.current.len();
        let mut total_cpu = 0.0;
        let mut total_memory: u64 = 0;
        let mut used_memory: u64 = 0;
        for s in state.current.values() {
            total_cpu += s.cpu.usage_percent;
            total_memory = total_memory.saturating_add(s.memory.total);
            used_memory = used_memory.saturating_add(s.memory.used);
        }

        let avg_cpu_percent = if agent_count > 0 {
            total_cpu / agent_count as f64
        } else {
            0.0
        };
        let memory_percent = if total_memory > 0 {
            used_memory as f64 / total_memory as f64 * 100.0
        } else {
            0.0
        };

        CacheSummary {
            agent_count,
            avg_cpu_percent,
            total_memory,
            used_memory,
            memory_percent,
        }
    }

    /// Queues the frame for the dispatcher. Called under the write lock so queue order is
    /// write order; never blocks.
    fn notify(&self, agent_id: &str, snapshot: &Arc<Snapshot>) {
        let Some(tx) = self.broadcast.get() else {
            return;
        };
        match tx.try_send((agent_id.to_owned(), Arc::clone(snapshot))) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                let dropped = self.broadcasts_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    tracing::warn!(agent_id = %agent_id, dropped, "broadcast subscriber lagging; frame dropped");
                }
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(agent_id = %agent_id, "broadcast dispatcher gone; frame dropped");
            }
        }
    }
}

/// Most recent `limit` entries (all when 0 or larger than the ring), oldest first.
fn tail(ring: &VecDeque<Arc<Snapshot>>, limit: usize) -> Vec<Arc<Snapshot>> {
    let take = if limit == 0 { ring.len() } else { limit.min(ring.len()) };
    ring.iter().skip(ring.len() - take).cloned().collect()
}

/// Runs the hook for each frame in queue order. A panicking hook loses only that frame.
fn dispatch<F>(mut rx: mpsc::Receiver<BroadcastFrame>, callback: F)
where
    F: Fn(&str, Arc<Snapshot>),
{
    while let Some((agent_id, snapshot)) = rx.blocking_recv() {
        let delivered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            callback(&agent_id, snapshot)
        }));
        if delivered.is_err() {
            tracing::warn!(agent_id = %agent_id, "broadcast callback panicked");
        }
    }
    tracing::debug!("broadcast dispatcher shutting down");
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
