// Rollup rows: hourly from raw records, daily from hourly rows.

use serde::{Deserialize, Serialize};

/// One row per (agent, hour). Covers [hour_start, hour_start + 1h).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlySummary {
    pub agent_id: String,
    pub hour_start: i64,
    pub cpu_avg: f64,
    pub cpu_max: f64,
    pub mem_avg: f64,
    pub mem_max: f64,
    /// Sum of the per-second rx rates of every raw point in the hour.
    pub net_rx_total: u64,
    pub net_tx_total: u64,
    pub data_points: i64,
}

/// One row per (agent, UTC day).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub agent_id: String,
    pub day_start: i64,
    pub cpu_avg: f64,
    pub cpu_max: f64,
    pub mem_avg: f64,
    pub mem_max: f64,
    pub net_rx_total: u64,
    pub net_tx_total: u64,
    pub data_points: i64,
}
