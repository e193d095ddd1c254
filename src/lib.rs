// Library for tests to access modules

pub mod aggregation_worker;
pub mod backfill;
pub mod config;
pub mod live_cache;
pub mod merge;
pub mod metrics_store;
pub mod models;
pub mod routes;
pub mod service;
pub mod writer;
