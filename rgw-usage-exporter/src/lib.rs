//! RGW usage and quota telemetry pipeline.
//!
//! Five-stage loop — users → buckets → usage → derived metrics → publish —
//! built from independently-owned KV namespaces (see `store`), fed by the
//! admin client (`admin`) through three periodic syncers (`sync`), joined
//! by the aggregator (`aggregate`), and surfaced by the exporter
//! (`export`). `orchestrator` hosts the periodic schedule end to end.

pub mod admin;
pub mod aggregate;
pub mod config;
pub mod error;
pub mod health;
pub mod keycodec;
pub mod model;
pub mod observability;
pub mod orchestrator;
pub mod store;
pub mod sync;
pub mod export;
