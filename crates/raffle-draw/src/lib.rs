//! Postgres-backed runner for the cascading raffle draw.
//!
//! The draw logic itself lives in `draw-engine`; this crate loads
//! configuration, adapts the tickets and winners tables to the engine's
//! ports, and keeps the JSON-lines audit trail.

pub mod audit;
pub mod cli;
pub mod config;
pub mod run;
pub mod store;
pub mod weights_file;

pub use audit::{JsonlAuditLog, RunHeader, RunMode};
pub use config::{ConfigError, DrawConfig};
pub use run::{execute_draw, simulate, DrawOptions, RunSummary};
