//! Cascading multi-stage draws.
//!
//! | Module   | Purpose                                               |
//! |----------|-------------------------------------------------------|
//! | `plan`   | Stage table: pool sources, exclusions, target counts  |
//! | `engine` | Sequential driver wiring leftovers and exclusions     |

pub mod engine;
pub mod plan;

pub use engine::{CascadeEngine, CascadeOutcome};
pub use plan::{DrawPlan, PoolSource, StageSpec};
