//! Weighted, cascading, without-replacement raffle draws.
//!
//! Aggregated participant weights are expanded into ticket pools, winners are
//! drawn uniformly per ticket with every winner fully eliminated, and a
//! [`DrawPlan`] threads leftovers and exclusions from stage to stage.
//!
//! ```text
//! weights ─► PoolBuilder(reduced) ─► stage 1 ─► leftover ─► stage 2
//!        └─► PoolBuilder(standard) ─► stage 3 (minus stage-1 winners) ─► leftover ─► stage 4
//! ```
//!
//! Randomness is always injected (`rand::Rng`), so a seeded generator replays
//! a run exactly.

pub mod cascade;
pub mod error;
pub mod participant;
pub mod pool;
pub mod ports;
pub mod report;
pub mod sampler;

pub use cascade::{CascadeEngine, CascadeOutcome, DrawPlan, PoolSource, StageSpec};
pub use error::DrawError;
pub use participant::{Award, ExclusionSet, ParticipantId, ParticipantWeight, WinnerRecord};
pub use pool::{Odds, PoolBuilder, WeightedPool, DEFAULT_REDUCED_ODDS_DIVISOR};
pub use ports::{MemorySink, ResultSink, StaticWeights, WeightSource, WinnerBatch};
pub use report::{DrawObserver, NoopObserver, ObserverSet, StageReport, TracingObserver};
pub use sampler::{Draw, SamplingPolicy, UniqueSampler};
