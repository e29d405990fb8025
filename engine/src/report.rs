//! Per-stage audit records and the observer seam that receives them.
//!
//! A run keeps no durable intermediate state, so each stage emits a
//! [`StageReport`] with enough detail to reconstruct it afterwards.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::participant::{Award, ParticipantId};

/// Audit record for one completed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    /// 1-based position of the stage in the plan.
    pub ordinal: usize,
    pub stage: String,
    pub award: Award,
    /// Tickets in the stage's pool before exclusions were applied.
    pub input_pool_size: usize,
    /// Distinct participants in the stage's pool before exclusions.
    pub input_participants: usize,
    pub exclusion_count: usize,
    pub requested: usize,
    pub winners: Vec<ParticipantId>,
    /// Tickets left after every winner's entries were removed.
    pub leftover_size: usize,
}

impl StageReport {
    /// The pool ran out of distinct participants before `requested` was met.
    pub fn is_short(&self) -> bool {
        self.winners.len() < self.requested
    }
}

/// Receives one record per stage, in stage order.
pub trait DrawObserver: Send + Sync {
    fn record(&self, report: &StageReport);
}

impl<T: DrawObserver + ?Sized> DrawObserver for Arc<T> {
    fn record(&self, report: &StageReport) {
        (**self).record(report);
    }
}

/// Observer that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DrawObserver for NoopObserver {
    fn record(&self, _report: &StageReport) {}
}

/// Emits each report as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DrawObserver for TracingObserver {
    fn record(&self, report: &StageReport) {
        let winners: Vec<i64> = report.winners.iter().map(|w| w.0).collect();
        tracing::info!(
            ordinal = report.ordinal,
            stage = %report.stage,
            award = %report.award,
            input_pool_size = report.input_pool_size,
            input_participants = report.input_participants,
            exclusion_count = report.exclusion_count,
            requested = report.requested,
            drawn = report.winners.len(),
            winners = ?winners,
            leftover_size = report.leftover_size,
            "stage drawn"
        );
        if report.is_short() {
            tracing::warn!(
                stage = %report.stage,
                requested = report.requested,
                drawn = report.winners.len(),
                "pool exhausted before target count"
            );
        }
    }
}

/// Fans every record out to several observers.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn DrawObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, observer: impl DrawObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn push(&mut self, observer: Box<dyn DrawObserver>) {
        self.observers.push(observer);
    }
}

impl DrawObserver for ObserverSet {
    fn record(&self, report: &StageReport) {
        for observer in &self.observers {
            observer.record(report);
        }
    }
}
