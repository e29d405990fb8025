//! Boundaries to the collaborators the engine does not own.
//!
//! Weight aggregation and winner persistence live behind these traits so the
//! cascade can be driven by Postgres in production and by in-memory doubles in
//! tests and simulations. They are the only points where a run awaits I/O.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::participant::{Award, ParticipantId, ParticipantWeight, WinnerRecord};

/// Supplies aggregated per-participant weights, one row per participant.
#[async_trait]
pub trait WeightSource: Send {
    async fn fetch_weights(&mut self) -> anyhow::Result<Vec<ParticipantWeight>>;
}

/// Durably records the winners of one stage as a single batch.
#[async_trait]
pub trait ResultSink: Send {
    async fn record_winners(
        &mut self,
        stage: &str,
        award: Award,
        winners: &[ParticipantId],
    ) -> anyhow::Result<()>;
}

/// Fixed weight set held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticWeights {
    weights: Vec<ParticipantWeight>,
}

impl StaticWeights {
    pub fn new(weights: Vec<ParticipantWeight>) -> Self {
        Self { weights }
    }
}

#[async_trait]
impl WeightSource for StaticWeights {
    async fn fetch_weights(&mut self) -> anyhow::Result<Vec<ParticipantWeight>> {
        Ok(self.weights.clone())
    }
}

/// One persisted stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerBatch {
    pub stage: String,
    pub award: Award,
    pub winners: Vec<ParticipantId>,
}

/// Sink that keeps every batch in memory, in submission order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    batches: Vec<WinnerBatch>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> &[WinnerBatch] {
        &self.batches
    }

    pub fn into_batches(self) -> Vec<WinnerBatch> {
        self.batches
    }

    /// Flattened winner records across every batch.
    pub fn records(&self) -> Vec<WinnerRecord> {
        self.batches
            .iter()
            .flat_map(|b| {
                b.winners.iter().map(move |&participant_id| WinnerRecord {
                    participant_id,
                    award: b.award,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn record_winners(
        &mut self,
        stage: &str,
        award: Award,
        winners: &[ParticipantId],
    ) -> anyhow::Result<()> {
        self.batches.push(WinnerBatch {
            stage: stage.to_string(),
            award,
            winners: winners.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sink_flattens_records() {
        let mut sink = MemorySink::new();
        sink.record_winners("a", Award::TierAPrimary, &[ParticipantId(1), ParticipantId(2)])
            .await
            .unwrap();
        sink.record_winners("b", Award::TierAAlternate, &[ParticipantId(3)])
            .await
            .unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].award, Award::TierAAlternate);
        assert_eq!(sink.batches()[0].stage, "a");
    }

    #[tokio::test]
    async fn static_weights_round_trip() {
        let mut source = StaticWeights::new(vec![ParticipantWeight::new(1, 12)]);
        let weights = source.fetch_weights().await.unwrap();
        assert_eq!(weights, vec![ParticipantWeight::new(1, 12)]);
    }
}
