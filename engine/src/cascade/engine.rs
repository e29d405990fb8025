use rand::Rng;
use tracing::debug;

use crate::error::DrawError;
use crate::participant::{Award, ExclusionSet, ParticipantId, ParticipantWeight};
use crate::pool::{PoolBuilder, WeightedPool};
use crate::ports::{ResultSink, WeightSource};
use crate::report::{DrawObserver, StageReport};
use crate::sampler::{SamplingPolicy, UniqueSampler};

use super::plan::{DrawPlan, PoolSource};

/// Stage output threaded to later stages. Dropped once the run ends.
struct StageResult {
    winners: Vec<ParticipantId>,
    leftover: Option<WeightedPool>,
}

/// Reports of every stage of a completed run, in plan order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeOutcome {
    pub stages: Vec<StageReport>,
}

impl CascadeOutcome {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn winners_of(&self, award: Award) -> &[ParticipantId] {
        self.stages
            .iter()
            .find(|s| s.award == award)
            .map(|s| s.winners.as_slice())
            .unwrap_or(&[])
    }

    pub fn total_winners(&self) -> usize {
        self.stages.iter().map(|s| s.winners.len()).sum()
    }
}

/// Runs a [`DrawPlan`] stage by stage.
///
/// Stages are strictly sequential: each stage's pool or exclusion set may
/// depend on an earlier stage's output. Each stage's winners reach the sink
/// before the next stage starts, so a sink failure leaves later stages
/// undrawn.
#[derive(Debug, Clone)]
pub struct CascadeEngine {
    plan: DrawPlan,
    builder: PoolBuilder,
    sampler: UniqueSampler,
}

impl CascadeEngine {
    /// # Errors
    ///
    /// Returns `DrawError::InvalidPlan` if the plan fails validation.
    pub fn new(plan: DrawPlan, policy: SamplingPolicy) -> Result<Self, DrawError> {
        plan.validate()?;
        let builder = PoolBuilder::with_reduced_odds_divisor(plan.reduced_odds_divisor)?;
        Ok(Self {
            plan,
            builder,
            sampler: UniqueSampler::new(policy),
        })
    }

    pub fn with_defaults() -> Self {
        Self {
            plan: DrawPlan::default(),
            builder: PoolBuilder::default(),
            sampler: UniqueSampler::default(),
        }
    }

    pub fn plan(&self) -> &DrawPlan {
        &self.plan
    }

    pub fn policy(&self) -> SamplingPolicy {
        self.sampler.policy()
    }

    /// Fetch weights from `source`, then [`run`](Self::run) the cascade.
    pub async fn run_from<W, S, O, R>(
        &self,
        source: &mut W,
        sink: &mut S,
        observer: &O,
        rng: &mut R,
    ) -> Result<CascadeOutcome, DrawError>
    where
        W: WeightSource + ?Sized,
        S: ResultSink + ?Sized,
        O: DrawObserver + ?Sized,
        R: Rng + ?Sized,
    {
        let weights = source
            .fetch_weights()
            .await
            .map_err(|e| DrawError::data_access("fetching participant weights", e))?;
        debug!(participants = weights.len(), "weights fetched");
        self.run(&weights, sink, observer, rng).await
    }

    /// Draw every stage of the plan against `weights`.
    ///
    /// Weights are validated before the first stage, so `InvalidWeight` and
    /// `DuplicateParticipant` never leave a partially persisted run behind.
    pub async fn run<S, O, R>(
        &self,
        weights: &[ParticipantWeight],
        sink: &mut S,
        observer: &O,
        rng: &mut R,
    ) -> Result<CascadeOutcome, DrawError>
    where
        S: ResultSink + ?Sized,
        O: DrawObserver + ?Sized,
        R: Rng + ?Sized,
    {
        PoolBuilder::validate(weights)?;

        let mut results: Vec<StageResult> = Vec::with_capacity(self.plan.stages.len());
        let mut reports = Vec::with_capacity(self.plan.stages.len());

        for (i, spec) in self.plan.stages.iter().enumerate() {
            let pool = match &spec.source {
                PoolSource::Fresh { odds } => self.builder.build(weights, *odds)?,
                PoolSource::Leftover { stage } => {
                    let idx = self.earlier_stage(stage, i)?;
                    results[idx].leftover.take().ok_or_else(|| {
                        DrawError::plan(format!("leftover of '{stage}' was already consumed"))
                    })?
                }
            };

            let mut exclusions = ExclusionSet::new();
            for excluded in &spec.exclude_winners_of {
                let idx = self.earlier_stage(excluded, i)?;
                exclusions.extend(results[idx].winners.iter().copied());
            }

            debug!(
                stage = %spec.name,
                pool = pool.len(),
                exclusions = exclusions.len(),
                "drawing stage"
            );

            let input_participants = pool.distinct_count();
            let draw = self.sampler.draw(&pool, spec.count, &exclusions, rng);

            let report = StageReport {
                ordinal: i + 1,
                stage: spec.name.clone(),
                award: spec.award,
                input_pool_size: pool.len(),
                input_participants,
                exclusion_count: exclusions.len(),
                requested: spec.count,
                winners: draw.winners.clone(),
                leftover_size: draw.leftover.len(),
            };
            observer.record(&report);

            sink.record_winners(&spec.name, spec.award, &draw.winners)
                .await
                .map_err(|e| {
                    DrawError::data_access(format!("persisting stage '{}'", spec.name), e)
                })?;

            results.push(StageResult {
                winners: draw.winners,
                leftover: Some(draw.leftover),
            });
            reports.push(report);
        }

        Ok(CascadeOutcome { stages: reports })
    }

    fn earlier_stage(&self, name: &str, current: usize) -> Result<usize, DrawError> {
        self.plan
            .index_of(name)
            .filter(|&idx| idx < current)
            .ok_or_else(|| {
                DrawError::plan(format!(
                    "stage '{name}' does not run before stage #{}",
                    current + 1
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::plan::StageSpec;
    use crate::pool::Odds;
    use crate::ports::MemorySink;
    use crate::report::NoopObserver;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn weights(pairs: &[(i64, i64)]) -> Vec<ParticipantWeight> {
        pairs
            .iter()
            .map(|&(id, w)| ParticipantWeight::new(id, w))
            .collect()
    }

    #[tokio::test]
    async fn empty_weight_set_draws_nobody_in_every_stage() {
        let engine = CascadeEngine::with_defaults();
        let mut sink = MemorySink::new();
        let outcome = engine
            .run(&[], &mut sink, &NoopObserver, &mut ChaCha8Rng::seed_from_u64(1))
            .await
            .unwrap();
        assert_eq!(outcome.stages.len(), 4);
        assert_eq!(outcome.total_winners(), 0);
        assert_eq!(sink.batches().len(), 4);
    }

    #[tokio::test]
    async fn invalid_weight_aborts_before_any_stage() {
        let engine = CascadeEngine::with_defaults();
        let mut sink = MemorySink::new();
        let err = engine
            .run(
                &weights(&[(1, 40), (2, -5)]),
                &mut sink,
                &NoopObserver,
                &mut ChaCha8Rng::seed_from_u64(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DrawError::InvalidWeight { .. }));
        assert!(sink.batches().is_empty());
    }

    #[tokio::test]
    async fn leftover_stage_never_redraws_primary_winners() {
        let plan = DrawPlan {
            reduced_odds_divisor: 10,
            stages: vec![
                StageSpec::fresh("main", Award::TierBPrimary, Odds::Standard, 2),
                StageSpec::leftover_of("alt", Award::TierBAlternate, "main", 10),
            ],
        };
        let engine = CascadeEngine::new(plan, SamplingPolicy::default()).unwrap();
        let mut sink = MemorySink::new();
        let outcome = engine
            .run(
                &weights(&[(1, 3), (2, 3), (3, 3), (4, 3)]),
                &mut sink,
                &NoopObserver,
                &mut ChaCha8Rng::seed_from_u64(8),
            )
            .await
            .unwrap();

        let main = outcome.winners_of(Award::TierBPrimary);
        let alt = outcome.winners_of(Award::TierBAlternate);
        assert_eq!(main.len(), 2);
        assert_eq!(alt.len(), 2);
        assert!(alt.iter().all(|w| !main.contains(w)));
        assert_eq!(outcome.stage("alt").unwrap().leftover_size, 0);
    }

    #[test]
    fn new_rejects_invalid_plan() {
        let plan = DrawPlan {
            reduced_odds_divisor: 10,
            stages: vec![],
        };
        assert!(CascadeEngine::new(plan, SamplingPolicy::default()).is_err());
    }
}
