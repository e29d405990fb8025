//! Weighted candidate pools.
//!
//! A [`WeightedPool`] is a flat multiset of participant ids: every entry is one
//! ticket, and a participant holding `n` effective chances appears `n` times.
//! [`PoolBuilder`] expands aggregated weights into that shape.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::DrawError;
use crate::participant::{ExclusionSet, ParticipantId, ParticipantWeight};

/// Divisor applied to raw weights for reduced-odds tiers.
pub const DEFAULT_REDUCED_ODDS_DIVISOR: i64 = 10;

/// Odds tier used when expanding weights into pool entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Odds {
    /// One entry per weight unit.
    Standard,
    /// One entry per `divisor` weight units (floored).
    Reduced,
}

/// Ordered multiset of participant ids, one element per ticket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightedPool {
    entries: Vec<ParticipantId>,
}

impl WeightedPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<ParticipantId>) -> Self {
        Self { entries }
    }

    /// Number of tickets (not participants) in the pool.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ParticipantId] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ParticipantId> {
        self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut Vec<ParticipantId> {
        &mut self.entries
    }

    /// How many tickets `id` holds in this pool.
    pub fn tickets_of(&self, id: ParticipantId) -> usize {
        self.entries.iter().filter(|&&e| e == id).count()
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.entries.contains(&id)
    }

    /// Distinct participants present, in first-appearance order.
    pub fn participants(&self) -> Vec<ParticipantId> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }

    pub fn distinct_count(&self) -> usize {
        self.entries.iter().collect::<HashSet<_>>().len()
    }

    /// Copy of the pool without any entry belonging to an excluded participant.
    pub fn without(&self, exclusions: &ExclusionSet) -> WeightedPool {
        if exclusions.is_empty() {
            return self.clone();
        }
        WeightedPool {
            entries: self
                .entries
                .iter()
                .copied()
                .filter(|id| !exclusions.contains(id))
                .collect(),
        }
    }

    /// Drop every entry of `id` in place, returning how many were removed.
    pub fn remove_all(&mut self, id: ParticipantId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|&e| e != id);
        before - self.entries.len()
    }
}

/// Expands aggregated weights into a [`WeightedPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolBuilder {
    reduced_odds_divisor: i64,
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self {
            reduced_odds_divisor: DEFAULT_REDUCED_ODDS_DIVISOR,
        }
    }
}

impl PoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a non-default divisor for reduced-odds tiers.
    ///
    /// # Errors
    ///
    /// Returns `DrawError::InvalidPlan` if `divisor < 1`.
    pub fn with_reduced_odds_divisor(divisor: i64) -> Result<Self, DrawError> {
        if divisor < 1 {
            return Err(DrawError::plan(format!(
                "reduced odds divisor must be at least 1, got {divisor}"
            )));
        }
        Ok(Self {
            reduced_odds_divisor: divisor,
        })
    }

    pub fn reduced_odds_divisor(&self) -> i64 {
        self.reduced_odds_divisor
    }

    /// Number of pool entries a raw weight expands to under `odds`.
    pub fn effective_weight(&self, weight: i64, odds: Odds) -> usize {
        if weight <= 0 {
            return 0;
        }
        let effective = match odds {
            Odds::Standard => weight,
            Odds::Reduced => weight / self.reduced_odds_divisor,
        };
        usize::try_from(effective).unwrap_or(usize::MAX)
    }

    /// Reject negative weights and repeated participants.
    ///
    /// The cascade calls this once, before the first stage, so a bad weight set
    /// aborts the run without drawing anybody.
    pub fn validate(weights: &[ParticipantWeight]) -> Result<(), DrawError> {
        let mut seen = HashSet::with_capacity(weights.len());
        for w in weights {
            if w.weight < 0 {
                return Err(DrawError::InvalidWeight {
                    participant: w.participant_id,
                    weight: w.weight,
                });
            }
            if !seen.insert(w.participant_id) {
                return Err(DrawError::DuplicateParticipant(w.participant_id));
            }
        }
        Ok(())
    }

    /// Build a pool, appending each participant's entries in input order.
    pub fn build(
        &self,
        weights: &[ParticipantWeight],
        odds: Odds,
    ) -> Result<WeightedPool, DrawError> {
        Self::validate(weights)?;

        let total: usize = weights
            .iter()
            .map(|w| self.effective_weight(w.weight, odds))
            .sum();
        let mut entries = Vec::with_capacity(total);
        for w in weights {
            let copies = self.effective_weight(w.weight, odds);
            entries.extend(std::iter::repeat(w.participant_id).take(copies));
        }
        Ok(WeightedPool { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weights(pairs: &[(i64, i64)]) -> Vec<ParticipantWeight> {
        pairs
            .iter()
            .map(|&(id, w)| ParticipantWeight::new(id, w))
            .collect()
    }

    #[test]
    fn standard_pool_has_one_entry_per_option() {
        let pool = PoolBuilder::new()
            .build(&weights(&[(1, 3), (2, 1)]), Odds::Standard)
            .unwrap();
        assert_eq!(
            pool.entries(),
            &[ParticipantId(1), ParticipantId(1), ParticipantId(1), ParticipantId(2)]
        );
    }

    #[test]
    fn reduced_pool_floors_by_ten() {
        let pool = PoolBuilder::new()
            .build(&weights(&[(1, 12), (2, 30), (3, 9)]), Odds::Reduced)
            .unwrap();
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.tickets_of(ParticipantId(1)), 1);
        assert_eq!(pool.tickets_of(ParticipantId(2)), 3);
        assert!(!pool.contains(ParticipantId(3)));
    }

    #[test]
    fn zero_weight_contributes_nothing() {
        let pool = PoolBuilder::new()
            .build(&weights(&[(1, 0), (2, 2)]), Odds::Standard)
            .unwrap();
        assert_eq!(pool.participants(), vec![ParticipantId(2)]);
    }

    #[test]
    fn negative_weight_is_rejected() {
        let err = PoolBuilder::new()
            .build(&weights(&[(1, 4), (7, -1)]), Odds::Standard)
            .unwrap_err();
        assert!(matches!(
            err,
            DrawError::InvalidWeight {
                participant: ParticipantId(7),
                weight: -1
            }
        ));
    }

    #[test]
    fn duplicate_participant_is_rejected() {
        let err = PoolBuilder::new()
            .build(&weights(&[(5, 1), (5, 2)]), Odds::Standard)
            .unwrap_err();
        assert!(matches!(err, DrawError::DuplicateParticipant(ParticipantId(5))));
    }

    #[test]
    fn custom_divisor() {
        let builder = PoolBuilder::with_reduced_odds_divisor(4).unwrap();
        assert_eq!(builder.effective_weight(9, Odds::Reduced), 2);
        assert!(PoolBuilder::with_reduced_odds_divisor(0).is_err());
    }

    #[test]
    fn without_filters_every_entry_of_excluded() {
        let pool = PoolBuilder::new()
            .build(&weights(&[(1, 2), (2, 3)]), Odds::Standard)
            .unwrap();
        let excl: ExclusionSet = [ParticipantId(2)].into_iter().collect();
        let filtered = pool.without(&excl);
        assert_eq!(filtered.entries(), &[ParticipantId(1), ParticipantId(1)]);
        // caller's pool is untouched
        assert_eq!(pool.len(), 5);
    }

    #[test]
    fn remove_all_reports_count() {
        let mut pool = WeightedPool::from_entries(vec![
            ParticipantId(1),
            ParticipantId(2),
            ParticipantId(1),
        ]);
        assert_eq!(pool.remove_all(ParticipantId(1)), 2);
        assert_eq!(pool.entries(), &[ParticipantId(2)]);
    }
}
