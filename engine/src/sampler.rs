//! Unique-winner sampling without replacement.
//!
//! ## Policies
//!
//! | Policy              | Per round                                         | Default |
//! |---------------------|---------------------------------------------------|---------|
//! | `ReshufflePerRound` | shuffle whole pool, pick a uniform position, drop every entry of the winner | yes |
//! | `SingleShuffle`     | one shuffle up front, then scan for the first N distinct ids | no |
//!
//! The two policies produce different win distributions. `SingleShuffle`
//! only exists to replay draws made with the earlier scheme; new draws use
//! `ReshufflePerRound`, where every round is an independent uniform draw over
//! the tickets that are still eligible.
//!
//! In both policies a participant is eliminated entirely once drawn: the
//! remaining tickets of a winner never carry over into later rounds.

use std::collections::HashSet;
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::participant::{ExclusionSet, ParticipantId};
use crate::pool::WeightedPool;

/// Selection algorithm used by [`UniqueSampler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingPolicy {
    #[default]
    ReshufflePerRound,
    SingleShuffle,
}

impl fmt::Display for SamplingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReshufflePerRound => write!(f, "reshuffle_per_round"),
            Self::SingleShuffle => write!(f, "single_shuffle"),
        }
    }
}

/// Winners of one sampling call and the tickets nobody won with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    /// Distinct winners in the order they were drawn.
    pub winners: Vec<ParticipantId>,
    /// Remaining pool; non-winners keep every one of their entries.
    pub leftover: WeightedPool,
}

/// Draws distinct participants from a [`WeightedPool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniqueSampler {
    policy: SamplingPolicy,
}

impl UniqueSampler {
    pub fn new(policy: SamplingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> SamplingPolicy {
        self.policy
    }

    /// Draw up to `count` distinct winners from `pool`, skipping `exclusions`.
    ///
    /// The caller's pool is not modified. Fewer than `count` winners are
    /// returned when the filtered pool holds fewer distinct participants; that
    /// is not an error.
    pub fn draw<R: Rng + ?Sized>(
        &self,
        pool: &WeightedPool,
        count: usize,
        exclusions: &ExclusionSet,
        rng: &mut R,
    ) -> Draw {
        let working = pool.without(exclusions);
        match self.policy {
            SamplingPolicy::ReshufflePerRound => reshuffle_per_round(working, count, rng),
            SamplingPolicy::SingleShuffle => single_shuffle(working, count, rng),
        }
    }
}

fn reshuffle_per_round<R: Rng + ?Sized>(
    mut working: WeightedPool,
    count: usize,
    rng: &mut R,
) -> Draw {
    let mut winners = Vec::with_capacity(count.min(working.len()));

    while winners.len() < count && !working.is_empty() {
        working.entries_mut().shuffle(rng);
        let position = rng.gen_range(0..working.len());
        let winner = working.entries()[position];
        working.remove_all(winner);
        winners.push(winner);
    }

    Draw {
        winners,
        leftover: working,
    }
}

fn single_shuffle<R: Rng + ?Sized>(mut working: WeightedPool, count: usize, rng: &mut R) -> Draw {
    if count == 0 {
        return Draw {
            winners: Vec::new(),
            leftover: working,
        };
    }

    working.entries_mut().shuffle(rng);

    let mut won = HashSet::new();
    let mut winners = Vec::with_capacity(count);
    for &id in working.entries() {
        if won.insert(id) {
            winners.push(id);
            if winners.len() == count {
                break;
            }
        }
    }
    working.entries_mut().retain(|id| !won.contains(id));

    Draw {
        winners,
        leftover: working,
    }
}
