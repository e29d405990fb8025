//! Stage table for a cascading draw.
//!
//! The default plan:
//!
//! ```text
//! #  stage              pool                          excludes winners of  count
//! 1  tier-a-primary     fresh, reduced odds           -                    5
//! 2  tier-a-alternate   leftover of tier-a-primary    -                    20
//! 3  tier-b-primary     fresh, standard odds          tier-a-primary       50
//! 4  tier-b-alternate   leftover of tier-b-primary    -                    100
//! ```
//!
//! Stage 3 excludes only stage 1's winners. Tier-A alternates stay eligible
//! for Tier B; do not widen the exclusion to every earlier stage.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::DrawError;
use crate::participant::Award;
use crate::pool::{Odds, DEFAULT_REDUCED_ODDS_DIVISOR};

/// Where a stage's pool comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PoolSource {
    /// Build a new pool from the run's weights.
    Fresh { odds: Odds },
    /// Take over the leftover pool of an earlier stage.
    Leftover { stage: String },
}

/// One row of the stage table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    pub award: Award,
    pub count: usize,
    pub source: PoolSource,
    /// Earlier stages whose winners are barred from this stage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude_winners_of: Vec<String>,
}

impl StageSpec {
    pub fn fresh(name: &str, award: Award, odds: Odds, count: usize) -> Self {
        Self {
            name: name.to_string(),
            award,
            count,
            source: PoolSource::Fresh { odds },
            exclude_winners_of: Vec::new(),
        }
    }

    pub fn leftover_of(name: &str, award: Award, stage: &str, count: usize) -> Self {
        Self {
            name: name.to_string(),
            award,
            count,
            source: PoolSource::Leftover {
                stage: stage.to_string(),
            },
            exclude_winners_of: Vec::new(),
        }
    }

    pub fn excluding(mut self, stage: &str) -> Self {
        self.exclude_winners_of.push(stage.to_string());
        self
    }
}

fn default_divisor() -> i64 {
    DEFAULT_REDUCED_ODDS_DIVISOR
}

/// Ordered stage table plus the reduced-odds divisor shared by its stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawPlan {
    #[serde(default = "default_divisor")]
    pub reduced_odds_divisor: i64,
    pub stages: Vec<StageSpec>,
}

impl Default for DrawPlan {
    fn default() -> Self {
        Self {
            reduced_odds_divisor: DEFAULT_REDUCED_ODDS_DIVISOR,
            stages: vec![
                StageSpec::fresh("tier-a-primary", Award::TierAPrimary, Odds::Reduced, 5),
                StageSpec::leftover_of(
                    "tier-a-alternate",
                    Award::TierAAlternate,
                    "tier-a-primary",
                    20,
                ),
                StageSpec::fresh("tier-b-primary", Award::TierBPrimary, Odds::Standard, 50)
                    .excluding("tier-a-primary"),
                StageSpec::leftover_of(
                    "tier-b-alternate",
                    Award::TierBAlternate,
                    "tier-b-primary",
                    100,
                ),
            ],
        }
    }
}

impl DrawPlan {
    /// Position of a stage by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }

    /// Check that every stage only depends on stages that run before it.
    pub fn validate(&self) -> Result<(), DrawError> {
        if self.stages.is_empty() {
            return Err(DrawError::plan("plan has no stages"));
        }
        if self.reduced_odds_divisor < 1 {
            return Err(DrawError::plan(format!(
                "reduced_odds_divisor must be at least 1, got {}",
                self.reduced_odds_divisor
            )));
        }

        let mut names = HashSet::new();
        let mut awards = HashSet::new();
        let mut consumed = HashSet::new();

        for (i, stage) in self.stages.iter().enumerate() {
            if stage.name.trim().is_empty() {
                return Err(DrawError::plan(format!("stage #{} has an empty name", i + 1)));
            }
            if !names.insert(stage.name.as_str()) {
                return Err(DrawError::plan(format!(
                    "stage name '{}' is used more than once",
                    stage.name
                )));
            }
            if !awards.insert(stage.award) {
                return Err(DrawError::plan(format!(
                    "award {} is drawn by more than one stage",
                    stage.award
                )));
            }

            let earlier = |name: &str| self.stages[..i].iter().any(|s| s.name == name);

            if let PoolSource::Leftover { stage: from } = &stage.source {
                if !earlier(from) {
                    return Err(DrawError::plan(format!(
                        "stage '{}' takes the leftover of '{}', which does not run before it",
                        stage.name, from
                    )));
                }
                if !consumed.insert(from.as_str()) {
                    return Err(DrawError::plan(format!(
                        "leftover of '{from}' is consumed by more than one stage"
                    )));
                }
            }

            for excluded in &stage.exclude_winners_of {
                if !earlier(excluded) {
                    return Err(DrawError::plan(format!(
                        "stage '{}' excludes winners of '{}', which does not run before it",
                        stage.name, excluded
                    )));
                }
            }
        }

        Ok(())
    }
}
