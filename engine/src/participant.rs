//! Participant identity, weights, exclusion sets and award categories.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque participant identifier (the ticket holder's client id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub i64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ParticipantId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Aggregated number of ticket options held by one participant.
///
/// Produced by summing every qualifying option of the participant. A weight of
/// zero contributes no pool entries; a negative weight is rejected by the
/// pool builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantWeight {
    pub participant_id: ParticipantId,
    pub weight: i64,
}

impl ParticipantWeight {
    pub fn new(participant_id: i64, weight: i64) -> Self {
        Self {
            participant_id: ParticipantId(participant_id),
            weight,
        }
    }
}

/// Participants barred from a stage regardless of their pool entries.
///
/// Backed by an ordered set so audit output lists ids deterministically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSet {
    ids: BTreeSet<ParticipantId>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ParticipantId) -> bool {
        self.ids.insert(id)
    }

    pub fn extend<I: IntoIterator<Item = ParticipantId>>(&mut self, ids: I) {
        self.ids.extend(ids);
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticipantId> {
        self.ids.iter()
    }
}

impl FromIterator<ParticipantId> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = ParticipantId>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Award category a stage's winners receive.
///
/// The enumeration is fixed; storage backends map each variant to whatever
/// label their winners table expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Award {
    /// Reduced-odds tier, primary winners.
    TierAPrimary,
    /// Reduced-odds tier, alternates drawn from the primary draw's leftover.
    TierAAlternate,
    /// Standard-odds tier, primary winners.
    TierBPrimary,
    /// Standard-odds tier, alternates drawn from the primary draw's leftover.
    TierBAlternate,
}

impl Award {
    pub const ALL: [Award; 4] = [
        Award::TierAPrimary,
        Award::TierAAlternate,
        Award::TierBPrimary,
        Award::TierBAlternate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TierAPrimary => "Tier-A-Primary",
            Self::TierAAlternate => "Tier-A-Alternate",
            Self::TierBPrimary => "Tier-B-Primary",
            Self::TierBAlternate => "Tier-B-Alternate",
        }
    }
}

impl fmt::Display for Award {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted projection of one winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerRecord {
    pub participant_id: ParticipantId,
    pub award: Award,
}
