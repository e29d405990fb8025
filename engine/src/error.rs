//! Error taxonomy for the draw engine.
//!
//! | Variant                | Raised by              | When                               |
//! |------------------------|------------------------|------------------------------------|
//! | `InvalidWeight`        | `PoolBuilder`, cascade | before any stage draws             |
//! | `DuplicateParticipant` | `PoolBuilder`, cascade | before any stage draws             |
//! | `InvalidPlan`          | `DrawPlan::validate`   | before any stage draws             |
//! | `DataAccess`           | cascade                | fetching weights / persisting wins |
//!
//! Running out of distinct participants before a stage reaches its target
//! count is not an error: the stage simply returns fewer winners.

use thiserror::Error;

use crate::participant::ParticipantId;

#[derive(Debug, Error)]
pub enum DrawError {
    /// A participant carried a negative aggregated weight.
    #[error("Invalid weight {weight} for participant {participant}")]
    InvalidWeight {
        participant: ParticipantId,
        weight: i64,
    },

    /// The weight set listed the same participant more than once.
    #[error("Participant {0} appears more than once in the weight set")]
    DuplicateParticipant(ParticipantId),

    /// The stage table is inconsistent.
    #[error("Invalid draw plan: {0}")]
    InvalidPlan(String),

    /// Fetching weights or persisting winners failed.
    #[error("Data access failed while {context}: {source:#}")]
    DataAccess {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DrawError {
    pub fn plan(message: impl Into<String>) -> Self {
        Self::InvalidPlan(message.into())
    }

    pub fn data_access(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::DataAccess {
            context: context.into(),
            source,
        }
    }

    /// Whether the error was raised before any winner could have been drawn.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidWeight { .. } | Self::DuplicateParticipant(_) | Self::InvalidPlan(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_weight_message_names_participant() {
        let err = DrawError::InvalidWeight {
            participant: ParticipantId(42),
            weight: -3,
        };
        assert_eq!(err.to_string(), "Invalid weight -3 for participant 42");
        assert!(err.is_input_error());
    }

    #[test]
    fn data_access_keeps_source_chain() {
        let err = DrawError::data_access(
            "persisting stage tier-b",
            anyhow::anyhow!("connection reset"),
        );
        assert!(!err.is_input_error());
        assert!(err.to_string().contains("connection reset"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
