//! Aggregated weights read from a JSON file, for simulations and replays.
//!
//! Accepts either the engine's field names or the raw aggregation output
//! (`client_id` / `total_options`, where the sum may arrive as a string):
//!
//! ```json
//! [{"participant_id": 1, "weight": 12}, {"client_id": 2, "total_options": "30"}]
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use draw_engine::{ParticipantWeight, WeightSource};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Count {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct WeightRow {
    #[serde(alias = "client_id")]
    participant_id: i64,
    #[serde(alias = "total_options")]
    weight: Count,
}

impl WeightRow {
    fn into_weight(self) -> Result<ParticipantWeight> {
        let weight = match self.weight {
            Count::Number(n) => n,
            Count::Text(s) => s.trim().parse().with_context(|| {
                format!(
                    "weight {s:?} for participant {} is not an integer",
                    self.participant_id
                )
            })?,
        };
        Ok(ParticipantWeight::new(self.participant_id, weight))
    }
}

/// Parse a JSON array of weight rows.
pub fn parse_weights(json: &str) -> Result<Vec<ParticipantWeight>> {
    let rows: Vec<WeightRow> = serde_json::from_str(json).context("Failed to parse weights JSON")?;
    rows.into_iter().map(WeightRow::into_weight).collect()
}

/// [`WeightSource`] backed by a JSON file, read on every fetch.
#[derive(Debug, Clone)]
pub struct JsonWeightsFile {
    path: PathBuf,
}

impl JsonWeightsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WeightSource for JsonWeightsFile {
    async fn fetch_weights(&mut self) -> Result<Vec<ParticipantWeight>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        parse_weights(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draw_engine::ParticipantId;

    #[test]
    fn parses_engine_field_names() {
        let weights = parse_weights(r#"[{"participant_id": 1, "weight": 12}]"#).unwrap();
        assert_eq!(weights, vec![ParticipantWeight::new(1, 12)]);
    }

    #[test]
    fn parses_aggregation_output_with_string_sums() {
        let weights =
            parse_weights(r#"[{"client_id": 7, "total_options": "30"}, {"client_id": 8, "total_options": 4}]"#)
                .unwrap();
        assert_eq!(weights[0].participant_id, ParticipantId(7));
        assert_eq!(weights[0].weight, 30);
        assert_eq!(weights[1].weight, 4);
    }

    #[test]
    fn rejects_non_integer_weight() {
        let err = parse_weights(r#"[{"client_id": 7, "total_options": "3.5"}]"#).unwrap_err();
        assert!(err.to_string().contains("not an integer"));
    }
}
