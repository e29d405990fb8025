//! Runner tests: TOML configuration and file-backed simulations with the
//! audit trail enabled. Nothing here needs a database.

use std::path::Path;

use draw_engine::{Award, Odds, PoolSource, SamplingPolicy};
use raffle_draw::{simulate, DrawConfig};
use serde_json::Value;

fn write(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

fn audit_lines(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn weights_json(n: i64) -> String {
    let rows: Vec<Value> = (1..=n)
        .map(|id| serde_json::json!({ "client_id": id, "total_options": ((id * 11) % 40 + 1).to_string() }))
        .collect();
    serde_json::to_string(&rows).unwrap()
}

fn config_with_audit(dir: &Path) -> DrawConfig {
    let mut config = DrawConfig::default();
    config.audit.path = Some(dir.join("audit/draw.jsonl"));
    config
}

// ── Configuration ────────────────────────────────────────────────────────────

#[test]
fn loads_custom_plan_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("raffle.toml");
    write(
        &path,
        r#"
[database]
host = "db.internal"
port = 6432

[storage]
schema = "messi25"
award_type_cast = "enum_winners_award_type"
single_transaction = false

[storage.award_labels]
tier_a_primary = "M&G Titulares"

[draw]
seed = 99
policy = "single_shuffle"

[plan]
reduced_odds_divisor = 5

[[plan.stages]]
name = "vip"
award = "tier-a-primary"
count = 2
source = { kind = "fresh", odds = "reduced" }

[[plan.stages]]
name = "vip-backup"
award = "tier-a-alternate"
count = 3
source = { kind = "leftover", stage = "vip" }
"#,
    );

    let config = DrawConfig::from_file(&path).unwrap();
    config.validate().unwrap();

    assert_eq!(config.database.host, "db.internal");
    assert_eq!(config.database.port, 6432);
    assert_eq!(config.storage.winners(), "messi25.winners");
    assert!(!config.storage.single_transaction);
    assert_eq!(
        config.storage.award_labels.label(Award::TierAPrimary),
        "M&G Titulares"
    );
    assert_eq!(
        config.storage.award_labels.label(Award::TierBPrimary),
        "Tier-B-Primary"
    );
    assert_eq!(config.draw.seed, Some(99));
    assert_eq!(config.draw.policy, SamplingPolicy::SingleShuffle);
    assert_eq!(config.plan.reduced_odds_divisor, 5);
    assert_eq!(config.plan.stages.len(), 2);
    assert_eq!(
        config.plan.stages[0].source,
        PoolSource::Fresh {
            odds: Odds::Reduced
        }
    );
}

#[test]
fn plan_with_forward_reference_is_rejected() {
    let config = DrawConfig::from_toml_str(
        r#"
[[plan.stages]]
name = "alternates"
award = "tier-a-alternate"
count = 3
source = { kind = "leftover", stage = "primary" }

[[plan.stages]]
name = "primary"
award = "tier-a-primary"
count = 1
source = { kind = "fresh", odds = "standard" }
"#,
    )
    .unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn missing_config_file_is_reported_with_path() {
    let err = DrawConfig::from_file(Path::new("/nonexistent/raffle.toml")).unwrap_err();
    assert!(err.to_string().contains("/nonexistent/raffle.toml"));
}

// ── Simulation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn simulation_runs_every_stage_and_writes_audit_trail() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("weights.json");
    write(&weights, &weights_json(300));
    let config = config_with_audit(dir.path());

    let (summary, batches) = simulate(&config, &weights, Some(17)).await.unwrap();

    assert_eq!(summary.header.seed, 17);
    assert_eq!(summary.stages.len(), 4);
    assert_eq!(batches.len(), 4);
    let counts: Vec<_> = summary.stages.iter().map(|s| s.winners.len()).collect();
    assert_eq!(counts, vec![5, 20, 50, 100]);
    assert_eq!(summary.total_winners, 175);

    let lines = audit_lines(&dir.path().join("audit/draw.jsonl"));
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[0]["event"], "run_started");
    assert_eq!(lines[0]["mode"], "simulation");
    assert_eq!(lines[0]["seed"], 17);
    for line in &lines[1..5] {
        assert_eq!(line["event"], "stage_drawn");
        assert_eq!(line["run_id"], lines[0]["run_id"]);
    }
    assert_eq!(lines[5]["event"], "run_finished");
    assert_eq!(lines[5]["total_winners"], 175);
}

#[tokio::test]
async fn simulation_replays_with_same_seed() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("weights.json");
    write(&weights, &weights_json(80));
    let mut config = DrawConfig::default();
    config.audit.path = None;

    let (first, _) = simulate(&config, &weights, Some(3)).await.unwrap();
    let (second, _) = simulate(&config, &weights, Some(3)).await.unwrap();
    assert_ne!(first.header.run_id, second.header.run_id);
    assert_eq!(first.stages, second.stages);
}

#[tokio::test]
async fn invalid_weight_fails_before_any_stage() {
    let dir = tempfile::tempdir().unwrap();
    let weights = dir.path().join("weights.json");
    write(
        &weights,
        r#"[{"participant_id": 1, "weight": 4}, {"participant_id": 2, "weight": -1}]"#,
    );
    let config = config_with_audit(dir.path());

    assert!(simulate(&config, &weights, Some(1)).await.is_err());

    let lines = audit_lines(&dir.path().join("audit/draw.jsonl"));
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1]["event"], "run_finished");
    assert_eq!(lines[1]["total_winners"], 0);
    assert!(lines[1]["error"].is_string());
}

#[tokio::test]
async fn missing_weights_file_is_a_data_access_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = DrawConfig::default();
    config.audit.path = None;

    let err = simulate(&config, &dir.path().join("absent.json"), Some(1))
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("fetching participant weights"));
}
