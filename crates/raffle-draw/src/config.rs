//! Runtime configuration for a draw.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. Command-line flags (`--seed`, handled by the caller)
//! 2. Environment variables (`HOST_DB`, `PORT_DB`, `DATABASE_NAME`, `USER_DB`,
//!    `PASSWORD_DB`, `RAFFLE_SEED`, `RAFFLE_AUDIT_LOG`)
//! 3. The TOML file (`--config`, else `raffle-draw.toml` if present)
//! 4. Built-in defaults, including the four-stage plan
//!
//! ## Example
//!
//! ```toml
//! [database]
//! host = "db.internal"
//! dbname = "raffle"
//!
//! [storage]
//! schema = "messi25"
//! award_type_cast = "enum_winners_award_type"
//!
//! [storage.award_labels]
//! tier_a_primary = "M&G Titulares"
//!
//! [draw]
//! seed = 20250301
//!
//! [[plan.stages]]
//! name = "tier-a-primary"
//! award = "tier-a-primary"
//! count = 5
//! source = { kind = "fresh", odds = "reduced" }
//! ```

use std::env;
use std::path::{Path, PathBuf};

use draw_engine::{Award, DrawError, DrawPlan, SamplingPolicy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "raffle-draw.toml";
/// Default append-only audit trail location.
pub const DEFAULT_AUDIT_LOG: &str = "logs/draw-audit.jsonl";

const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;
const DEFAULT_DB_NAME: &str = "raffle";
const DEFAULT_DB_USER: &str = "postgres";
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 20;

const ENV_DB_HOST: &str = "HOST_DB";
const ENV_DB_PORT: &str = "PORT_DB";
const ENV_DB_NAME: &str = "DATABASE_NAME";
const ENV_DB_USER: &str = "USER_DB";
const ENV_DB_PASSWORD: &str = "PASSWORD_DB";
const ENV_SEED: &str = "RAFFLE_SEED";
const ENV_AUDIT_LOG: &str = "RAFFLE_AUDIT_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{key} must be a plain SQL identifier, got {value:?}")]
    InvalidIdentifier { key: &'static str, value: String },

    #[error(transparent)]
    Plan(#[from] DrawError),
}

/// Postgres connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            dbname: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Label written to the winners table for each award.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AwardLabels {
    pub tier_a_primary: String,
    pub tier_a_alternate: String,
    pub tier_b_primary: String,
    pub tier_b_alternate: String,
}

impl Default for AwardLabels {
    fn default() -> Self {
        Self {
            tier_a_primary: Award::TierAPrimary.to_string(),
            tier_a_alternate: Award::TierAAlternate.to_string(),
            tier_b_primary: Award::TierBPrimary.to_string(),
            tier_b_alternate: Award::TierBAlternate.to_string(),
        }
    }
}

impl AwardLabels {
    pub fn label(&self, award: Award) -> &str {
        match award {
            Award::TierAPrimary => &self.tier_a_primary,
            Award::TierAAlternate => &self.tier_a_alternate,
            Award::TierBPrimary => &self.tier_b_primary,
            Award::TierBAlternate => &self.tier_b_alternate,
        }
    }
}

/// Where tickets are read from and winners written to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub schema: String,
    pub tickets_table: String,
    pub winners_table: String,
    /// SQL type the award label is cast to on insert, for enum-typed columns.
    /// `None` inserts the label as plain text.
    pub award_type_cast: Option<String>,
    pub award_labels: AwardLabels,
    /// Write every stage inside one transaction committed after the last stage.
    pub single_transaction: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            schema: "public".to_string(),
            tickets_table: "tickets".to_string(),
            winners_table: "winners".to_string(),
            award_type_cast: None,
            award_labels: AwardLabels::default(),
            single_transaction: true,
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_identifier("storage.schema", &self.schema)?;
        check_identifier("storage.tickets_table", &self.tickets_table)?;
        check_identifier("storage.winners_table", &self.winners_table)?;
        if let Some(cast) = &self.award_type_cast {
            check_identifier("storage.award_type_cast", cast)?;
        }
        Ok(())
    }

    /// `schema.table` for the tickets table.
    pub fn tickets(&self) -> String {
        format!("{}.{}", self.schema, self.tickets_table)
    }

    /// `schema.table` for the winners table.
    pub fn winners(&self) -> String {
        format!("{}.{}", self.schema, self.winners_table)
    }
}

/// Table and type names are interpolated into SQL, so only plain identifiers
/// are accepted.
fn check_identifier(key: &'static str, value: &str) -> Result<(), ConfigError> {
    let mut chars = value.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            key,
            value: value.to_string(),
        })
    }
}

/// Sampling settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawSettings {
    /// Fixed seed; a fresh one is generated (and logged) when absent.
    pub seed: Option<u64>,
    pub policy: SamplingPolicy,
}

/// Audit trail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// JSON-lines file receiving one record per stage. `None` disables it.
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: Some(PathBuf::from(DEFAULT_AUDIT_LOG)),
        }
    }
}

/// Top-level draw configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub draw: DrawSettings,
    pub audit: AuditConfig,
    pub plan: DrawPlan,
}

impl DrawConfig {
    /// Load from `path`, or from [`DEFAULT_CONFIG_FILE`] when it exists, or
    /// fall back to defaults; then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_DB_HOST) {
            self.database.host = host;
        }
        if let Some(port) = lookup(ENV_DB_PORT) {
            self.database.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_DB_PORT,
                value: port.clone(),
            })?;
        }
        if let Some(name) = lookup(ENV_DB_NAME) {
            self.database.dbname = name;
        }
        if let Some(user) = lookup(ENV_DB_USER) {
            self.database.user = user;
        }
        if let Some(password) = lookup(ENV_DB_PASSWORD) {
            self.database.password = password;
        }
        if let Some(seed) = lookup(ENV_SEED) {
            let parsed = seed.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_SEED,
                value: seed.clone(),
            })?;
            self.draw.seed = Some(parsed);
        }
        if let Some(path) = lookup(ENV_AUDIT_LOG) {
            self.audit.path = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.plan.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = DrawConfig::default();
        config.validate().unwrap();
        assert!(config.storage.single_transaction);
        assert_eq!(config.plan, DrawPlan::default());
        assert_eq!(config.draw.policy, SamplingPolicy::ReshufflePerRound);
    }

    #[test]
    fn env_overrides_database_and_seed() {
        let mut config = DrawConfig::default();
        config
            .apply_overrides(lookup(&[
                ("HOST_DB", "db.internal"),
                ("PORT_DB", "6543"),
                ("DATABASE_NAME", "draws"),
                ("USER_DB", "raffle"),
                ("PASSWORD_DB", "secret"),
                ("RAFFLE_SEED", "42"),
            ]))
            .unwrap();
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.dbname, "draws");
        assert_eq!(config.database.user, "raffle");
        assert_eq!(config.database.password, "secret");
        assert_eq!(config.draw.seed, Some(42));
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut config = DrawConfig::default();
        let err = config
            .apply_overrides(lookup(&[("PORT_DB", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "PORT_DB", .. }));
    }

    #[test]
    fn empty_audit_override_disables_audit_log() {
        let mut config = DrawConfig::default();
        config
            .apply_overrides(lookup(&[("RAFFLE_AUDIT_LOG", "")]))
            .unwrap();
        assert!(config.audit.path.is_none());
    }

    #[test]
    fn identifiers_are_checked() {
        let mut config = DrawConfig::default();
        config.storage.winners_table = "winners; drop table tickets".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidIdentifier { .. })
        ));
        assert!(check_identifier("k", "enum_winners_award_type").is_ok());
        assert!(check_identifier("k", "9lives").is_err());
        assert!(check_identifier("k", "").is_err());
    }

    #[test]
    fn award_labels_default_to_award_names() {
        let labels = AwardLabels::default();
        for award in Award::ALL {
            assert_eq!(labels.label(award), award.as_str());
        }
    }

    #[test]
    fn password_is_not_serialized() {
        let mut config = DrawConfig::default();
        config.database.password = "hunter2".into();
        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("hunter2"));
    }
}
