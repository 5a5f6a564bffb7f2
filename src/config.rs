// ⚙️ Engine Configuration - JSON-loadable, validated before processing
// Invalid configuration fails fast at load time, never mid-batch

use crate::model::Modality;
use crate::rules::{MatchStrategy, RuleEngine};
use anyhow::{bail, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Recognized configuration surface of the indicator engine
///
/// Every field has a default; a config file only needs the keys it wants to
/// override. Unknown keys are rejected so a typo cannot silently fall back
/// to a default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Absolute tolerance for reconciliation diffs
    pub epsilon: f64,

    /// Day-count convention for the receivable/payable day metrics
    pub day_count: f64,

    /// Modalities retained by the roster join
    pub allowed_modalities: Vec<Modality>,

    /// How an absent roster active flag is interpreted
    pub default_active: bool,

    /// Rule table evaluation order
    pub match_strategy: MatchStrategy,

    /// Optional JSON file overriding the built-in classification rule table
    pub rules_path: Option<PathBuf>,

    /// Include non-mismatching rows in the reconciliation report
    pub include_clean_rows: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            epsilon: 1e-6,
            day_count: 360.0,
            allowed_modalities: vec![
                Modality::CooperativaOdontologica,
                Modality::OdontologiaDeGrupo,
            ],
            default_active: true,
            match_strategy: MatchStrategy::DeclaredOrder,
            rules_path: None,
            include_clean_rows: false,
        }
    }
}

impl EngineConfig {
    /// Load and validate a config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: EngineConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        config.validate()?;
        Ok(config)
    }

    /// Fail fast on configuration that would corrupt a whole batch
    pub fn validate(&self) -> Result<()> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            bail!("epsilon must be a non-negative finite number, got {}", self.epsilon);
        }
        if !self.day_count.is_finite() || self.day_count <= 0.0 {
            bail!("day_count must be a positive number, got {}", self.day_count);
        }
        if self.allowed_modalities.is_empty() {
            bail!("allowed_modalities must not be empty (nothing would qualify)");
        }
        Ok(())
    }

    /// Build the rule engine this config describes
    ///
    /// Loads the override table when `rules_path` is set, otherwise the
    /// built-in RN 518 table. Either way a malformed table fails here,
    /// before any entry is classified.
    pub fn rule_engine(&self) -> Result<RuleEngine> {
        match &self.rules_path {
            Some(path) => RuleEngine::from_file(path, self.match_strategy),
            None => Ok(RuleEngine::with_default_rules(self.match_strategy)),
        }
    }

    pub fn allows(&self, modality: Modality) -> bool {
        self.allowed_modalities.contains(&modality)
    }
}

// ============================================================================
// TESTS
// ============================================================================
