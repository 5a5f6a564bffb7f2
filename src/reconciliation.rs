// ⚖️ Reconciliation Engine - Stored vs recomputed indicators
// Recomputes each published indicator from its components and flags any
// absolute difference beyond the configured tolerance

use crate::indicators::IndicatorSet;
use crate::model::Period;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

// ============================================================================
// RECONCILIATION DIFF
// ============================================================================

/// One stored/recomputed comparison for one indicator
///
/// Only pairs where both sides are defined are ever emitted; recomputation
/// limits (undefined values) are accepted, not flagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationDiff {
    pub reg_ans: String,
    pub period: Period,
    pub indicator: String,
    pub stored: f64,
    pub recomputed: f64,
    /// |stored - recomputed|; symmetric by construction
    pub diff: f64,
    pub mismatch: bool,
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub diffs: Vec<ReconciliationDiff>,

    /// Pairs compared (both sides defined)
    pub compared: usize,

    /// Pairs skipped because either side was undefined
    pub skipped_undefined: usize,

    /// (operadora, period) groups present in only one of the two sets
    pub unmatched_groups: usize,

    pub epsilon: f64,

    pub reconciled_at: DateTime<Utc>,
}

impl ReconciliationReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &ReconciliationDiff> {
        self.diffs.iter().filter(|d| d.mismatch)
    }

    pub fn mismatch_count(&self) -> usize {
        self.mismatches().count()
    }

    pub fn is_clean(&self) -> bool {
        self.mismatch_count() == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "Reconciliation: {} pairs compared, {} mismatches (epsilon {}), {} skipped as undefined, {} unmatched groups",
            self.compared,
            self.mismatch_count(),
            self.epsilon,
            self.skipped_undefined,
            self.unmatched_groups
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    /// Absolute tolerance before a difference counts as a mismatch
    epsilon: f64,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        ReconciliationEngine { epsilon: 1e-6 }
    }

    pub fn with_epsilon(epsilon: f64) -> Self {
        ReconciliationEngine { epsilon }
    }

    /// Diff one stored indicator set against its recomputed counterpart
    ///
    /// Pure and symmetric: swapping the two sets changes which column a
    /// value lands in, never the diff or the mismatch flag.
    pub fn reconcile(
        &self,
        stored: &IndicatorSet,
        recomputed: &IndicatorSet,
    ) -> Vec<ReconciliationDiff> {
        stored
            .named_values()
            .into_iter()
            .zip(recomputed.named_values())
            .filter_map(|((name, stored_value), (_, recomputed_value))| {
                let stored_value = stored_value.value()?;
                let recomputed_value = recomputed_value.value()?;
                let diff = (stored_value - recomputed_value).abs();

                Some(ReconciliationDiff {
                    reg_ans: recomputed.reg_ans.clone(),
                    period: recomputed.period,
                    indicator: name.to_string(),
                    stored: stored_value,
                    recomputed: recomputed_value,
                    diff,
                    mismatch: diff > self.epsilon,
                })
            })
            .collect()
    }

    /// Diff every (operadora, period) group present in both collections
    pub fn reconcile_all(
        &self,
        stored: &[IndicatorSet],
        recomputed: &[IndicatorSet],
    ) -> ReconciliationReport {
        let stored_by_key: BTreeMap<(String, Period), &IndicatorSet> = stored
            .iter()
            .map(|set| ((set.reg_ans.clone(), set.period), set))
            .collect();

        let mut diffs = Vec::new();
        let mut skipped_undefined = 0;
        let mut matched_groups = 0;

        for set in recomputed {
            let key = (set.reg_ans.clone(), set.period);
            let stored_set = match stored_by_key.get(&key) {
                Some(stored_set) => stored_set,
                None => continue,
            };
            matched_groups += 1;

            let pairs = self.reconcile(stored_set, set);
            skipped_undefined += set.named_values().len() - pairs.len();
            diffs.extend(pairs);
        }

        let unmatched_groups = stored.len().saturating_sub(matched_groups)
            + recomputed.len().saturating_sub(matched_groups);

        let report = ReconciliationReport {
            compared: diffs.len(),
            skipped_undefined,
            unmatched_groups,
            epsilon: self.epsilon,
            reconciled_at: Utc::now(),
            diffs,
        };

        info!(
            compared = report.compared,
            mismatches = report.mismatch_count(),
            "reconciliation finished"
        );

        report
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
