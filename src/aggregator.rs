// ➕ Period Aggregator - Component sums per (operadora, period)
// Pure transform: group, classify, sum, then join against the roster

use crate::config::EngineConfig;
use crate::model::{LedgerEntry, Period, PeriodComponentSummary, RosterRecord};
use crate::rules::RuleEngine;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Map key for everything computed per operadora/period
pub type SummaryKey = (String, Period);

/// Aggregated component summaries, deterministically ordered
pub type SummaryMap = BTreeMap<SummaryKey, PeriodComponentSummary>;

// ============================================================================
// AGGREGATION
// ============================================================================

/// Group ledger entries by (operadora, period) and sum balances per
/// component as classified by the rule engine
///
/// Sums are commutative: permuting the input yields an identical map.
/// Components with no matching entry stay at zero.
pub fn aggregate(entries: &[LedgerEntry], engine: &RuleEngine) -> SummaryMap {
    let mut summaries = SummaryMap::new();

    for entry in entries {
        let component = engine.classify_raw(&entry.raw_code);
        let summary = summaries
            .entry((entry.reg_ans.clone(), entry.period))
            .or_insert_with(|| PeriodComponentSummary::new(&entry.reg_ans, entry.period));
        summary.accumulate(component, entry.balance);
    }

    info!(
        entries = entries.len(),
        groups = summaries.len(),
        "aggregated ledger entries"
    );

    summaries
}

// ============================================================================
// ROSTER JOIN
// ============================================================================

/// Immutable roster lookup keyed by (operadora, period)
///
/// Duplicate roster rows keep the first occurrence.
pub struct RosterIndex {
    records: BTreeMap<SummaryKey, RosterRecord>,
}

impl RosterIndex {
    pub fn build(records: Vec<RosterRecord>) -> Self {
        let mut map = BTreeMap::new();
        for record in records {
            map.entry((record.reg_ans.clone(), record.period))
                .or_insert(record);
        }
        RosterIndex { records: map }
    }

    pub fn get(&self, reg_ans: &str, period: Period) -> Option<&RosterRecord> {
        self.records.get(&(reg_ans.to_string(), period))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Restrict aggregated summaries to qualifying operadoras and attach roster
/// data to the survivors
///
/// A summary survives when its roster row exists, its modality is in the
/// allow-list, and it is active. A missing active flag takes the configured
/// default (permissive: active). Summaries with no roster row at all are
/// silently dropped - that is the join semantics, not an error.
pub fn filter_with_roster(
    summaries: SummaryMap,
    roster: &RosterIndex,
    config: &EngineConfig,
) -> SummaryMap {
    let before = summaries.len();

    let filtered: SummaryMap = summaries
        .into_iter()
        .filter_map(|((reg_ans, period), mut summary)| {
            let record = match roster.get(&reg_ans, period) {
                Some(record) => record,
                None => {
                    debug!(%reg_ans, %period, "no roster row, dropping");
                    return None;
                }
            };

            if !config.allows(record.modality) {
                debug!(%reg_ans, %period, modality = record.modality.as_str(), "modality not allowed");
                return None;
            }

            if !record.active.unwrap_or(config.default_active) {
                debug!(%reg_ans, %period, "operadora inactive");
                return None;
            }

            summary.beneficiaries = Some(record.beneficiaries);
            summary.modality = Some(record.modality);
            summary.trade_name = Some(record.trade_name.clone());
            summary.porte = record.porte.clone();
            summary.uniodonto = record.uniodonto;

            Some(((reg_ans, period), summary))
        })
        .collect();

    info!(before, after = filtered.len(), "roster filter applied");

    filtered
}

/// Attach externally supplied net results by (operadora, period)
///
/// Summaries without a supplement keep `net_result = None`, which makes the
/// margin/ROE indicators undefined rather than wrong.
pub fn attach_net_results(summaries: &mut SummaryMap, net_results: &BTreeMap<SummaryKey, f64>) {
    for (key, summary) in summaries.iter_mut() {
        if let Some(value) = net_results.get(key) {
            summary.net_result = Some(*value);
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Modality;

    fn entry(reg_ans: &str, period: Period, code: &str, balance: f64) -> LedgerEntry {
        LedgerEntry {
            reg_ans: reg_ans.to_string(),
            period,
            raw_code: code.to_string(),
            description: format!("conta {}", code),
            balance,
        }
    }

    fn roster(reg_ans: &str, period: Period, modality: Modality, active: Option<bool>) -> RosterRecord {
        RosterRecord {
            reg_ans: reg_ans.to_string(),
            period,
            beneficiaries: 1_000,
            modality,
            active,
            trade_name: format!("Operadora {}", reg_ans),
            porte: Some("Pequeno".to_string()),
            uniodonto: false,
        }
    }

    #[test]
    fn test_aggregate_worked_example() {
        let p = Period::new(2023, 1);
        let entries = vec![
            entry("E1", p, "3111", 100_000.0),
            entry("E1", p, "3117", -5_000.0),
            entry("E1", p, "4101", 60_000.0),
        ];

        let summaries = aggregate(&entries, &RuleEngine::default());
        let summary = &summaries[&("E1".to_string(), p)];

        assert_eq!(summary.contraprestacoes, 100_000.0);
        assert_eq!(summary.cct_abs, 5_000.0);
        assert_eq!(summary.eventos_liquidos, 60_000.0);
        assert_eq!(summary.despesas_comerciais, 0.0);
        assert_eq!(summary.patrimonio_liquido, 0.0);
    }

    #[test]
    fn test_aggregate_is_order_independent() {
        let p = Period::new(2023, 1);
        let entries = vec![
            entry("E1", p, "3111", 100_000.0),
            entry("E1", p, "3117", -5_000.0),
            entry("E1", p, "4101", 60_000.0),
            entry("E2", p, "4101", 10_000.0),
        ];
        let mut reversed = entries.clone();
        reversed.reverse();

        let engine = RuleEngine::default();
        assert_eq!(aggregate(&entries, &engine), aggregate(&reversed, &engine));
    }

    #[test]
    fn test_aggregate_groups_by_operadora_and_period() {
        let p1 = Period::new(2023, 1);
        let p2 = Period::new(2023, 2);
        let entries = vec![
            entry("E1", p1, "3111", 100.0),
            entry("E1", p2, "3111", 200.0),
            entry("E2", p1, "3111", 300.0),
        ];

        let summaries = aggregate(&entries, &RuleEngine::default());

        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[&("E1".to_string(), p1)].contraprestacoes, 100.0);
        assert_eq!(summaries[&("E1".to_string(), p2)].contraprestacoes, 200.0);
        assert_eq!(summaries[&("E2".to_string(), p1)].contraprestacoes, 300.0);
    }

    #[test]
    fn test_aggregate_malformed_code_goes_to_outros() {
        let p = Period::new(2023, 1);
        let entries = vec![entry("E1", p, "???", 42.0)];

        let summaries = aggregate(&entries, &RuleEngine::default());

        // Never dropped, never fatal
        assert_eq!(summaries[&("E1".to_string(), p)].outros, 42.0);
    }

    #[test]
    fn test_roster_filter_keeps_qualifying_rows() {
        let p = Period::new(2023, 1);
        let summaries = aggregate(&[entry("E1", p, "3111", 100.0)], &RuleEngine::default());
        let roster = RosterIndex::build(vec![roster(
            "E1",
            p,
            Modality::CooperativaOdontologica,
            Some(true),
        )]);
        assert_eq!(roster.len(), 1);

        let filtered = filter_with_roster(summaries, &roster, &EngineConfig::default());

        assert_eq!(filtered.len(), 1);
        let summary = &filtered[&("E1".to_string(), p)];
        assert_eq!(summary.beneficiaries, Some(1_000));
        assert_eq!(summary.modality, Some(Modality::CooperativaOdontologica));
        assert_eq!(summary.trade_name.as_deref(), Some("Operadora E1"));
    }

    #[test]
    fn test_roster_filter_drops_disallowed_modality() {
        let p = Period::new(2023, 1);
        let summaries = aggregate(&[entry("E1", p, "3111", 100.0)], &RuleEngine::default());
        let roster = RosterIndex::build(vec![roster("E1", p, Modality::Outra, Some(true))]);

        let filtered = filter_with_roster(summaries, &roster, &EngineConfig::default());

        assert!(filtered.is_empty());
    }

    #[test]
    fn test_roster_filter_drops_inactive() {
        let p = Period::new(2023, 1);
        let summaries = aggregate(&[entry("E1", p, "3111", 100.0)], &RuleEngine::default());
        let roster = RosterIndex::build(vec![roster(
            "E1",
            p,
            Modality::OdontologiaDeGrupo,
            Some(false),
        )]);

        let filtered = filter_with_roster(summaries, &roster, &EngineConfig::default());

        assert!(filtered.is_empty());
    }

    #[test]
    fn test_roster_filter_missing_active_defaults_to_active() {
        let p = Period::new(2023, 1);
        let summaries = aggregate(&[entry("E1", p, "3111", 100.0)], &RuleEngine::default());
        let roster = RosterIndex::build(vec![roster(
            "E1",
            p,
            Modality::OdontologiaDeGrupo,
            None,
        )]);

        let filtered = filter_with_roster(summaries, &roster, &EngineConfig::default());

        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_roster_filter_missing_row_drops_silently() {
        let p = Period::new(2023, 1);
        let summaries = aggregate(&[entry("E1", p, "3111", 100.0)], &RuleEngine::default());
        let roster = RosterIndex::build(vec![]);
        assert!(roster.is_empty());

        let filtered = filter_with_roster(summaries, &roster, &EngineConfig::default());

        assert!(filtered.is_empty());
    }

    #[test]
    fn test_attach_net_results() {
        let p = Period::new(2023, 1);
        let mut summaries = aggregate(&[entry("E1", p, "3111", 100.0)], &RuleEngine::default());

        let mut net = BTreeMap::new();
        net.insert(("E1".to_string(), p), 12_345.0);
        net.insert(("E9".to_string(), p), 999.0);

        attach_net_results(&mut summaries, &net);

        assert_eq!(summaries[&("E1".to_string(), p)].net_result, Some(12_345.0));
    }
}
