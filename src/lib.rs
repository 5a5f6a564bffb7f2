// ANS Indicator Engine - Core Library
// RN 518 economic-financial indicators for odontological operadoras:
// classify ledger balances into components, aggregate per quarter, compute
// the indicator set and reconcile it against published values

pub mod aggregator;
pub mod config;
pub mod indicators;
pub mod model;
pub mod reconciliation;
pub mod report;
pub mod rules;
pub mod sources;

// Re-export commonly used types
pub use aggregator::{
    aggregate, attach_net_results, filter_with_roster, RosterIndex, SummaryKey, SummaryMap,
};
pub use config::EngineConfig;
pub use indicators::{
    format_value, indicator_kind, rating, HistoryIndex, IndicatorCalculator, IndicatorKind,
    IndicatorSet, SafeValue, INDICATOR_NAMES,
};
pub use model::{
    Component, LedgerEntry, Modality, Period, PeriodComponentSummary, RosterRecord,
};
pub use reconciliation::{ReconciliationDiff, ReconciliationEngine, ReconciliationReport};
pub use report::{write_component_report, write_indicator_report, write_reconciliation_report};
pub use rules::{
    default_rules, normalize_code, ClassificationRule, MatchStrategy, MatcherKind, RuleEngine,
};
pub use sources::{
    load_net_results, read_ledger, read_net_results, read_roster, read_stored_indicators,
    CsvLedgerSource, CsvRosterSource, CsvStoredIndicatorSource, LedgerSource, RosterSource,
    StoredIndicatorSource,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    /// Full pipeline over a small batch: aggregate, filter, compute,
    /// reconcile. Covers the stages working together rather than any one
    /// formula.
    #[test]
    fn test_full_pipeline() {
        let config = EngineConfig::default();
        let engine = config.rule_engine().unwrap();

        let ledger = "\
reg_ans,ano,trimestre,conta,descricao,saldo
334537,2022,4,2501,Patrimônio Líquido,90000.0
334537,2023,1,3111,Contraprestações,100000.0
334537,2023,1,31.17,Recuperação CCT,-5000.0
334537,2023,1,4101,Eventos,60000.0
334537,2023,1,2501,Patrimônio Líquido,110000.0
999999,2023,1,3111,Contraprestações,50000.0
";
        let roster = "\
reg_ans,ano,trimestre,qt_beneficiarios,modalidade,ativa,nome_fantasia,porte,uniodonto
334537,2022,4,14000,COOPERATIVA ODONTOLÓGICA,SIM,Uniodonto Capital,Pequeno,SIM
334537,2023,1,15000,COOPERATIVA ODONTOLÓGICA,SIM,Uniodonto Capital,Pequeno,SIM
999999,2023,1,8000,MEDICINA DE GRUPO,SIM,Plano Médico,Médio,NÃO
";

        let entries = read_ledger(ledger.as_bytes()).unwrap();
        let roster_records = read_roster(roster.as_bytes()).unwrap();

        let summaries = aggregate(&entries, &engine);
        let filtered = filter_with_roster(summaries, &RosterIndex::build(roster_records), &config);

        // The medical operadora is filtered out by modality
        assert_eq!(filtered.len(), 2);

        let history = HistoryIndex::from_summaries(&filtered);
        let sets = IndicatorCalculator::from_config(&config).compute_all(&filtered, &history);

        let current = sets
            .iter()
            .find(|s| s.period == Period::new(2023, 1))
            .unwrap();
        assert!((current.sinistralidade.value().unwrap() - 65_000.0 / 105_000.0).abs() < 1e-12);

        // Reconcile the batch against itself: clean by definition
        let report = ReconciliationEngine::with_epsilon(config.epsilon).reconcile_all(&sets, &sets);
        assert!(report.is_clean());

        // Idempotence: recomputing from the same inputs is byte-identical
        let entries_again = read_ledger(ledger.as_bytes()).unwrap();
        let summaries_again = aggregate(&entries_again, &engine);
        let filtered_again = filter_with_roster(
            summaries_again,
            &RosterIndex::build(read_roster(roster.as_bytes()).unwrap()),
            &config,
        );

        let mut first = Vec::new();
        let mut second = Vec::new();
        write_component_report(&mut first, &filtered).unwrap();
        write_component_report(&mut second, &filtered_again).unwrap();
        assert_eq!(first, second);
    }
}
