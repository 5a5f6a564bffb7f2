// 📂 Input Sources - CSV adapters for the external collaborators
// Ledger, roster, stored indicators and the net-result supplement all arrive
// as CSV extracts with the upstream dataset's Portuguese column names

use crate::aggregator::SummaryKey;
use crate::indicators::{IndicatorSet, SafeValue};
use crate::model::{LedgerEntry, Modality, Period, RosterRecord};
use anyhow::{bail, Context as AnyhowContext, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

// ============================================================================
// SOURCE TRAITS
// ============================================================================

/// Yields ledger entries for the requested batch
pub trait LedgerSource {
    fn load(&self) -> Result<Vec<LedgerEntry>>;
}

/// Yields roster records (enrollment, modality, active flag) for the batch
pub trait RosterSource {
    fn load(&self) -> Result<Vec<RosterRecord>>;
}

/// Yields previously published indicator sets (audit mode only)
pub trait StoredIndicatorSource {
    fn load(&self) -> Result<Vec<IndicatorSet>>;
}

// ============================================================================
// PERIOD PARSING
// ============================================================================

fn period_from(ano: i32, trimestre: u8) -> Result<Period> {
    if !(1..=4).contains(&trimestre) {
        bail!("trimestre must be 1-4, got {}", trimestre);
    }
    Ok(Period::new(ano, trimestre))
}

// ============================================================================
// LEDGER CSV
// ============================================================================

/// Columns: reg_ans, ano, trimestre, conta, descricao, saldo
#[derive(Debug, Deserialize)]
struct LedgerRow {
    reg_ans: String,
    ano: i32,
    trimestre: u8,
    conta: String,
    #[serde(default)]
    descricao: String,
    saldo: f64,
}

pub fn read_ledger<R: io::Read>(reader: R) -> Result<Vec<LedgerEntry>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut entries = Vec::new();

    for (idx, result) in rdr.deserialize().enumerate() {
        let row: LedgerRow = result.with_context(|| format!("ledger row {}", idx + 1))?;
        let period = period_from(row.ano, row.trimestre)
            .with_context(|| format!("ledger row {}", idx + 1))?;

        entries.push(LedgerEntry {
            reg_ans: row.reg_ans,
            period,
            raw_code: row.conta,
            description: row.descricao,
            balance: row.saldo,
        });
    }

    Ok(entries)
}

pub struct CsvLedgerSource {
    path: PathBuf,
}

impl CsvLedgerSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        CsvLedgerSource { path: path.into() }
    }
}

impl LedgerSource for CsvLedgerSource {
    fn load(&self) -> Result<Vec<LedgerEntry>> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Failed to open ledger CSV: {:?}", self.path))?;
        read_ledger(file)
    }
}

// ============================================================================
// ROSTER CSV
// ============================================================================

/// Columns: reg_ans, ano, trimestre, qt_beneficiarios, modalidade, ativa,
/// nome_fantasia, porte, uniodonto
#[derive(Debug, Deserialize)]
struct RosterRow {
    reg_ans: String,
    ano: i32,
    trimestre: u8,
    #[serde(default)]
    qt_beneficiarios: u64,
    #[serde(default)]
    modalidade: String,
    #[serde(default)]
    ativa: Option<String>,
    #[serde(default)]
    nome_fantasia: String,
    #[serde(default)]
    porte: Option<String>,
    #[serde(default)]
    uniodonto: Option<String>,
}

/// "SIM"/"NÃO" style flags; anything unrecognized counts as absent so the
/// configured default applies
fn parse_flag(raw: &Option<String>) -> Option<bool> {
    let value = raw.as_deref()?.trim().to_uppercase();
    match value.as_str() {
        "SIM" | "S" | "TRUE" | "1" => Some(true),
        "NAO" | "NÃO" | "N" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

pub fn read_roster<R: io::Read>(reader: R) -> Result<Vec<RosterRecord>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut records = Vec::new();

    for (idx, result) in rdr.deserialize().enumerate() {
        let row: RosterRow = result.with_context(|| format!("roster row {}", idx + 1))?;
        let period = period_from(row.ano, row.trimestre)
            .with_context(|| format!("roster row {}", idx + 1))?;

        let uniodonto = row
            .uniodonto
            .as_deref()
            .map(|v| v.trim().eq_ignore_ascii_case("SIM"))
            .unwrap_or(false);

        records.push(RosterRecord {
            reg_ans: row.reg_ans,
            period,
            beneficiaries: row.qt_beneficiarios,
            modality: Modality::parse(&row.modalidade),
            active: parse_flag(&row.ativa),
            trade_name: row.nome_fantasia.trim().to_string(),
            porte: row.porte.filter(|p| !p.trim().is_empty()),
            uniodonto,
        });
    }

    Ok(records)
}

pub struct CsvRosterSource {
    path: PathBuf,
}

impl CsvRosterSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        CsvRosterSource { path: path.into() }
    }
}

impl RosterSource for CsvRosterSource {
    fn load(&self) -> Result<Vec<RosterRecord>> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Failed to open roster CSV: {:?}", self.path))?;
        read_roster(file)
    }
}

// ============================================================================
// STORED INDICATOR CSV (audit mode)
// ============================================================================

/// Columns: reg_ans, ano, trimestre + one column per indicator; empty cells
/// are undefined values
#[derive(Debug, Deserialize)]
struct StoredIndicatorRow {
    reg_ans: String,
    ano: i32,
    trimestre: u8,
    #[serde(default = "undefined")]
    sinistralidade: SafeValue,
    #[serde(default = "undefined")]
    pct_despesas_administrativas: SafeValue,
    #[serde(default = "undefined")]
    pct_despesas_comerciais: SafeValue,
    #[serde(default = "undefined")]
    pct_despesas_operacionais: SafeValue,
    #[serde(default = "undefined")]
    indice_resultado_financeiro: SafeValue,
    #[serde(default = "undefined")]
    liquidez_corrente: SafeValue,
    #[serde(default = "undefined")]
    endividamento: SafeValue,
    #[serde(default = "undefined")]
    prazo_medio_contraprestacoes: SafeValue,
    #[serde(default = "undefined")]
    prazo_medio_eventos: SafeValue,
    #[serde(default = "undefined")]
    variacao_custo: SafeValue,
    #[serde(default = "undefined")]
    margem_liquida: SafeValue,
    #[serde(default = "undefined")]
    retorno_patrimonio_liquido: SafeValue,
}

fn undefined() -> SafeValue {
    SafeValue::Undefined
}

pub fn read_stored_indicators<R: io::Read>(reader: R) -> Result<Vec<IndicatorSet>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut sets = Vec::new();

    for (idx, result) in rdr.deserialize().enumerate() {
        let row: StoredIndicatorRow =
            result.with_context(|| format!("stored indicator row {}", idx + 1))?;
        let period = period_from(row.ano, row.trimestre)
            .with_context(|| format!("stored indicator row {}", idx + 1))?;

        sets.push(IndicatorSet {
            reg_ans: row.reg_ans,
            period,
            sinistralidade: row.sinistralidade,
            pct_despesas_administrativas: row.pct_despesas_administrativas,
            pct_despesas_comerciais: row.pct_despesas_comerciais,
            pct_despesas_operacionais: row.pct_despesas_operacionais,
            indice_resultado_financeiro: row.indice_resultado_financeiro,
            liquidez_corrente: row.liquidez_corrente,
            endividamento: row.endividamento,
            prazo_medio_contraprestacoes: row.prazo_medio_contraprestacoes,
            prazo_medio_eventos: row.prazo_medio_eventos,
            variacao_custo: row.variacao_custo,
            margem_liquida: row.margem_liquida,
            retorno_patrimonio_liquido: row.retorno_patrimonio_liquido,
        });
    }

    Ok(sets)
}

pub struct CsvStoredIndicatorSource {
    path: PathBuf,
}

impl CsvStoredIndicatorSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        CsvStoredIndicatorSource { path: path.into() }
    }
}

impl StoredIndicatorSource for CsvStoredIndicatorSource {
    fn load(&self) -> Result<Vec<IndicatorSet>> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Failed to open stored indicator CSV: {:?}", self.path))?;
        read_stored_indicators(file)
    }
}

// ============================================================================
// NET RESULT SUPPLEMENT CSV
// ============================================================================

/// Columns: reg_ans, ano, trimestre, resultado_liquido
#[derive(Debug, Deserialize)]
struct NetResultRow {
    reg_ans: String,
    ano: i32,
    trimestre: u8,
    resultado_liquido: f64,
}

pub fn read_net_results<R: io::Read>(reader: R) -> Result<BTreeMap<SummaryKey, f64>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut results = BTreeMap::new();

    for (idx, result) in rdr.deserialize().enumerate() {
        let row: NetResultRow = result.with_context(|| format!("net result row {}", idx + 1))?;
        let period = period_from(row.ano, row.trimestre)
            .with_context(|| format!("net result row {}", idx + 1))?;

        results.insert((row.reg_ans, period), row.resultado_liquido);
    }

    Ok(results)
}

pub fn load_net_results<P: AsRef<Path>>(path: P) -> Result<BTreeMap<SummaryKey, f64>> {
    let file = std::fs::File::open(path.as_ref())
        .with_context(|| format!("Failed to open net result CSV: {:?}", path.as_ref()))?;
    read_net_results(file)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_ledger() {
        let csv = "\
reg_ans,ano,trimestre,conta,descricao,saldo
334537,2023,1,3111,Contraprestações,100000.0
334537,2023,1,31.17,CCT,-5000.5
";
        let entries = read_ledger(csv.as_bytes()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].reg_ans, "334537");
        assert_eq!(entries[0].period, Period::new(2023, 1));
        assert_eq!(entries[0].raw_code, "3111");
        assert_eq!(entries[0].balance, 100_000.0);
        assert_eq!(entries[1].raw_code, "31.17");
        assert_eq!(entries[1].balance, -5_000.5);
    }

    #[test]
    fn test_read_ledger_rejects_bad_quarter() {
        let csv = "\
reg_ans,ano,trimestre,conta,descricao,saldo
334537,2023,5,3111,Contraprestações,100000.0
";
        let result = read_ledger(csv.as_bytes());
        assert!(result.is_err());
    }

    #[test]
    fn test_read_roster() {
        let csv = "\
reg_ans,ano,trimestre,qt_beneficiarios,modalidade,ativa,nome_fantasia,porte,uniodonto
334537,2023,1,15000,COOPERATIVA ODONTOLÓGICA,SIM,Uniodonto Capital,Pequeno,SIM
400001,2023,1,8000,ODONTOLOGIA DE GRUPO,,Sorriso Planos,,
";
        let records = read_roster(csv.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].modality, Modality::CooperativaOdontologica);
        assert_eq!(records[0].active, Some(true));
        assert!(records[0].uniodonto);
        assert_eq!(records[0].porte.as_deref(), Some("Pequeno"));

        assert_eq!(records[1].modality, Modality::OdontologiaDeGrupo);
        assert_eq!(records[1].active, None);
        assert!(!records[1].uniodonto);
        assert_eq!(records[1].porte, None);
        assert_eq!(records[1].beneficiaries, 8_000);
    }

    #[test]
    fn test_parse_flag_variants() {
        assert_eq!(parse_flag(&Some("SIM".to_string())), Some(true));
        assert_eq!(parse_flag(&Some("sim".to_string())), Some(true));
        assert_eq!(parse_flag(&Some("NÃO".to_string())), Some(false));
        assert_eq!(parse_flag(&Some("NAO".to_string())), Some(false));
        assert_eq!(parse_flag(&Some("".to_string())), None);
        assert_eq!(parse_flag(&Some("TALVEZ".to_string())), None);
        assert_eq!(parse_flag(&None), None);
    }

    #[test]
    fn test_read_stored_indicators_with_empty_cells() {
        let csv = "\
reg_ans,ano,trimestre,sinistralidade,pct_despesas_administrativas,pct_despesas_comerciais,pct_despesas_operacionais,indice_resultado_financeiro,liquidez_corrente,endividamento,prazo_medio_contraprestacoes,prazo_medio_eventos,variacao_custo,margem_liquida,retorno_patrimonio_liquido
334537,2023,1,0.619,,,,,1.25,,,,,,
";
        let sets = read_stored_indicators(csv.as_bytes()).unwrap();

        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].sinistralidade.value(), Some(0.619));
        assert_eq!(sets[0].liquidez_corrente.value(), Some(1.25));
        assert!(!sets[0].pct_despesas_administrativas.is_defined());
        assert!(!sets[0].retorno_patrimonio_liquido.is_defined());
    }

    #[test]
    fn test_read_net_results() {
        let csv = "\
reg_ans,ano,trimestre,resultado_liquido
334537,2023,1,12345.67
400001,2023,1,-500.0
";
        let results = read_net_results(csv.as_bytes()).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(
            results[&("334537".to_string(), Period::new(2023, 1))],
            12_345.67
        );
        assert_eq!(
            results[&("400001".to_string(), Period::new(2023, 1))],
            -500.0
        );
    }
}
