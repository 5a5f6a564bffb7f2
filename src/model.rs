// 📒 Core Data Model - Ledger entries, periods, components
// One LedgerEntry per (operadora, period, account) after upstream consolidation

use serde::{Deserialize, Serialize};

// ============================================================================
// PERIOD
// ============================================================================

/// Reporting period: a (year, quarter) pair
///
/// Ordered so it can key a BTreeMap; quarter is 1-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub quarter: u8,
}

impl Period {
    pub fn new(year: i32, quarter: u8) -> Self {
        Period { year, quarter }
    }

    /// The period `n` quarters before this one, rolling across year boundaries
    ///
    /// Example: 2023T1.prior(4) = 2022T1, 2023T1.prior(1) = 2022T4
    pub fn prior(&self, n: u32) -> Period {
        let total = self.year as i64 * 4 + (self.quarter as i64 - 1) - n as i64;
        Period {
            year: total.div_euclid(4) as i32,
            quarter: (total.rem_euclid(4) + 1) as u8,
        }
    }

    /// Display label, e.g. "2023T1"
    pub fn label(&self) -> String {
        format!("{}T{}", self.year, self.quarter)
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}T{}", self.year, self.quarter)
    }
}

// ============================================================================
// LEDGER ENTRY
// ============================================================================

/// One accounting line for one operadora/period
///
/// Core fields are immutable once ingested. `raw_code` is free-form and may
/// contain separators ("31.17"); normalization happens at classification time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// ANS registry number of the operadora
    pub reg_ans: String,

    pub period: Period,

    /// Chart-of-accounts code as filed (may contain non-digit characters)
    pub raw_code: String,

    pub description: String,

    /// Signed balance in BRL
    pub balance: f64,
}

// ============================================================================
// COMPONENT
// ============================================================================

/// Canonical financial components the classifier maps account codes into
///
/// Closed set; assigned deterministically per normalized code, never mutated
/// after assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Component {
    Contraprestacoes,
    CctRecuperacao,
    EventosLiquidos,
    DespesasComerciais,
    DespesasAdministrativas,
    OutrasDespesasOper,
    ReceitasFin,
    DespesasFin,
    AtivoCirculante,
    PassivoCirculante,
    PassivoNaoCirculante,
    PatrimonioLiquido,
    ContraprestacaoAReceber,
    EventosALiquidar,
    Outros,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Contraprestacoes => "CONTRAPRESTACOES",
            Component::CctRecuperacao => "CCT_RECUPERACAO",
            Component::EventosLiquidos => "EVENTOS_LIQUIDOS",
            Component::DespesasComerciais => "DESPESAS_COMERCIAIS",
            Component::DespesasAdministrativas => "DESPESAS_ADMINISTRATIVAS",
            Component::OutrasDespesasOper => "OUTRAS_DESPESAS_OPER",
            Component::ReceitasFin => "RECEITAS_FIN",
            Component::DespesasFin => "DESPESAS_FIN",
            Component::AtivoCirculante => "ATIVO_CIRCULANTE",
            Component::PassivoCirculante => "PASSIVO_CIRCULANTE",
            Component::PassivoNaoCirculante => "PASSIVO_NAO_CIRCULANTE",
            Component::PatrimonioLiquido => "PATRIMONIO_LIQUIDO",
            Component::ContraprestacaoAReceber => "CONTRAPRESTACAO_A_RECEBER",
            Component::EventosALiquidar => "EVENTOS_A_LIQUIDAR",
            Component::Outros => "OUTROS",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MODALITY
// ============================================================================

/// Regulatory modality of an operadora
///
/// Only the two odontological modalities qualify for the indicator batch by
/// default; everything else is `Outra` and filtered out by the roster join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Modality {
    CooperativaOdontologica,
    OdontologiaDeGrupo,
    Outra,
}

impl Modality {
    /// Parse the free-form label used in the roster dataset
    ///
    /// Tolerates case and the accented/unaccented spellings
    /// ("Cooperativa Odontológica", "COOPERATIVA ODONTOLOGICA", ...).
    pub fn parse(label: &str) -> Modality {
        let upper = label.trim().to_uppercase();
        if upper.starts_with("COOPERATIVA ODONTO") {
            Modality::CooperativaOdontologica
        } else if upper.starts_with("ODONTOLOGIA DE GRUPO") {
            Modality::OdontologiaDeGrupo
        } else {
            Modality::Outra
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::CooperativaOdontologica => "COOPERATIVA_ODONTOLOGICA",
            Modality::OdontologiaDeGrupo => "ODONTOLOGIA_DE_GRUPO",
            Modality::Outra => "OUTRA",
        }
    }
}

// ============================================================================
// ROSTER RECORD
// ============================================================================

/// Per (operadora, period) roster data owned by the external roster source
///
/// `active: None` means the flag was absent upstream; the aggregator treats
/// absent as active (permissive default, overridable in config).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterRecord {
    pub reg_ans: String,
    pub period: Period,

    /// Enrollment count at the last month of the quarter
    pub beneficiaries: u64,

    pub modality: Modality,

    pub active: Option<bool>,

    /// Nome fantasia of the operadora
    pub trade_name: String,

    /// Size classification ("Pequeno", "Médio", "Grande")
    pub porte: Option<String>,

    /// Uniodonto network member
    pub uniodonto: bool,
}

// ============================================================================
// PERIOD COMPONENT SUMMARY
// ============================================================================

/// Component totals for one (operadora, period), every bucket defaulting to
/// zero when no entry maps to it
///
/// Recomputed on demand from ledger entries; never persisted as mutable
/// state. Roster enrichment (`beneficiaries`, `modality`, ...) and the
/// external `net_result` aggregate are attached after aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodComponentSummary {
    pub reg_ans: String,
    pub period: Period,

    // ========================================================================
    // COMPONENT TOTALS (signed, except cct_abs which accumulates |balance|)
    // ========================================================================
    pub contraprestacoes: f64,
    pub cct_abs: f64,
    pub eventos_liquidos: f64,
    pub despesas_comerciais: f64,
    pub despesas_administrativas: f64,
    pub outras_despesas_oper: f64,
    pub receitas_fin: f64,
    pub despesas_fin: f64,
    pub ativo_circulante: f64,
    pub passivo_circulante: f64,
    pub passivo_nao_circulante: f64,
    pub patrimonio_liquido: f64,
    pub contraprestacao_a_receber: f64,
    pub eventos_a_liquidar: f64,
    pub outros: f64,

    // ========================================================================
    // ROSTER ENRICHMENT (attached by the roster join)
    // ========================================================================
    pub beneficiaries: Option<u64>,
    pub modality: Option<Modality>,
    pub trade_name: Option<String>,
    pub porte: Option<String>,
    pub uniodonto: bool,

    /// Broader pre/post-tax income figure, supplied as an external aggregate;
    /// used only by margem_liquida and retorno_patrimonio_liquido
    pub net_result: Option<f64>,
}

impl PeriodComponentSummary {
    pub fn new(reg_ans: &str, period: Period) -> Self {
        PeriodComponentSummary {
            reg_ans: reg_ans.to_string(),
            period,
            contraprestacoes: 0.0,
            cct_abs: 0.0,
            eventos_liquidos: 0.0,
            despesas_comerciais: 0.0,
            despesas_administrativas: 0.0,
            outras_despesas_oper: 0.0,
            receitas_fin: 0.0,
            despesas_fin: 0.0,
            ativo_circulante: 0.0,
            passivo_circulante: 0.0,
            passivo_nao_circulante: 0.0,
            patrimonio_liquido: 0.0,
            contraprestacao_a_receber: 0.0,
            eventos_a_liquidar: 0.0,
            outros: 0.0,
            beneficiaries: None,
            modality: None,
            trade_name: None,
            porte: None,
            uniodonto: false,
            net_result: None,
        }
    }

    /// Accumulate one classified balance into the matching bucket
    ///
    /// CCT_RECUPERACAO accumulates the absolute value of each balance; every
    /// other component sums signed values.
    pub fn accumulate(&mut self, component: Component, balance: f64) {
        match component {
            Component::Contraprestacoes => self.contraprestacoes += balance,
            Component::CctRecuperacao => self.cct_abs += balance.abs(),
            Component::EventosLiquidos => self.eventos_liquidos += balance,
            Component::DespesasComerciais => self.despesas_comerciais += balance,
            Component::DespesasAdministrativas => self.despesas_administrativas += balance,
            Component::OutrasDespesasOper => self.outras_despesas_oper += balance,
            Component::ReceitasFin => self.receitas_fin += balance,
            Component::DespesasFin => self.despesas_fin += balance,
            Component::AtivoCirculante => self.ativo_circulante += balance,
            Component::PassivoCirculante => self.passivo_circulante += balance,
            Component::PassivoNaoCirculante => self.passivo_nao_circulante += balance,
            Component::PatrimonioLiquido => self.patrimonio_liquido += balance,
            Component::ContraprestacaoAReceber => self.contraprestacao_a_receber += balance,
            Component::EventosALiquidar => self.eventos_a_liquidar += balance,
            Component::Outros => self.outros += balance,
        }
    }

    // ========================================================================
    // DERIVED BASES
    // ========================================================================

    /// Premium base: contraprestações + CCT recovery (C + K)
    pub fn ck_base(&self) -> f64 {
        self.contraprestacoes + self.cct_abs
    }

    /// Claims base: eventos líquidos + CCT recovery
    pub fn claims_base(&self) -> f64 {
        self.eventos_liquidos + self.cct_abs
    }

    /// Total operating expenses: claims base + commercial + admin + other
    pub fn operating_expenses(&self) -> f64 {
        self.claims_base()
            + self.despesas_comerciais
            + self.despesas_administrativas
            + self.outras_despesas_oper
    }

    /// Eventos líquidos per beneficiary; None when enrollment is missing or
    /// zero (the trailing cost-variation metric is undefined in that case)
    pub fn eventos_per_beneficiary(&self) -> Option<f64> {
        match self.beneficiaries {
            Some(count) if count > 0 => Some(self.eventos_liquidos / count as f64),
            _ => None,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_prior_within_year() {
        let p = Period::new(2023, 3);
        assert_eq!(p.prior(1), Period::new(2023, 2));
        assert_eq!(p.prior(2), Period::new(2023, 1));
    }

    #[test]
    fn test_period_prior_across_years() {
        let p = Period::new(2023, 1);
        assert_eq!(p.prior(1), Period::new(2022, 4));
        assert_eq!(p.prior(4), Period::new(2022, 1));
        assert_eq!(p.prior(5), Period::new(2021, 4));
    }

    #[test]
    fn test_period_label() {
        assert_eq!(Period::new(2023, 1).label(), "2023T1");
        assert_eq!(format!("{}", Period::new(2024, 4)), "2024T4");
    }

    #[test]
    fn test_period_ordering() {
        assert!(Period::new(2022, 4) < Period::new(2023, 1));
        assert!(Period::new(2023, 1) < Period::new(2023, 2));
    }

    #[test]
    fn test_modality_parse() {
        assert_eq!(
            Modality::parse("COOPERATIVA ODONTOLÓGICA"),
            Modality::CooperativaOdontologica
        );
        assert_eq!(
            Modality::parse("Cooperativa Odontologica"),
            Modality::CooperativaOdontologica
        );
        assert_eq!(
            Modality::parse("Odontologia de Grupo"),
            Modality::OdontologiaDeGrupo
        );
        assert_eq!(Modality::parse("Medicina de Grupo"), Modality::Outra);
        assert_eq!(Modality::parse(""), Modality::Outra);
    }

    #[test]
    fn test_summary_accumulate_signed() {
        let mut summary = PeriodComponentSummary::new("E1", Period::new(2023, 1));
        summary.accumulate(Component::Contraprestacoes, 100_000.0);
        summary.accumulate(Component::Contraprestacoes, -20_000.0);

        assert_eq!(summary.contraprestacoes, 80_000.0);
    }

    #[test]
    fn test_summary_accumulate_cct_absolute() {
        let mut summary = PeriodComponentSummary::new("E1", Period::new(2023, 1));
        summary.accumulate(Component::CctRecuperacao, -5_000.0);
        summary.accumulate(Component::CctRecuperacao, 2_000.0);

        // |−5000| + |2000| = 7000, not −3000
        assert_eq!(summary.cct_abs, 7_000.0);
    }

    #[test]
    fn test_summary_derived_bases() {
        let mut summary = PeriodComponentSummary::new("E1", Period::new(2023, 1));
        summary.accumulate(Component::Contraprestacoes, 100_000.0);
        summary.accumulate(Component::CctRecuperacao, -5_000.0);
        summary.accumulate(Component::EventosLiquidos, 60_000.0);
        summary.accumulate(Component::DespesasComerciais, 8_000.0);
        summary.accumulate(Component::DespesasAdministrativas, 12_000.0);
        summary.accumulate(Component::OutrasDespesasOper, 3_000.0);

        assert_eq!(summary.ck_base(), 105_000.0);
        assert_eq!(summary.claims_base(), 65_000.0);
        assert_eq!(summary.operating_expenses(), 88_000.0);
    }

    #[test]
    fn test_eventos_per_beneficiary() {
        let mut summary = PeriodComponentSummary::new("E1", Period::new(2023, 1));
        summary.accumulate(Component::EventosLiquidos, 60_000.0);

        assert_eq!(summary.eventos_per_beneficiary(), None);

        summary.beneficiaries = Some(0);
        assert_eq!(summary.eventos_per_beneficiary(), None);

        summary.beneficiaries = Some(1_000);
        assert_eq!(summary.eventos_per_beneficiary(), Some(60.0));
    }
}
