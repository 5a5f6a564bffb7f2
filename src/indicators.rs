// 📈 Indicator Calculator - RN 518 ratio formulas over component summaries
// All division is safe division: zero denominator yields Undefined, never
// an exception, never infinity

use crate::aggregator::SummaryMap;
use crate::config::EngineConfig;
use crate::model::{Period, PeriodComponentSummary};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

// ============================================================================
// SAFE VALUE
// ============================================================================

/// A monetary ratio that is either defined or explicitly undefined
///
/// Any arithmetic touching Undefined yields Undefined, so an undefined
/// denominator propagates through downstream formulas instead of surfacing
/// as NaN or a panic. Serializes as an optional number (empty CSV cell).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SafeValue {
    Defined(f64),
    Undefined,
}

impl SafeValue {
    pub fn value(&self) -> Option<f64> {
        match self {
            SafeValue::Defined(v) => Some(*v),
            SafeValue::Undefined => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, SafeValue::Defined(_))
    }

    /// Safe division: Undefined when the denominator is zero or either
    /// operand is already Undefined
    pub fn safe_div(self, denominator: SafeValue) -> SafeValue {
        match (self, denominator) {
            (SafeValue::Defined(n), SafeValue::Defined(d)) if d != 0.0 => {
                SafeValue::Defined(n / d)
            }
            _ => SafeValue::Undefined,
        }
    }
}

impl From<f64> for SafeValue {
    fn from(value: f64) -> Self {
        SafeValue::Defined(value)
    }
}

impl From<Option<f64>> for SafeValue {
    fn from(value: Option<f64>) -> Self {
        match value {
            Some(v) => SafeValue::Defined(v),
            None => SafeValue::Undefined,
        }
    }
}

impl std::ops::Add for SafeValue {
    type Output = SafeValue;

    fn add(self, rhs: SafeValue) -> SafeValue {
        match (self, rhs) {
            (SafeValue::Defined(a), SafeValue::Defined(b)) => SafeValue::Defined(a + b),
            _ => SafeValue::Undefined,
        }
    }
}

impl std::ops::Sub for SafeValue {
    type Output = SafeValue;

    fn sub(self, rhs: SafeValue) -> SafeValue {
        match (self, rhs) {
            (SafeValue::Defined(a), SafeValue::Defined(b)) => SafeValue::Defined(a - b),
            _ => SafeValue::Undefined,
        }
    }
}

impl std::ops::Mul<f64> for SafeValue {
    type Output = SafeValue;

    fn mul(self, rhs: f64) -> SafeValue {
        match self {
            SafeValue::Defined(a) => SafeValue::Defined(a * rhs),
            SafeValue::Undefined => SafeValue::Undefined,
        }
    }
}

impl Serialize for SafeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SafeValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(SafeValue::from(Option::<f64>::deserialize(deserializer)?))
    }
}

// ============================================================================
// HISTORY INDEX
// ============================================================================

/// Immutable cross-period lookup, built once per batch run
///
/// The trailing metrics (variação de custo, ROE) read prior periods through
/// this index; an absent prior period is a normal Undefined outcome, not an
/// error.
pub struct HistoryIndex {
    summaries: SummaryMap,
}

impl HistoryIndex {
    pub fn from_summaries(summaries: &SummaryMap) -> Self {
        HistoryIndex {
            summaries: summaries.clone(),
        }
    }

    pub fn get(&self, reg_ans: &str, period: Period) -> Option<&PeriodComponentSummary> {
        self.summaries.get(&(reg_ans.to_string(), period))
    }
}

// ============================================================================
// INDICATOR SET
// ============================================================================

/// Names of the computed indicators, in report column order
pub const INDICATOR_NAMES: [&str; 12] = [
    "sinistralidade",
    "pct_despesas_administrativas",
    "pct_despesas_comerciais",
    "pct_despesas_operacionais",
    "indice_resultado_financeiro",
    "liquidez_corrente",
    "endividamento",
    "prazo_medio_contraprestacoes",
    "prazo_medio_eventos",
    "variacao_custo",
    "margem_liquida",
    "retorno_patrimonio_liquido",
];

/// The computed ratios for one (operadora, period)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub reg_ans: String,
    pub period: Period,

    pub sinistralidade: SafeValue,
    pub pct_despesas_administrativas: SafeValue,
    pub pct_despesas_comerciais: SafeValue,
    pub pct_despesas_operacionais: SafeValue,
    pub indice_resultado_financeiro: SafeValue,
    pub liquidez_corrente: SafeValue,
    pub endividamento: SafeValue,
    pub prazo_medio_contraprestacoes: SafeValue,
    pub prazo_medio_eventos: SafeValue,
    pub variacao_custo: SafeValue,
    pub margem_liquida: SafeValue,
    pub retorno_patrimonio_liquido: SafeValue,
}

impl IndicatorSet {
    /// (name, value) pairs in INDICATOR_NAMES order
    pub fn named_values(&self) -> Vec<(&'static str, SafeValue)> {
        vec![
            ("sinistralidade", self.sinistralidade),
            ("pct_despesas_administrativas", self.pct_despesas_administrativas),
            ("pct_despesas_comerciais", self.pct_despesas_comerciais),
            ("pct_despesas_operacionais", self.pct_despesas_operacionais),
            ("indice_resultado_financeiro", self.indice_resultado_financeiro),
            ("liquidez_corrente", self.liquidez_corrente),
            ("endividamento", self.endividamento),
            ("prazo_medio_contraprestacoes", self.prazo_medio_contraprestacoes),
            ("prazo_medio_eventos", self.prazo_medio_eventos),
            ("variacao_custo", self.variacao_custo),
            ("margem_liquida", self.margem_liquida),
            ("retorno_patrimonio_liquido", self.retorno_patrimonio_liquido),
        ]
    }

    pub fn get(&self, name: &str) -> Option<SafeValue> {
        self.named_values()
            .into_iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v)
    }
}

// ============================================================================
// INDICATOR CALCULATOR
// ============================================================================

pub struct IndicatorCalculator {
    /// Day-count convention for the receivable/payable day metrics
    day_count: f64,
}

impl IndicatorCalculator {
    pub fn new() -> Self {
        IndicatorCalculator { day_count: 360.0 }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        IndicatorCalculator {
            day_count: config.day_count,
        }
    }

    /// Compute the full indicator set for one summary
    ///
    /// With C = contraprestações and K = cct_abs, the premium base is C + K.
    /// Trailing metrics read the history index; everything else is local to
    /// the summary.
    pub fn compute(&self, summary: &PeriodComponentSummary, history: &HistoryIndex) -> IndicatorSet {
        let ck = SafeValue::from(summary.ck_base());
        let contraprestacoes = SafeValue::from(summary.contraprestacoes);
        let net_result = SafeValue::from(summary.net_result);

        let sinistralidade = SafeValue::from(summary.claims_base()).safe_div(ck);
        let pct_despesas_administrativas =
            SafeValue::from(summary.despesas_administrativas).safe_div(ck);
        let pct_despesas_comerciais = SafeValue::from(summary.despesas_comerciais).safe_div(ck);
        let pct_despesas_operacionais = SafeValue::from(summary.operating_expenses()).safe_div(ck);
        let indice_resultado_financeiro =
            SafeValue::from(summary.receitas_fin - summary.despesas_fin).safe_div(ck);

        let liquidez_corrente = SafeValue::from(summary.ativo_circulante)
            .safe_div(SafeValue::from(summary.passivo_circulante));
        let endividamento =
            SafeValue::from(summary.passivo_circulante + summary.passivo_nao_circulante)
                .safe_div(SafeValue::from(summary.patrimonio_liquido));

        // Negative receivables/payables count as zero days, not negative days
        let prazo_medio_contraprestacoes =
            SafeValue::from(summary.contraprestacao_a_receber.max(0.0))
                .safe_div(contraprestacoes)
                * self.day_count;
        let prazo_medio_eventos = SafeValue::from(summary.eventos_a_liquidar.max(0.0))
            .safe_div(SafeValue::from(summary.eventos_liquidos))
            * self.day_count;

        let variacao_custo = self.cost_variation(summary, history);

        let margem_liquida = net_result.safe_div(contraprestacoes);
        let retorno_patrimonio_liquido = self.return_on_equity(summary, history, net_result);

        IndicatorSet {
            reg_ans: summary.reg_ans.clone(),
            period: summary.period,
            sinistralidade,
            pct_despesas_administrativas,
            pct_despesas_comerciais,
            pct_despesas_operacionais,
            indice_resultado_financeiro,
            liquidez_corrente,
            endividamento,
            prazo_medio_contraprestacoes,
            prazo_medio_eventos,
            variacao_custo,
            margem_liquida,
            retorno_patrimonio_liquido,
        }
    }

    /// Compute indicators for every summary, in deterministic key order
    pub fn compute_all(&self, summaries: &SummaryMap, history: &HistoryIndex) -> Vec<IndicatorSet> {
        let sets: Vec<IndicatorSet> = summaries
            .values()
            .map(|summary| self.compute(summary, history))
            .collect();

        info!(count = sets.len(), "computed indicator sets");

        sets
    }

    /// Per-beneficiary claims cost against the same quarter one year back
    ///
    /// Undefined when either period lacks enrollment, the prior summary is
    /// absent, or the prior per-beneficiary cost is zero.
    fn cost_variation(
        &self,
        summary: &PeriodComponentSummary,
        history: &HistoryIndex,
    ) -> SafeValue {
        let current = summary.eventos_per_beneficiary();
        let prior = history
            .get(&summary.reg_ans, summary.period.prior(4))
            .and_then(|h| h.eventos_per_beneficiary());

        match (current, prior) {
            (Some(current), Some(prior)) if prior != 0.0 => {
                SafeValue::Defined(current / prior - 1.0)
            }
            _ => SafeValue::Undefined,
        }
    }

    /// Net result over average equity of this and the prior quarter
    ///
    /// An absent prior period yields Undefined; the current quarter's equity
    /// is never used as a stand-in for the missing one.
    fn return_on_equity(
        &self,
        summary: &PeriodComponentSummary,
        history: &HistoryIndex,
        net_result: SafeValue,
    ) -> SafeValue {
        match history.get(&summary.reg_ans, summary.period.prior(1)) {
            Some(prior) => {
                let average_equity = (summary.patrimonio_liquido + prior.patrimonio_liquido) / 2.0;
                net_result.safe_div(SafeValue::from(average_equity))
            }
            None => SafeValue::Undefined,
        }
    }
}

impl Default for IndicatorCalculator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// DISPLAY KINDS & RATING BANDS
// ============================================================================

/// Display kind of an indicator value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Pct,
    Ratio,
    Days,
}

/// Display kind by indicator name; unknown names render as plain ratios
pub fn indicator_kind(name: &str) -> IndicatorKind {
    match name {
        "sinistralidade"
        | "pct_despesas_administrativas"
        | "pct_despesas_comerciais"
        | "pct_despesas_operacionais"
        | "indice_resultado_financeiro"
        | "variacao_custo"
        | "margem_liquida"
        | "retorno_patrimonio_liquido" => IndicatorKind::Pct,
        "prazo_medio_contraprestacoes" | "prazo_medio_eventos" => IndicatorKind::Days,
        _ => IndicatorKind::Ratio,
    }
}

/// Format a value for display ("12.34%", "1.23", "45.6 dias", "—")
pub fn format_value(value: SafeValue, kind: IndicatorKind) -> String {
    match value.value() {
        None => "—".to_string(),
        Some(v) => match kind {
            IndicatorKind::Pct => format!("{:.2}%", v * 100.0),
            IndicatorKind::Ratio => format!("{:.2}", v),
            IndicatorKind::Days => format!("{:.1} dias", v),
        },
    }
}

/// Qualitative rating band for an indicator value
///
/// Thresholds follow the published dashboard's rating table. Indicators
/// without a band rate as empty; an undefined value rates "Sem dado".
pub fn rating(name: &str, value: SafeValue) -> &'static str {
    let v = match value.value() {
        Some(v) => v,
        None => return "Sem dado",
    };

    match name {
        "sinistralidade" => {
            if v <= 0.75 {
                "Excelente"
            } else if v <= 0.85 {
                "Adequado"
            } else {
                "Crítico"
            }
        }
        "pct_despesas_administrativas" => {
            if v <= 0.10 {
                "Enxuto"
            } else if v <= 0.15 {
                "Controle"
            } else {
                "Pressão"
            }
        }
        "pct_despesas_comerciais" => {
            if v <= 0.07 {
                "Competitivo"
            } else if v <= 0.12 {
                "Atenção"
            } else {
                "Elevado"
            }
        }
        "pct_despesas_operacionais" => {
            if v <= 0.90 {
                "Controlado"
            } else if v <= 1.00 {
                "Limite"
            } else {
                "Desfavorável"
            }
        }
        "indice_resultado_financeiro" => {
            if v >= 0.02 {
                "Positivo"
            } else if v >= 0.0 {
                "Neutro"
            } else {
                "Negativo"
            }
        }
        "liquidez_corrente" => {
            if v >= 1.2 {
                "Sólida"
            } else if v >= 1.0 {
                "Confortável"
            } else if v >= 0.8 {
                "Alerta"
            } else {
                "Risco"
            }
        }
        "endividamento" => {
            if v <= 1.0 {
                "Baixo"
            } else if v <= 2.0 {
                "Moderado"
            } else {
                "Elevado"
            }
        }
        "margem_liquida" => {
            if v >= 0.05 {
                "Saudável"
            } else if v >= 0.0 {
                "Equilíbrio"
            } else {
                "Prejuízo"
            }
        }
        "retorno_patrimonio_liquido" => {
            if v >= 0.08 {
                "Excelente"
            } else if v >= 0.04 {
                "Adequado"
            } else if v >= 0.0 {
                "Atenção"
            } else {
                "Negativo"
            }
        }
        _ => "",
    }
}

// ============================================================================
// TESTS
// ============================================================================
