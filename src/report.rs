// 📄 Report Writers - CSV outputs for the three reports
// Component, indicator and reconciliation reports; rows are emitted in
// deterministic key order so identical inputs produce byte-identical files

use crate::aggregator::SummaryMap;
use crate::indicators::{rating, IndicatorSet, SafeValue};
use crate::model::PeriodComponentSummary;
use crate::reconciliation::ReconciliationReport;
use anyhow::{bail, Context as AnyhowContext, Result};
use serde::Serialize;
use std::io;
use tracing::info;

// ============================================================================
// COMPONENT REPORT
// ============================================================================

/// One row per (operadora, period): all component totals plus the three
/// derived bases the indicator formulas are built on
#[derive(Debug, Serialize)]
struct ComponentReportRow<'a> {
    reg_ans: &'a str,
    periodo: String,
    nome_fantasia: Option<&'a str>,
    modalidade: Option<&'a str>,
    porte: Option<&'a str>,
    uniodonto: bool,
    qt_beneficiarios: Option<u64>,
    contraprestacoes: f64,
    cct_recuperacao_abs: f64,
    eventos_liquidos: f64,
    despesas_comerciais: f64,
    despesas_administrativas: f64,
    outras_despesas_oper: f64,
    receitas_fin: f64,
    despesas_fin: f64,
    ativo_circulante: f64,
    passivo_circulante: f64,
    passivo_nao_circulante: f64,
    patrimonio_liquido: f64,
    contraprestacao_a_receber: f64,
    eventos_a_liquidar: f64,
    outros: f64,
    base_contraprestacoes: f64,
    base_eventos: f64,
    despesas_operacionais_totais: f64,
    resultado_liquido: Option<f64>,
}

impl<'a> ComponentReportRow<'a> {
    fn from_summary(summary: &'a PeriodComponentSummary) -> Self {
        ComponentReportRow {
            reg_ans: &summary.reg_ans,
            periodo: summary.period.label(),
            nome_fantasia: summary.trade_name.as_deref(),
            modalidade: summary.modality.map(|m| m.as_str()),
            porte: summary.porte.as_deref(),
            uniodonto: summary.uniodonto,
            qt_beneficiarios: summary.beneficiaries,
            contraprestacoes: summary.contraprestacoes,
            cct_recuperacao_abs: summary.cct_abs,
            eventos_liquidos: summary.eventos_liquidos,
            despesas_comerciais: summary.despesas_comerciais,
            despesas_administrativas: summary.despesas_administrativas,
            outras_despesas_oper: summary.outras_despesas_oper,
            receitas_fin: summary.receitas_fin,
            despesas_fin: summary.despesas_fin,
            ativo_circulante: summary.ativo_circulante,
            passivo_circulante: summary.passivo_circulante,
            passivo_nao_circulante: summary.passivo_nao_circulante,
            patrimonio_liquido: summary.patrimonio_liquido,
            contraprestacao_a_receber: summary.contraprestacao_a_receber,
            eventos_a_liquidar: summary.eventos_a_liquidar,
            outros: summary.outros,
            base_contraprestacoes: summary.ck_base(),
            base_eventos: summary.claims_base(),
            despesas_operacionais_totais: summary.operating_expenses(),
            resultado_liquido: summary.net_result,
        }
    }
}

pub fn write_component_report<W: io::Write>(writer: W, summaries: &SummaryMap) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    for summary in summaries.values() {
        wtr.serialize(ComponentReportRow::from_summary(summary))
            .context("Failed to write component report row")?;
    }

    wtr.flush().context("Failed to flush component report")?;
    info!(rows = summaries.len(), "component report written");
    Ok(summaries.len())
}

// ============================================================================
// INDICATOR REPORT
// ============================================================================

/// One row per (operadora, period): every computed ratio, its rating band,
/// and the component totals for 1:1 comparison
#[derive(Debug, Serialize)]
struct IndicatorReportRow<'a> {
    reg_ans: &'a str,
    periodo: String,
    nome_fantasia: Option<&'a str>,
    modalidade: Option<&'a str>,
    porte: Option<&'a str>,
    uniodonto: bool,
    qt_beneficiarios: Option<u64>,

    sinistralidade: SafeValue,
    pct_despesas_administrativas: SafeValue,
    pct_despesas_comerciais: SafeValue,
    pct_despesas_operacionais: SafeValue,
    indice_resultado_financeiro: SafeValue,
    liquidez_corrente: SafeValue,
    endividamento: SafeValue,
    prazo_medio_contraprestacoes: SafeValue,
    prazo_medio_eventos: SafeValue,
    variacao_custo: SafeValue,
    margem_liquida: SafeValue,
    retorno_patrimonio_liquido: SafeValue,

    classificacao_sinistralidade: &'static str,
    classificacao_despesas_administrativas: &'static str,
    classificacao_despesas_comerciais: &'static str,
    classificacao_despesas_operacionais: &'static str,
    classificacao_resultado_financeiro: &'static str,
    classificacao_liquidez_corrente: &'static str,
    classificacao_endividamento: &'static str,
    classificacao_margem_liquida: &'static str,
    classificacao_retorno_pl: &'static str,

    contraprestacoes: f64,
    cct_recuperacao_abs: f64,
    eventos_liquidos: f64,
    despesas_comerciais: f64,
    despesas_administrativas: f64,
    outras_despesas_oper: f64,
    receitas_fin: f64,
    despesas_fin: f64,
    ativo_circulante: f64,
    passivo_circulante: f64,
    passivo_nao_circulante: f64,
    patrimonio_liquido: f64,
    contraprestacao_a_receber: f64,
    eventos_a_liquidar: f64,
    resultado_liquido: Option<f64>,
}

impl<'a> IndicatorReportRow<'a> {
    fn build(summary: &'a PeriodComponentSummary, set: &'a IndicatorSet) -> Self {
        IndicatorReportRow {
            reg_ans: &set.reg_ans,
            periodo: set.period.label(),
            nome_fantasia: summary.trade_name.as_deref(),
            modalidade: summary.modality.map(|m| m.as_str()),
            porte: summary.porte.as_deref(),
            uniodonto: summary.uniodonto,
            qt_beneficiarios: summary.beneficiaries,

            sinistralidade: set.sinistralidade,
            pct_despesas_administrativas: set.pct_despesas_administrativas,
            pct_despesas_comerciais: set.pct_despesas_comerciais,
            pct_despesas_operacionais: set.pct_despesas_operacionais,
            indice_resultado_financeiro: set.indice_resultado_financeiro,
            liquidez_corrente: set.liquidez_corrente,
            endividamento: set.endividamento,
            prazo_medio_contraprestacoes: set.prazo_medio_contraprestacoes,
            prazo_medio_eventos: set.prazo_medio_eventos,
            variacao_custo: set.variacao_custo,
            margem_liquida: set.margem_liquida,
            retorno_patrimonio_liquido: set.retorno_patrimonio_liquido,

            classificacao_sinistralidade: rating("sinistralidade", set.sinistralidade),
            classificacao_despesas_administrativas: rating(
                "pct_despesas_administrativas",
                set.pct_despesas_administrativas,
            ),
            classificacao_despesas_comerciais: rating(
                "pct_despesas_comerciais",
                set.pct_despesas_comerciais,
            ),
            classificacao_despesas_operacionais: rating(
                "pct_despesas_operacionais",
                set.pct_despesas_operacionais,
            ),
            classificacao_resultado_financeiro: rating(
                "indice_resultado_financeiro",
                set.indice_resultado_financeiro,
            ),
            classificacao_liquidez_corrente: rating("liquidez_corrente", set.liquidez_corrente),
            classificacao_endividamento: rating("endividamento", set.endividamento),
            classificacao_margem_liquida: rating("margem_liquida", set.margem_liquida),
            classificacao_retorno_pl: rating(
                "retorno_patrimonio_liquido",
                set.retorno_patrimonio_liquido,
            ),

            contraprestacoes: summary.contraprestacoes,
            cct_recuperacao_abs: summary.cct_abs,
            eventos_liquidos: summary.eventos_liquidos,
            despesas_comerciais: summary.despesas_comerciais,
            despesas_administrativas: summary.despesas_administrativas,
            outras_despesas_oper: summary.outras_despesas_oper,
            receitas_fin: summary.receitas_fin,
            despesas_fin: summary.despesas_fin,
            ativo_circulante: summary.ativo_circulante,
            passivo_circulante: summary.passivo_circulante,
            passivo_nao_circulante: summary.passivo_nao_circulante,
            patrimonio_liquido: summary.patrimonio_liquido,
            contraprestacao_a_receber: summary.contraprestacao_a_receber,
            eventos_a_liquidar: summary.eventos_a_liquidar,
            resultado_liquido: summary.net_result,
        }
    }
}

pub fn write_indicator_report<W: io::Write>(
    writer: W,
    summaries: &SummaryMap,
    sets: &[IndicatorSet],
) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    for set in sets {
        let key = (set.reg_ans.clone(), set.period);
        let summary = match summaries.get(&key) {
            Some(summary) => summary,
            None => bail!(
                "indicator set for {}/{} has no matching component summary",
                set.reg_ans,
                set.period
            ),
        };

        wtr.serialize(IndicatorReportRow::build(summary, set))
            .context("Failed to write indicator report row")?;
    }

    wtr.flush().context("Failed to flush indicator report")?;
    info!(rows = sets.len(), "indicator report written");
    Ok(sets.len())
}

// ============================================================================
// RECONCILIATION REPORT
// ============================================================================

#[derive(Debug, Serialize)]
struct ReconciliationReportRow<'a> {
    reg_ans: &'a str,
    periodo: String,
    indicador: &'a str,
    valor_publicado: f64,
    valor_recalculado: f64,
    diferenca: f64,
    divergente: bool,
}

/// Write the reconciliation diff rows; mismatching rows only unless
/// `include_clean` is set
pub fn write_reconciliation_report<W: io::Write>(
    writer: W,
    report: &ReconciliationReport,
    include_clean: bool,
) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for diff in &report.diffs {
        if !diff.mismatch && !include_clean {
            continue;
        }

        wtr.serialize(ReconciliationReportRow {
            reg_ans: &diff.reg_ans,
            periodo: diff.period.label(),
            indicador: &diff.indicator,
            valor_publicado: diff.stored,
            valor_recalculado: diff.recomputed,
            diferenca: diff.diff,
            divergente: diff.mismatch,
        })
        .context("Failed to write reconciliation report row")?;
        rows += 1;
    }

    wtr.flush().context("Failed to flush reconciliation report")?;
    info!(rows, "reconciliation report written");
    Ok(rows)
}

// ============================================================================
// TESTS
// ============================================================================
