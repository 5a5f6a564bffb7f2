// 🏷️ Classification Rules - Rules as Data
// Maps normalized chart-of-accounts codes to financial components

use crate::model::Component;
use anyhow::{bail, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// CODE NORMALIZATION
// ============================================================================

/// Canonicalize a raw account code into a fixed-form digit code
///
/// Strips every non-digit character and left-pads with '0' to a minimum of
/// 4 characters; longer digit strings are never truncated. Total function:
/// empty or all-non-digit input yields "0000".
pub fn normalize_code(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 4 {
        digits
    } else {
        format!("{:0>4}", digits)
    }
}

// ============================================================================
// RULE DEFINITION
// ============================================================================

/// How a rule pattern is compared against a normalized code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherKind {
    /// Code must equal the pattern exactly
    Exact,
    /// Code must start with the pattern
    Prefix,
}

/// One (pattern, component) classification rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub matcher: MatcherKind,

    /// Digit pattern the normalized code is compared against
    pub pattern: String,

    /// Component assigned when the rule fires
    pub component: Component,
}

impl ClassificationRule {
    pub fn exact(pattern: &str, component: Component) -> Self {
        ClassificationRule {
            matcher: MatcherKind::Exact,
            pattern: pattern.to_string(),
            component,
        }
    }

    pub fn prefix(pattern: &str, component: Component) -> Self {
        ClassificationRule {
            matcher: MatcherKind::Prefix,
            pattern: pattern.to_string(),
            component,
        }
    }

    /// Check if this rule matches the given normalized code
    pub fn matches(&self, code: &str) -> bool {
        match self.matcher {
            MatcherKind::Exact => code == self.pattern,
            MatcherKind::Prefix => code.starts_with(&self.pattern),
        }
    }

    /// Patterns must be non-empty digit strings; anything else is a
    /// configuration error caught at load time
    fn validate(&self) -> Result<()> {
        if self.pattern.is_empty() {
            bail!("classification rule for {} has an empty pattern", self.component);
        }
        if !self.pattern.chars().all(|c| c.is_ascii_digit()) {
            bail!(
                "classification rule pattern '{}' for {} contains non-digit characters",
                self.pattern,
                self.component
            );
        }
        Ok(())
    }
}

// ============================================================================
// MATCH STRATEGY
// ============================================================================

/// Evaluation order for the rule table
///
/// The published table is declared shortest-prefix-first, which leaves the
/// "1231"/"2111" rules unreachable behind "12"/"21". `DeclaredOrder` keeps
/// that literal behavior; `LongestPrefix` exists for parity experiments
/// against outputs produced with specificity-first matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// First match wins, in declared rule order (default)
    DeclaredOrder,
    /// Exact rules first (declared order), then the longest matching prefix
    LongestPrefix,
}

impl Default for MatchStrategy {
    fn default() -> Self {
        MatchStrategy::DeclaredOrder
    }
}

// ============================================================================
// RULE ENGINE
// ============================================================================

pub struct RuleEngine {
    rules: Vec<ClassificationRule>,
    strategy: MatchStrategy,
}

impl RuleEngine {
    /// Engine loaded with the RN 518 odontological rule table
    pub fn with_default_rules(strategy: MatchStrategy) -> Self {
        RuleEngine {
            rules: default_rules(),
            strategy,
        }
    }

    /// Create engine from a list of rules, failing fast on a malformed table
    ///
    /// Rule order is semantically significant and preserved exactly as given.
    pub fn from_rules(rules: Vec<ClassificationRule>, strategy: MatchStrategy) -> Result<Self> {
        if rules.is_empty() {
            bail!("classification rule table is empty");
        }
        for rule in &rules {
            rule.validate()?;
        }
        Ok(RuleEngine { rules, strategy })
    }

    /// Load an overriding rule table from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P, strategy: MatchStrategy) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        let rules: Vec<ClassificationRule> =
            serde_json::from_str(&content).context("Failed to parse rules JSON")?;

        RuleEngine::from_rules(rules, strategy)
    }

    /// Classify a normalized code into a component
    ///
    /// Falls through to OUTROS when no rule fires.
    pub fn classify(&self, code: &str) -> Component {
        match self.strategy {
            MatchStrategy::DeclaredOrder => self
                .rules
                .iter()
                .find(|rule| rule.matches(code))
                .map(|rule| rule.component)
                .unwrap_or(Component::Outros),
            MatchStrategy::LongestPrefix => {
                // Exact rules keep declared-order precedence
                if let Some(rule) = self
                    .rules
                    .iter()
                    .find(|r| r.matcher == MatcherKind::Exact && r.matches(code))
                {
                    return rule.component;
                }
                self.rules
                    .iter()
                    .filter(|r| r.matcher == MatcherKind::Prefix && r.matches(code))
                    .max_by_key(|r| r.pattern.len())
                    .map(|rule| rule.component)
                    .unwrap_or(Component::Outros)
            }
        }
    }

    /// Normalize + classify in one call
    pub fn classify_raw(&self, raw_code: &str) -> Component {
        self.classify(&normalize_code(raw_code))
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::with_default_rules(MatchStrategy::DeclaredOrder)
    }
}

/// The RN 518 rule table, in regulator-declared order
///
/// NOTE: the "12"/"21" prefixes precede the longer "1231"/"2111" ones, so
/// under DeclaredOrder the latter never fire. This mirrors the published
/// table; do not reorder here - parity with specificity-first matching goes
/// through MatchStrategy::LongestPrefix instead.
pub fn default_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::exact("3111", Component::Contraprestacoes),
        ClassificationRule::exact("3117", Component::CctRecuperacao),
        ClassificationRule::prefix("41", Component::EventosLiquidos),
        ClassificationRule::prefix("43", Component::DespesasComerciais),
        ClassificationRule::prefix("46", Component::DespesasAdministrativas),
        ClassificationRule::prefix("44", Component::OutrasDespesasOper),
        ClassificationRule::prefix("35", Component::ReceitasFin),
        ClassificationRule::prefix("45", Component::DespesasFin),
        ClassificationRule::prefix("12", Component::AtivoCirculante),
        ClassificationRule::prefix("21", Component::PassivoCirculante),
        ClassificationRule::prefix("23", Component::PassivoNaoCirculante),
        ClassificationRule::prefix("25", Component::PatrimonioLiquido),
        ClassificationRule::prefix("1231", Component::ContraprestacaoAReceber),
        ClassificationRule::prefix("2111", Component::EventosALiquidar),
    ]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_untouched() {
        assert_eq!(normalize_code("3111"), "3111");
    }

    #[test]
    fn test_normalize_strips_separators() {
        assert_eq!(normalize_code("31.17"), "3117");
        assert_eq!(normalize_code("4.1.0.1"), "4101");
    }

    #[test]
    fn test_normalize_pads_short_codes() {
        assert_eq!(normalize_code(""), "0000");
        assert_eq!(normalize_code("ABC"), "0000");
        assert_eq!(normalize_code("41"), "0041");
    }

    #[test]
    fn test_normalize_never_truncates() {
        assert_eq!(normalize_code("412010"), "412010");
        assert_eq!(normalize_code("41.20.10"), "412010");
    }

    #[test]
    fn test_classify_exact_rules() {
        let engine = RuleEngine::default();

        assert_eq!(engine.classify("3111"), Component::Contraprestacoes);
        assert_eq!(engine.classify("3117"), Component::CctRecuperacao);
    }

    #[test]
    fn test_classify_prefix_rules() {
        let engine = RuleEngine::default();

        assert_eq!(engine.classify("4101"), Component::EventosLiquidos);
        assert_eq!(engine.classify("412010"), Component::EventosLiquidos);
        assert_eq!(engine.classify("4301"), Component::DespesasComerciais);
        assert_eq!(engine.classify("4601"), Component::DespesasAdministrativas);
        assert_eq!(engine.classify("4401"), Component::OutrasDespesasOper);
        assert_eq!(engine.classify("3501"), Component::ReceitasFin);
        assert_eq!(engine.classify("4501"), Component::DespesasFin);
        assert_eq!(engine.classify("2301"), Component::PassivoNaoCirculante);
        assert_eq!(engine.classify("2501"), Component::PatrimonioLiquido);
    }

    #[test]
    fn test_classify_fallback() {
        let engine = RuleEngine::default();

        assert_eq!(engine.classify("9999"), Component::Outros);
        assert_eq!(engine.classify("0000"), Component::Outros);
    }

    #[test]
    fn test_classify_raw_normalizes_first() {
        let engine = RuleEngine::default();

        assert_eq!(engine.classify_raw("31.11"), Component::Contraprestacoes);
        assert_eq!(engine.classify_raw("garbage"), Component::Outros);
    }

    #[test]
    fn test_declared_order_shadows_specific_prefixes() {
        let engine = RuleEngine::with_default_rules(MatchStrategy::DeclaredOrder);

        // "12"/"21" fire before the longer "1231"/"2111" rules
        assert_eq!(engine.classify("123101"), Component::AtivoCirculante);
        assert_eq!(engine.classify("211101"), Component::PassivoCirculante);
    }

    #[test]
    fn test_longest_prefix_reaches_specific_rules() {
        let engine = RuleEngine::with_default_rules(MatchStrategy::LongestPrefix);

        assert_eq!(engine.classify("123101"), Component::ContraprestacaoAReceber);
        assert_eq!(engine.classify("211101"), Component::EventosALiquidar);
        // Codes without a longer match still land on the short prefixes
        assert_eq!(engine.classify("1201"), Component::AtivoCirculante);
        assert_eq!(engine.classify("2102"), Component::PassivoCirculante);
    }

    #[test]
    fn test_longest_prefix_keeps_exact_precedence() {
        let engine = RuleEngine::with_default_rules(MatchStrategy::LongestPrefix);

        assert_eq!(engine.classify("3111"), Component::Contraprestacoes);
        assert_eq!(engine.classify("3117"), Component::CctRecuperacao);
    }

    #[test]
    fn test_from_rules_rejects_empty_table() {
        let result = RuleEngine::from_rules(vec![], MatchStrategy::DeclaredOrder);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_rules_rejects_empty_pattern() {
        let rules = vec![ClassificationRule::prefix("", Component::Outros)];
        let result = RuleEngine::from_rules(rules, MatchStrategy::DeclaredOrder);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_rules_rejects_non_digit_pattern() {
        let rules = vec![ClassificationRule::prefix("41a", Component::EventosLiquidos)];
        let result = RuleEngine::from_rules(rules, MatchStrategy::DeclaredOrder);
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_rule_order_is_preserved() {
        // A table where a broad prefix precedes a narrow one: first match wins
        let rules = vec![
            ClassificationRule::prefix("41", Component::EventosLiquidos),
            ClassificationRule::prefix("411", Component::Outros),
        ];
        let engine = RuleEngine::from_rules(rules, MatchStrategy::DeclaredOrder).unwrap();

        assert_eq!(engine.classify("4110"), Component::EventosLiquidos);
    }

    #[test]
    fn test_rules_json_round_trip() {
        let rules = default_rules();
        let json = serde_json::to_string(&rules).unwrap();
        let parsed: Vec<ClassificationRule> = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, rules);
        assert_eq!(parsed.len(), 14);
    }
}
