//! Single entry point for salary calculations.

use crate::core::{
    compare_regimes, EngineError, FiscalYear, SalaryBreakdownResult, SalaryInput, Violation,
};
use crate::rules::{RuleSetCache, RuleSource, TaxRuleSet};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Which fiscal year to use and which regimes to compute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalculationRequest {
    pub fiscal_year: FiscalYear,
    pub regimes: Vec<String>,
}

impl CalculationRequest {
    pub fn new<I, S>(fiscal_year: impl Into<FiscalYear>, regimes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CalculationRequest {
            fiscal_year: fiscal_year.into(),
            regimes: regimes.into_iter().map(Into::into).collect(),
        }
    }

    fn violations(&self) -> Vec<Violation> {
        let mut violations = Vec::new();
        if self.regimes.is_empty() {
            violations.push(Violation::new("regimes", "at least one regime is required"));
        }
        let mut seen = BTreeSet::new();
        for name in &self.regimes {
            if name.trim().is_empty() {
                violations.push(Violation::new("regimes", "regime name must not be empty"));
            } else if !seen.insert(name.as_str()) {
                violations.push(Violation::new("regimes", format!("duplicate regime {name}")));
            }
        }
        violations
    }
}

/// Validates requests, resolves rule sets through a shared cache and runs the
/// per-regime pipeline.
///
/// Safe to share between tasks; the cache is the only shared state.
pub struct SalaryEngine {
    cache: RuleSetCache,
}

impl SalaryEngine {
    pub fn new(source: Arc<dyn RuleSource>) -> Self {
        Self::with_cache(RuleSetCache::new(source))
    }

    pub fn with_cache(cache: RuleSetCache) -> Self {
        SalaryEngine { cache }
    }

    pub fn cache(&self) -> &RuleSetCache {
        &self.cache
    }

    /// The validated rule set for `fiscal_year`
    pub async fn rule_set(&self, fiscal_year: &FiscalYear) -> Result<Arc<TaxRuleSet>, EngineError> {
        Ok(self.cache.resolve(fiscal_year).await?)
    }

    pub async fn calculate(
        &self,
        input: &SalaryInput,
        request: &CalculationRequest,
    ) -> Result<SalaryBreakdownResult, EngineError> {
        let mut violations = input.violations();
        violations.extend(request.violations());
        if !violations.is_empty() {
            log::debug!("Rejected input with {} violation(s)", violations.len());
            return Err(EngineError::Validation(violations));
        }

        let rules = self.rule_set(&request.fiscal_year).await?;
        compare_regimes(input, &rules, &request.fiscal_year, &request.regimes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Amount;
    use crate::rules::tests::flat_rules;
    use crate::rules::MemorySource;

    fn engine() -> SalaryEngine {
        SalaryEngine::new(Arc::new(MemorySource::new().with("T1", flat_rules())))
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_fetching() {
        let engine = engine();
        let input = SalaryInput {
            basic: Amount::major(-1),
            age: 12,
            ..Default::default()
        };
        let request = CalculationRequest::new("T1", ["flat", "flat"]);

        let err = engine.calculate(&input, &request).await.unwrap_err();
        let fields: Vec<_> = err.violations().into_iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["basic", "age", "regimes"]);
        assert_eq!(engine.cache().stats().fetches, 0);
    }

    #[tokio::test]
    async fn empty_regime_list_is_rejected() {
        let input = SalaryInput {
            age: 30,
            ..Default::default()
        };
        let request = CalculationRequest::new("T1", Vec::<String>::new());
        let err = engine().calculate(&input, &request).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn missing_fiscal_year_is_unavailable() {
        let input = SalaryInput {
            age: 30,
            ..Default::default()
        };
        let request = CalculationRequest::new("T9", ["flat"]);
        let err = engine().calculate(&input, &request).await.unwrap_err();
        assert!(matches!(err, EngineError::RuleSetUnavailable(_)));
    }
}
