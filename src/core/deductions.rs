use super::error::EngineError;
use super::gross::GrossSalaryBreakdown;
use super::input::SalaryInput;
use super::money::Amount;
use crate::rules::{ContributionCap, RegimeRules, TaxRuleSet};
use serde::Serialize;
use std::collections::BTreeMap;

/// Amounts deducted from gross to reach taxable income under one regime
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DeductionResult {
    /// Applied amount per section, never above the declared amount or the cap.
    /// Sections the regime disallows appear with zero.
    pub sections: BTreeMap<String, Amount>,
    pub standard_deduction: Amount,
    /// Employee contributions with no pooling section configured
    pub employee_contributions: Amount,
    pub employer_contributions: Amount,
    pub total: Amount,
}

pub fn compute_deductions(
    input: &SalaryInput,
    rules: &TaxRuleSet,
    regime: &RegimeRules,
    gross: &GrossSalaryBreakdown,
    exemptions: Amount,
) -> Result<DeductionResult, EngineError> {
    let unknown: Vec<String> = input
        .investments
        .keys()
        .filter(|section| rules.deduction_limit(section).is_none())
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(EngineError::UnknownDeductionSection(unknown));
    }

    let eligibility = &regime.eligibility;
    let mut declared = input.investments.clone();
    let mut employee_contributions = Amount::ZERO;

    if eligibility.employee_contributions {
        let pooled = [
            (input.employee_retirement(), &rules.contribution_sections.retirement),
            (input.employee_pension, &rules.contribution_sections.pension),
        ];
        for (amount, section) in pooled {
            if amount.is_zero() {
                continue;
            }
            match section {
                Some(section) => *declared.entry(section.clone()).or_default() += amount,
                None => employee_contributions += amount,
            }
        }
    }

    let mut sections = BTreeMap::new();
    for (section, amount) in declared {
        let applied = match rules.deduction_limit(&section) {
            Some(cap) if eligibility.sections.contains(&section) => amount.min(cap),
            _ => Amount::ZERO,
        };
        log::debug!("Section {section}: declared {amount}, applied {applied}");
        sections.insert(section, applied);
    }

    let employer_contributions = capped(
        input.employer_retirement() + input.employer_pension,
        regime.employer_contribution_cap.as_ref(),
        input.basic,
    );

    let other = sections.values().sum::<Amount>() + employee_contributions + employer_contributions;

    // Only salary left after everything else can absorb the standard deduction,
    // so it never reaches other income and never grows faster than basic.
    let salary = gross.total - gross.other_income;
    let standard_deduction = regime
        .standard_deduction
        .min(salary.saturating_sub(exemptions + other));

    Ok(DeductionResult {
        sections,
        standard_deduction,
        employee_contributions,
        employer_contributions,
        total: other + standard_deduction,
    })
}

fn capped(amount: Amount, cap: Option<&ContributionCap>, basic: Amount) -> Amount {
    let Some(cap) = cap else {
        return amount;
    };
    let by_amount = cap.amount.map_or(amount, |limit| amount.min(limit));
    let by_basic = cap
        .percent_of_basic
        .map_or(amount, |pct| amount.min(basic.percent(pct)));
    by_amount.min(by_basic)
}
