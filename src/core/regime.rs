//! Per-regime pipeline and the multi-regime comparison built on it.
//!
//! Gross is computed once; exemptions, deductions and tax are computed per
//! regime from the same rule set. Either every requested regime succeeds or
//! the whole comparison fails.

use super::deductions::{compute_deductions, DeductionResult};
use super::error::{EngineError, Violation};
use super::exemptions::{compute_exemptions, ExemptionResult};
use super::fiscal::FiscalYear;
use super::gross::{aggregate, GrossSalaryBreakdown};
use super::input::SalaryInput;
use super::money::Amount;
use super::slab::{compute_tax, IncomeProfile};
use crate::rules::{RegimeRules, TaxRuleSet};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Amounts withheld from pay, independent of the chosen regime
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct StatutoryDeductions {
    pub employee_retirement: Amount,
    pub employee_pension: Amount,
    pub payroll_tax: Amount,
    /// Declared investment contributions
    pub investments: Amount,
    pub other: Amount,
    pub total: Amount,
}

impl StatutoryDeductions {
    pub fn new(input: &SalaryInput, payroll_tax: Amount) -> Self {
        let employee_retirement = input.employee_retirement();
        let investments = input.declared_investments();
        StatutoryDeductions {
            employee_retirement,
            employee_pension: input.employee_pension,
            payroll_tax,
            investments,
            other: input.other_deductions,
            total: employee_retirement
                + input.employee_pension
                + payroll_tax
                + investments
                + input.other_deductions,
        }
    }
}

/// Monthly shares are rounded independently and need not add up to `yearly`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TakeHome {
    pub monthly: Amount,
    pub yearly: Amount,
}

impl TakeHome {
    pub fn from_yearly(yearly: Amount) -> Self {
        TakeHome {
            monthly: yearly.split(12),
            yearly,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegimeResult {
    pub exemptions: ExemptionResult,
    pub deductions: DeductionResult,
    pub taxable_income: Amount,
    pub base_tax: Amount,
    pub capital_gains_tax: Amount,
    pub rebate: Amount,
    pub surcharge: Amount,
    pub cess: Amount,
    pub total_tax: Amount,
    pub statutory_deductions: StatutoryDeductions,
    pub take_home: TakeHome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalaryBreakdownResult {
    pub fiscal_year: FiscalYear,
    pub gross_salary: GrossSalaryBreakdown,
    pub regimes: BTreeMap<String, RegimeResult>,
}

/// Annual payroll tax for the input's region, zero when no region is given.
///
/// Payroll tax is withheld from take-home only. It is banded by gross, so
/// deducting it from taxable income would let a raise lower the tax due.
pub fn payroll_tax(input: &SalaryInput, rules: &TaxRuleSet, gross: &GrossSalaryBreakdown) -> Amount {
    input
        .state
        .as_deref()
        .and_then(|code| rules.regions.get(code))
        .map_or(Amount::ZERO, |rule| rule.annual_amount(gross.total))
}

/// Checks that need the resolved rule set. Returns every violation found.
///
/// Expects an input that already passed [`SalaryInput::violations`].
pub fn rule_violations(input: &SalaryInput, rules: &TaxRuleSet, regimes: &[String]) -> Vec<Violation> {
    let mut violations = Vec::new();

    for name in regimes {
        let Some(regime) = rules.regime(name) else {
            violations.push(Violation::new(
                "regimes",
                format!(
                    "unknown regime {name}, expected one of: {}",
                    rules.regime_names().collect::<Vec<_>>().join(", ")
                ),
            ));
            continue;
        };
        let share = basic_share(input, rules, regime);
        if share > Decimal::ONE_HUNDRED {
            violations.push(Violation::new(
                "retirement_percent",
                format!("regime {name} would relieve {share}% of basic, more than 100%"),
            ));
        }
    }

    if let Some(state) = &input.state {
        if !rules.regions.contains_key(state) {
            violations.push(Violation::new("state", format!("unknown region code {state}")));
        }
    }

    if rules.capital_gains.is_none() && !input.capital_gains().is_zero() {
        violations.push(Violation::new(
            "capital_gains",
            "rule set has no capital gains rates",
        ));
    }

    violations
}

/// Percentage of each extra unit of basic that exemptions and deductions can
/// absorb under `regime`. Up to 100% a raise never lowers taxable income.
fn basic_share(input: &SalaryInput, rules: &TaxRuleSet, regime: &RegimeRules) -> Decimal {
    let mut share = input.employer_retirement_percent;
    if let Some(cap) = regime
        .employer_contribution_cap
        .as_ref()
        .and_then(|cap| cap.percent_of_basic)
    {
        share = share.min(cap);
    }
    if regime.eligibility.employee_contributions {
        share += input.employee_retirement_percent;
    }
    if regime.eligibility.house_rent_exemption && !input.hra.is_zero() && !input.rent_paid.is_zero() {
        share += if input.lives_in_metro {
            rules.house_rent.metro_percent
        } else {
            rules.house_rent.non_metro_percent
        };
    }
    share
}

/// Run exemptions, deductions and tax for a single regime.
pub fn compute_regime(
    input: &SalaryInput,
    rules: &TaxRuleSet,
    regime_name: &str,
    gross: &GrossSalaryBreakdown,
) -> Result<RegimeResult, EngineError> {
    let regime = rules.regime(regime_name).ok_or_else(|| {
        EngineError::Validation(vec![Violation::new(
            "regimes",
            format!("unknown regime {regime_name}"),
        )])
    })?;

    let exemptions = compute_exemptions(input, rules, regime);
    let deductions = compute_deductions(input, rules, regime, gross, exemptions.total)?;
    let taxable_income = gross.total.saturating_sub(exemptions.total + deductions.total);

    let tax = compute_tax(
        IncomeProfile {
            taxable_income,
            short_term_gains: input.short_term_capital_gains,
            long_term_gains: input.long_term_capital_gains,
            age: input.age,
        },
        rules,
        regime,
    )?;

    let statutory_deductions = StatutoryDeductions::new(input, payroll_tax(input, rules, gross));
    let take_home =
        TakeHome::from_yearly(gross.total - statutory_deductions.total - tax.total_tax);

    log::debug!(
        "Regime {regime_name}: taxable {taxable_income}, tax {}, take-home {}",
        tax.total_tax,
        take_home.yearly
    );

    Ok(RegimeResult {
        exemptions,
        deductions,
        taxable_income,
        base_tax: tax.base_tax,
        capital_gains_tax: tax.capital_gains_tax,
        rebate: tax.rebate,
        surcharge: tax.surcharge,
        cess: tax.cess,
        total_tax: tax.total_tax,
        statutory_deductions,
        take_home,
    })
}

/// Run the pipeline for each named regime against one rule set.
pub fn compare_regimes(
    input: &SalaryInput,
    rules: &TaxRuleSet,
    fiscal_year: &FiscalYear,
    regimes: &[String],
) -> Result<SalaryBreakdownResult, EngineError> {
    let mut violations = input.violations();
    if violations.is_empty() {
        violations = rule_violations(input, rules, regimes);
    }
    if !violations.is_empty() {
        return Err(EngineError::Validation(violations));
    }

    let gross_salary = aggregate(input);
    let results = regimes
        .iter()
        .map(|name| Ok((name.clone(), compute_regime(input, rules, name, &gross_salary)?)))
        .collect::<Result<BTreeMap<_, _>, EngineError>>()?;

    Ok(SalaryBreakdownResult {
        fiscal_year: fiscal_year.clone(),
        gross_salary,
        regimes: results,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::tests::flat_rules;
    use crate::rules::{PayrollTaxBand, PayrollTaxRule};
    use rust_decimal_macros::dec;

    fn flat() -> Vec<String> {
        vec!["flat".to_string()]
    }

    fn scenario() -> SalaryInput {
        SalaryInput {
            basic: Amount::major(500_000),
            investments: [("S1".to_string(), Amount::major(100_000))].into(),
            age: 30,
            ..Default::default()
        }
    }

    #[test]
    fn scenario_take_home() {
        let result = compare_regimes(&scenario(), &flat_rules(), &FiscalYear::from("T1"), &flat()).unwrap();
        let regime = &result.regimes["flat"];

        assert_eq!(result.gross_salary.total, Amount::major(500_000));
        assert_eq!(regime.deductions.total, Amount::major(100_000));
        assert_eq!(regime.taxable_income, Amount::major(400_000));
        assert_eq!(regime.total_tax, Amount::major(5_000));
        assert_eq!(regime.take_home.yearly, Amount::major(395_000));
        assert_eq!(regime.take_home.monthly, Amount::from_minor(3_291_667));
    }

    #[test]
    fn taxable_income_never_negative() {
        let mut input = scenario();
        input.basic = Amount::major(50_000);
        let result = compare_regimes(&input, &flat_rules(), &FiscalYear::from("T1"), &flat()).unwrap();
        let regime = &result.regimes["flat"];
        assert_eq!(regime.taxable_income, Amount::ZERO);
        // take-home is not clamped
        assert_eq!(regime.take_home.yearly, Amount::major(-50_000));
    }

    #[test]
    fn rule_violations_are_collected() {
        let mut input = scenario();
        input.state = Some("ZZ".to_string());
        input.long_term_capital_gains = Amount::major(1_000);
        let regimes = vec!["flat".to_string(), "old".to_string()];

        let err = compare_regimes(&input, &flat_rules(), &FiscalYear::from("T1"), &regimes).unwrap_err();
        let fields: Vec<_> = err.violations().into_iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["regimes", "state", "capital_gains"]);
    }

    #[test]
    fn payroll_tax_withheld_in_every_regime() {
        let mut rules = flat_rules();
        rules
            .regions
            .insert("TN".to_string(), PayrollTaxRule::Flat { annual: Amount::major(2_500) });
        let mut input = scenario();
        input.state = Some("TN".to_string());

        let result = compare_regimes(&input, &rules, &FiscalYear::from("T1"), &flat()).unwrap();
        let regime = &result.regimes["flat"];
        assert_eq!(regime.statutory_deductions.payroll_tax, Amount::major(2_500));
        assert_eq!(regime.taxable_income, Amount::major(400_000));
        assert_eq!(regime.take_home.yearly, Amount::major(392_500));
    }

    #[test]
    fn crossing_a_payroll_band_keeps_taxable_income() {
        let mut rules = flat_rules();
        rules.regions.insert(
            "WB".to_string(),
            PayrollTaxRule::Slabs {
                bands: vec![
                    PayrollTaxBand { up_to: Some(Amount::major(480_000)), annual: Amount::major(2_160) },
                    PayrollTaxBand { up_to: None, annual: Amount::major(2_400) },
                ],
            },
        );
        let mut input = scenario();
        input.state = Some("WB".to_string());
        input.basic = Amount::major(480_000);
        let below = compare_regimes(&input, &rules, &FiscalYear::from("T1"), &flat()).unwrap();
        input.basic = Amount::major(480_001);
        let above = compare_regimes(&input, &rules, &FiscalYear::from("T1"), &flat()).unwrap();

        let (below, above) = (&below.regimes["flat"], &above.regimes["flat"]);
        assert_eq!(above.statutory_deductions.payroll_tax, Amount::major(2_400));
        assert_eq!(above.taxable_income - below.taxable_income, Amount::major(1));
        assert!(above.total_tax >= below.total_tax);
    }

    #[test]
    fn relief_above_basic_is_rejected() {
        let mut rules = flat_rules();
        rules.house_rent.metro_percent = dec!(50);
        let regime = rules.regimes.get_mut("flat").unwrap();
        regime.eligibility.house_rent_exemption = true;
        regime.eligibility.employee_contributions = true;

        let mut input = scenario();
        input.hra = Amount::major(200_000);
        input.rent_paid = Amount::major(240_000);
        input.lives_in_metro = true;
        input.employee_retirement_percent = dec!(25);
        input.employer_retirement_percent = dec!(25);
        assert!(rule_violations(&input, &rules, &flat()).is_empty());

        input.employer_retirement_percent = dec!(30);
        let violations = rule_violations(&input, &rules, &flat());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "retirement_percent");
    }

    #[test]
    fn out_of_range_input_is_rejected_before_any_arithmetic() {
        let mut input = scenario();
        input.basic = Amount::major(50_000_000_000_000_000);
        input.hra = Amount::major(50_000_000_000_000_000);

        let err = compare_regimes(&input, &flat_rules(), &FiscalYear::from("T1"), &flat()).unwrap_err();
        let fields: Vec<_> = err.violations().into_iter().map(|v| v.field).collect();
        assert_eq!(fields, vec!["basic", "hra"]);
    }

    #[test]
    fn statutory_deductions_include_contributions() {
        let mut input = scenario();
        input.employee_retirement_percent = dec!(12);
        input.employee_pension = Amount::major(10_000);
        input.other_deductions = Amount::major(1_200);

        let statutory = StatutoryDeductions::new(&input, Amount::ZERO);
        assert_eq!(statutory.employee_retirement, Amount::major(60_000));
        assert_eq!(statutory.total, Amount::major(171_200));
    }

    #[test]
    fn conservation_holds_with_every_feature() {
        let mut rules = flat_rules();
        rules.cess_rate = dec!(0.04);
        rules
            .regions
            .insert("TN".to_string(), PayrollTaxRule::Flat { annual: Amount::major(2_500) });
        let input = SalaryInput {
            basic: Amount::from_minor(123_456_789),
            bonus: Amount::from_minor(3_333_333),
            employee_retirement_percent: dec!(12.5),
            employer_retirement_percent: dec!(12),
            other_deductions: Amount::from_minor(77_777),
            state: Some("TN".to_string()),
            ..scenario()
        };

        let result = compare_regimes(&input, &rules, &FiscalYear::from("T1"), &flat()).unwrap();
        let regime = &result.regimes["flat"];
        assert_eq!(
            regime.take_home.yearly + regime.total_tax + regime.statutory_deductions.total,
            result.gross_salary.total
        );
    }
}
