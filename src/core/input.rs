use super::error::Violation;
use super::money::Amount;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;

/// Youngest age accepted for a salaried taxpayer
pub const MIN_AGE: u8 = 18;

/// One calculation request: annual salary components and personal declarations.
///
/// All amounts are annual. Omitted amounts default to zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SalaryInput {
    /// Basic pay
    pub basic: Amount,
    /// House-rent allowance
    pub hra: Amount,
    pub conveyance_allowance: Amount,
    pub special_allowance: Amount,
    /// Leave/travel allowance
    pub travel_allowance: Amount,
    pub bonus: Amount,
    /// Any other taxable cash component of salary
    pub other_taxable: Amount,
    /// Employee retirement contribution as a percentage of basic (e.g. 12)
    #[schemars(with = "f64")]
    pub employee_retirement_percent: Decimal,
    /// Employer retirement contribution as a percentage of basic
    #[schemars(with = "f64")]
    pub employer_retirement_percent: Decimal,
    /// Employee supplementary-pension contribution
    pub employee_pension: Amount,
    /// Employer supplementary-pension contribution
    pub employer_pension: Amount,
    /// Other deductions withheld from pay that are not tax-relevant
    pub other_deductions: Amount,
    /// Declared investments keyed by section code (e.g. "80C", "NPS-1B")
    pub investments: BTreeMap<String, Amount>,
    /// Annual rent paid
    pub rent_paid: Amount,
    pub lives_in_metro: bool,
    pub age: u8,
    /// Region code for payroll tax, if any applies
    pub state: Option<String>,
    /// Non-salary income taxed at slab rates
    pub other_income: Amount,
    pub short_term_capital_gains: Amount,
    pub long_term_capital_gains: Amount,
}

impl SalaryInput {
    /// Employee retirement contribution for the year
    pub fn employee_retirement(&self) -> Amount {
        self.basic.percent(self.employee_retirement_percent)
    }

    /// Employer retirement contribution for the year
    pub fn employer_retirement(&self) -> Amount {
        self.basic.percent(self.employer_retirement_percent)
    }

    pub fn capital_gains(&self) -> Amount {
        self.short_term_capital_gains + self.long_term_capital_gains
    }

    /// Total declared across every investment section
    pub fn declared_investments(&self) -> Amount {
        self.investments.values().sum()
    }

    /// Checks that do not need a rule set. Returns every violation found.
    pub fn violations(&self) -> Vec<Violation> {
        let mut violations = Vec::new();

        let amounts = [
            ("basic", self.basic),
            ("hra", self.hra),
            ("conveyance_allowance", self.conveyance_allowance),
            ("special_allowance", self.special_allowance),
            ("travel_allowance", self.travel_allowance),
            ("bonus", self.bonus),
            ("other_taxable", self.other_taxable),
            ("employee_pension", self.employee_pension),
            ("employer_pension", self.employer_pension),
            ("other_deductions", self.other_deductions),
            ("rent_paid", self.rent_paid),
            ("other_income", self.other_income),
            ("short_term_capital_gains", self.short_term_capital_gains),
            ("long_term_capital_gains", self.long_term_capital_gains),
        ];
        for (field, amount) in amounts {
            check_amount(&mut violations, field, amount);
        }

        let percentages = [
            ("employee_retirement_percent", self.employee_retirement_percent),
            ("employer_retirement_percent", self.employer_retirement_percent),
        ];
        for (field, pct) in percentages {
            if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                violations.push(Violation::new(field, "must be between 0 and 100"));
            }
        }

        for (section, amount) in &self.investments {
            if section.trim().is_empty() {
                violations.push(Violation::new("investments", "section code must not be empty"));
            }
            check_amount(&mut violations, &format!("investments.{section}"), *amount);
        }
        let total = self
            .investments
            .values()
            .try_fold(Amount::ZERO, |total, amount| total.checked_add(*amount));
        if total.map_or(true, |total| total > Amount::MAX) {
            violations.push(Violation::new(
                "investments",
                format!("total must not exceed {}", Amount::MAX),
            ));
        }

        if self.age < MIN_AGE {
            violations.push(Violation::new(
                "age",
                format!("must be at least {MIN_AGE}"),
            ));
        }

        if let Some(state) = &self.state {
            if state.trim().is_empty() {
                violations.push(Violation::new("state", "must not be empty when given"));
            }
        }

        violations
    }
}

fn check_amount(violations: &mut Vec<Violation>, field: &str, amount: Amount) {
    if amount.is_negative() {
        violations.push(Violation::new(field, "must not be negative"));
    } else if amount > Amount::MAX {
        violations.push(Violation::new(field, format!("must not exceed {}", Amount::MAX)));
    }
}

/// Read a salary input from JSON
pub fn read_input_json<R: Read>(reader: R) -> anyhow::Result<SalaryInput> {
    let input: SalaryInput = serde_json::from_reader(reader)?;
    Ok(input)
}
