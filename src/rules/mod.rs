//! Versioned, fiscal-year-scoped tax rules.
//!
//! A [`TaxRuleSet`] is published once per fiscal year and never changes after it
//! has been fetched. Everything regime-specific lives on [`RegimeRules`], so adding
//! a regime is a data change: components read eligibility flags, never regime names.

pub mod cache;
pub mod source;

use crate::core::money::Amount;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

pub use cache::{CacheStats, RuleSetCache};
pub use source::{BuiltinSource, DirectorySource, MemorySource, RuleSource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaxRuleSet {
    #[serde(default)]
    pub description: Option<String>,
    pub regimes: BTreeMap<String, RegimeRules>,
    /// Flat levy on (tax + surcharge), as a fraction
    #[serde(default)]
    #[schemars(with = "f64")]
    pub cess_rate: Decimal,
    /// Maximum deductible amount per investment section
    #[serde(default)]
    pub deduction_limits: BTreeMap<String, Amount>,
    /// Payroll tax per region code
    #[serde(default)]
    pub regions: BTreeMap<String, PayrollTaxRule>,
    #[serde(default)]
    pub house_rent: HouseRentRules,
    /// Cap on the travel-allowance exemption; uncapped when absent
    #[serde(default)]
    pub travel_allowance_cap: Option<Amount>,
    #[serde(default)]
    pub contribution_sections: ContributionSections,
    #[serde(default)]
    pub capital_gains: Option<CapitalGainsRules>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RegimeRules {
    pub slabs: Vec<Slab>,
    /// Slab tables that replace `slabs` from a minimum age upwards
    #[serde(default)]
    pub age_slabs: Vec<AgeSlabs>,
    #[serde(default)]
    pub standard_deduction: Amount,
    #[serde(default)]
    pub rebate: Option<Rebate>,
    /// Ascending by threshold
    #[serde(default)]
    pub surcharge: Vec<SurchargeTier>,
    #[serde(default)]
    pub employer_contribution_cap: Option<ContributionCap>,
    #[serde(default)]
    pub eligibility: Eligibility,
}

/// A contiguous income bracket. The bracket starts at the previous slab's
/// upper bound; `up_to: None` marks the open-ended top slab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Slab {
    #[serde(default)]
    pub up_to: Option<Amount>,
    #[schemars(with = "f64")]
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AgeSlabs {
    pub min_age: u8,
    pub slabs: Vec<Slab>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Rebate {
    pub net_income_threshold: Amount,
    pub max_rebate_amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SurchargeTier {
    pub income_threshold: Amount,
    #[schemars(with = "f64")]
    pub rate: Decimal,
}

/// The lower of the two limits applies; absent limits do not constrain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ContributionCap {
    #[serde(default)]
    pub amount: Option<Amount>,
    #[serde(default)]
    #[schemars(with = "Option<f64>")]
    pub percent_of_basic: Option<Decimal>,
}

/// What a regime allows to reduce taxable income.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Eligibility {
    /// Investment sections that may be deducted
    pub sections: BTreeSet<String>,
    pub house_rent_exemption: bool,
    pub travel_allowance_exemption: bool,
    /// Employee-side retirement and pension contributions
    pub employee_contributions: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct HouseRentRules {
    /// Cap as a percentage of basic pay for metro residents
    #[schemars(with = "f64")]
    pub metro_percent: Decimal,
    #[schemars(with = "f64")]
    pub non_metro_percent: Decimal,
    /// Percentage of basic pay subtracted from rent paid
    #[serde(default = "default_rent_offset")]
    #[schemars(with = "f64")]
    pub rent_offset_percent: Decimal,
}

fn default_rent_offset() -> Decimal {
    Decimal::TEN
}

impl Default for HouseRentRules {
    fn default() -> Self {
        HouseRentRules {
            metro_percent: Decimal::ZERO,
            non_metro_percent: Decimal::ZERO,
            rent_offset_percent: default_rent_offset(),
        }
    }
}

/// Sections into which employee-side contributions are pooled before capping
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ContributionSections {
    pub retirement: Option<String>,
    pub pension: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CapitalGainsRules {
    #[schemars(with = "f64")]
    pub short_term_rate: Decimal,
    #[schemars(with = "f64")]
    pub long_term_rate: Decimal,
    #[serde(default)]
    pub long_term_exemption: Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayrollTaxRule {
    Flat { annual: Amount },
    /// The first band whose `up_to` covers annual gross applies
    Slabs { bands: Vec<PayrollTaxBand> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PayrollTaxBand {
    #[serde(default)]
    pub up_to: Option<Amount>,
    pub annual: Amount,
}

impl PayrollTaxRule {
    /// Annual payroll tax due on `gross`
    pub fn annual_amount(&self, gross: Amount) -> Amount {
        match self {
            PayrollTaxRule::Flat { annual } => *annual,
            PayrollTaxRule::Slabs { bands } => bands
                .iter()
                .find(|band| band.up_to.map_or(true, |upper| gross <= upper))
                .map_or(Amount::ZERO, |band| band.annual),
        }
    }
}

impl RegimeRules {
    /// Slab table for a taxpayer of the given age
    pub fn slabs_for_age(&self, age: u8) -> &[Slab] {
        self.age_slabs
            .iter()
            .filter(|band| band.min_age <= age)
            .max_by_key(|band| band.min_age)
            .map_or(self.slabs.as_slice(), |band| band.slabs.as_slice())
    }
}

impl TaxRuleSet {
    pub fn regime(&self, name: &str) -> Option<&RegimeRules> {
        self.regimes.get(name)
    }

    pub fn regime_names(&self) -> impl Iterator<Item = &str> {
        self.regimes.keys().map(String::as_str)
    }

    pub fn deduction_limit(&self, section: &str) -> Option<Amount> {
        self.deduction_limits.get(section).copied()
    }

    /// SHA-256 of the canonical JSON encoding. Maps are ordered, so equal rule
    /// sets always produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    /// Structural problems that make the rule set unusable. Empty when valid.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.regimes.is_empty() {
            problems.push("no regimes defined".to_string());
        }
        check_rate(&mut problems, "cess_rate", self.cess_rate);

        for (section, cap) in &self.deduction_limits {
            check_amount(&mut problems, &format!("deduction_limits.{section}"), *cap);
        }

        for (name, regime) in &self.regimes {
            check_slabs(&mut problems, &format!("regimes.{name}.slabs"), &regime.slabs);
            for band in &regime.age_slabs {
                check_slabs(
                    &mut problems,
                    &format!("regimes.{name}.age_slabs[{}]", band.min_age),
                    &band.slabs,
                );
            }

            check_amount(
                &mut problems,
                &format!("regimes.{name}.standard_deduction"),
                regime.standard_deduction,
            );

            if let Some(rebate) = &regime.rebate {
                check_amount(
                    &mut problems,
                    &format!("regimes.{name}.rebate.net_income_threshold"),
                    rebate.net_income_threshold,
                );
                check_amount(
                    &mut problems,
                    &format!("regimes.{name}.rebate.max_rebate_amount"),
                    rebate.max_rebate_amount,
                );
            }

            let mut previous: Option<Amount> = None;
            for (i, tier) in regime.surcharge.iter().enumerate() {
                let field = format!("regimes.{name}.surcharge[{i}]");
                check_rate(&mut problems, &field, tier.rate);
                if previous.is_some_and(|p| tier.income_threshold <= p) {
                    problems.push(format!("{field}: thresholds must be strictly ascending"));
                }
                previous = Some(tier.income_threshold);
            }

            if let Some(cap) = &regime.employer_contribution_cap {
                if let Some(amount) = cap.amount {
                    check_amount(
                        &mut problems,
                        &format!("regimes.{name}.employer_contribution_cap.amount"),
                        amount,
                    );
                }
                if let Some(pct) = cap.percent_of_basic {
                    check_percent(
                        &mut problems,
                        &format!("regimes.{name}.employer_contribution_cap.percent_of_basic"),
                        pct,
                    );
                }
            }

            for section in &regime.eligibility.sections {
                if !self.deduction_limits.contains_key(section) {
                    problems.push(format!(
                        "regimes.{name}.eligibility: section {section} has no deduction limit"
                    ));
                }
            }
        }

        let ContributionSections { retirement, pension } = &self.contribution_sections;
        for (field, section) in [("retirement", retirement), ("pension", pension)] {
            if let Some(section) = section {
                if !self.deduction_limits.contains_key(section) {
                    problems.push(format!(
                        "contribution_sections.{field}: section {section} has no deduction limit"
                    ));
                }
            }
        }

        check_percent(&mut problems, "house_rent.metro_percent", self.house_rent.metro_percent);
        check_percent(&mut problems, "house_rent.non_metro_percent", self.house_rent.non_metro_percent);
        check_percent(&mut problems, "house_rent.rent_offset_percent", self.house_rent.rent_offset_percent);

        if let Some(cap) = self.travel_allowance_cap {
            check_amount(&mut problems, "travel_allowance_cap", cap);
        }

        if let Some(cg) = &self.capital_gains {
            check_rate(&mut problems, "capital_gains.short_term_rate", cg.short_term_rate);
            check_rate(&mut problems, "capital_gains.long_term_rate", cg.long_term_rate);
            check_amount(&mut problems, "capital_gains.long_term_exemption", cg.long_term_exemption);
        }

        for (code, rule) in &self.regions {
            check_payroll_tax(&mut problems, &format!("regions.{code}"), rule);
        }

        problems
    }
}

fn check_amount(problems: &mut Vec<String>, field: &str, amount: Amount) {
    if amount.is_negative() {
        problems.push(format!("{field}: negative amount"));
    } else if amount > Amount::MAX {
        problems.push(format!("{field}: amount above {}", Amount::MAX));
    }
}

fn check_rate(problems: &mut Vec<String>, field: &str, rate: Decimal) {
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        problems.push(format!("{field}: rate {rate} outside [0, 1]"));
    }
}

fn check_percent(problems: &mut Vec<String>, field: &str, pct: Decimal) {
    if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
        problems.push(format!("{field}: percentage {pct} outside [0, 100]"));
    }
}

fn check_slabs(problems: &mut Vec<String>, field: &str, slabs: &[Slab]) {
    if slabs.is_empty() {
        problems.push(format!("{field}: missing slab table"));
        return;
    }
    let last = slabs.len() - 1;
    let mut previous = Amount::ZERO;
    for (i, slab) in slabs.iter().enumerate() {
        check_rate(problems, &format!("{field}[{i}]"), slab.rate);
        match slab.up_to {
            Some(upper) => {
                if upper <= previous {
                    problems.push(format!("{field}[{i}]: upper bounds must be strictly ascending"));
                }
                if i == last {
                    problems.push(format!("{field}[{i}]: last slab must be unbounded"));
                }
                previous = upper;
            }
            None if i != last => {
                problems.push(format!("{field}[{i}]: only the last slab may be unbounded"));
            }
            None => {}
        }
    }
}

fn check_payroll_tax(problems: &mut Vec<String>, field: &str, rule: &PayrollTaxRule) {
    match rule {
        PayrollTaxRule::Flat { annual } => {
            check_amount(problems, field, *annual);
        }
        PayrollTaxRule::Slabs { bands } => {
            if bands.is_empty() {
                problems.push(format!("{field}: missing bands"));
                return;
            }
            let last = bands.len() - 1;
            let mut previous: Option<Amount> = None;
            for (i, band) in bands.iter().enumerate() {
                check_amount(problems, &format!("{field}.bands[{i}]"), band.annual);
                match band.up_to {
                    Some(upper) => {
                        if previous.is_some_and(|p| upper <= p) {
                            problems.push(format!("{field}.bands[{i}]: bounds must be strictly ascending"));
                        }
                        if i == last {
                            problems.push(format!("{field}.bands[{i}]: last band must be unbounded"));
                        }
                        previous = Some(upper);
                    }
                    None if i != last => {
                        problems.push(format!("{field}.bands[{i}]: only the last band may be unbounded"));
                    }
                    None => {}
                }
            }
        }
    }
}

/// Read a rule set from JSON without validating it
pub fn read_rules_json<R: Read>(reader: R) -> serde_json::Result<TaxRuleSet> {
    serde_json::from_reader(reader)
}
