use super::error::EngineError;
use super::money::{round_minor, Amount};
use crate::rules::{RegimeRules, Slab, TaxRuleSet};
use rust_decimal::Decimal;
use serde::Serialize;

/// What the slab calculator taxes for one regime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomeProfile {
    pub taxable_income: Amount,
    pub short_term_gains: Amount,
    pub long_term_gains: Amount,
    pub age: u8,
}

impl IncomeProfile {
    /// Slab income plus capital gains; the figure rebate and surcharge thresholds
    /// are compared against.
    pub fn total_income(&self) -> Amount {
        self.taxable_income + self.short_term_gains + self.long_term_gains
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TaxBreakdown {
    /// Progressive slab tax before rebate
    pub base_tax: Amount,
    pub capital_gains_tax: Amount,
    pub rebate: Amount,
    pub surcharge: Amount,
    pub cess: Amount,
    pub total_tax: Amount,
}

/// Sum of every slab's marginal share of `income`.
///
/// Products are accumulated exactly and rounded half-up once at the end.
pub fn base_tax(income: Amount, slabs: &[Slab]) -> Result<Amount, EngineError> {
    let mut previous = Amount::ZERO;
    let mut tax = Decimal::ZERO;

    for slab in slabs {
        let ceiling = match slab.up_to {
            Some(upper) if upper <= previous => {
                return Err(EngineError::Invariant(format!(
                    "slab upper bound {upper} not above {previous}"
                )))
            }
            Some(upper) => upper.min(income),
            None => income,
        };
        let portion = ceiling.saturating_sub(previous);
        tax += Decimal::from(portion.minor()) * slab.rate;

        match slab.up_to {
            Some(upper) => previous = upper,
            None => return Ok(round_minor(tax)),
        }
    }

    if income > previous {
        return Err(EngineError::Invariant(format!(
            "income {income} exceeds the last slab bound {previous}"
        )));
    }
    Ok(round_minor(tax))
}

pub fn compute_tax(
    profile: IncomeProfile,
    rules: &TaxRuleSet,
    regime: &RegimeRules,
) -> Result<TaxBreakdown, EngineError> {
    let total_income = profile.total_income();
    let base_tax = base_tax(profile.taxable_income, regime.slabs_for_age(profile.age))?;

    let rebate = match &regime.rebate {
        Some(rule) if total_income <= rule.net_income_threshold => {
            base_tax.min(rule.max_rebate_amount)
        }
        _ => Amount::ZERO,
    };
    let after_rebate = base_tax.saturating_sub(rebate);

    let capital_gains_tax = rules.capital_gains.as_ref().map_or(Amount::ZERO, |cg| {
        profile.short_term_gains.apply_rate(cg.short_term_rate)
            + profile
                .long_term_gains
                .saturating_sub(cg.long_term_exemption)
                .apply_rate(cg.long_term_rate)
    });

    let tax = after_rebate + capital_gains_tax;

    let surcharge = regime
        .surcharge
        .iter()
        .rev()
        .find(|tier| tier.income_threshold <= total_income)
        .map_or(Amount::ZERO, |tier| tax.apply_rate(tier.rate));

    let cess = (tax + surcharge).apply_rate(rules.cess_rate);
    let total_tax = tax + surcharge + cess;

    log::debug!(
        "Tax on {}: base {base_tax}, rebate {rebate}, gains {capital_gains_tax}, surcharge {surcharge}, cess {cess}",
        profile.taxable_income
    );

    Ok(TaxBreakdown {
        base_tax,
        capital_gains_tax,
        rebate,
        surcharge,
        cess,
        total_tax,
    })
}
