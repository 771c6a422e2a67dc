use super::input::SalaryInput;
use super::money::Amount;
use crate::rules::{RegimeRules, TaxRuleSet};
use serde::Serialize;

/// Portions of declared allowances excluded from taxable income
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ExemptionResult {
    pub house_rent: Amount,
    pub travel_allowance: Amount,
    pub total: Amount,
}

pub fn compute_exemptions(
    input: &SalaryInput,
    rules: &TaxRuleSet,
    regime: &RegimeRules,
) -> ExemptionResult {
    let house_rent = if regime.eligibility.house_rent_exemption {
        house_rent_exemption(input, rules)
    } else {
        Amount::ZERO
    };

    let travel_allowance = if regime.eligibility.travel_allowance_exemption {
        rules
            .travel_allowance_cap
            .map_or(input.travel_allowance, |cap| input.travel_allowance.min(cap))
    } else {
        Amount::ZERO
    };

    log::debug!("Exemptions: house rent {house_rent}, travel {travel_allowance}");

    ExemptionResult {
        house_rent,
        travel_allowance,
        total: house_rent + travel_allowance,
    }
}

/// Least of: the allowance received, rent paid in excess of a share of basic,
/// and a residency-dependent share of basic.
fn house_rent_exemption(input: &SalaryInput, rules: &TaxRuleSet) -> Amount {
    let params = &rules.house_rent;
    let rent_over_basic = input
        .rent_paid
        .saturating_sub(input.basic.percent(params.rent_offset_percent));
    let basic_cap = input.basic.percent(if input.lives_in_metro {
        params.metro_percent
    } else {
        params.non_metro_percent
    });

    input.hra.min(rent_over_basic).min(basic_cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::tests::flat_rules;
    use rust_decimal_macros::dec;

    fn rules() -> TaxRuleSet {
        let mut rules = flat_rules();
        rules.house_rent.metro_percent = dec!(50);
        rules.house_rent.non_metro_percent = dec!(40);
        let eligibility = &mut rules.regimes.get_mut("flat").unwrap().eligibility;
        eligibility.house_rent_exemption = true;
        eligibility.travel_allowance_exemption = true;
        rules
    }

    fn input(hra: i64, rent: i64, metro: bool) -> SalaryInput {
        SalaryInput {
            basic: Amount::major(600_000),
            hra: Amount::major(hra),
            rent_paid: Amount::major(rent),
            lives_in_metro: metro,
            age: 30,
            ..Default::default()
        }
    }

    fn house_rent(input: &SalaryInput, rules: &TaxRuleSet) -> Amount {
        compute_exemptions(input, rules, rules.regime("flat").unwrap()).house_rent
    }

    #[test]
    fn limited_by_allowance_received() {
        let rules = rules();
        // rent excess 300,000; metro cap 300,000; allowance 120,000
        assert_eq!(house_rent(&input(120_000, 360_000, true), &rules), Amount::major(120_000));
    }

    #[test]
    fn limited_by_rent_over_tenth_of_basic() {
        let rules = rules();
        // 240,000 - 60,000 = 180,000
        assert_eq!(house_rent(&input(300_000, 240_000, true), &rules), Amount::major(180_000));
    }

    #[test]
    fn limited_by_non_metro_share_of_basic() {
        let rules = rules();
        // 40% of 600,000 = 240,000
        assert_eq!(house_rent(&input(300_000, 600_000, false), &rules), Amount::major(240_000));
        assert_eq!(house_rent(&input(400_000, 600_000, true), &rules), Amount::major(300_000));
    }

    #[test]
    fn rent_below_offset_gives_nothing() {
        let rules = rules();
        assert_eq!(house_rent(&input(300_000, 50_000, true), &rules), Amount::ZERO);
    }

    #[test]
    fn disallowed_regime_gets_nothing() {
        let rules = flat_rules();
        let mut salary = input(300_000, 360_000, true);
        salary.travel_allowance = Amount::major(40_000);
        let result = compute_exemptions(&salary, &rules, rules.regime("flat").unwrap());
        assert_eq!(result, ExemptionResult::default());
    }

    #[test]
    fn travel_allowance_capped() {
        let mut rules = rules();
        let mut salary = input(0, 0, true);
        salary.travel_allowance = Amount::major(40_000);

        let regime = rules.regime("flat").unwrap().clone();
        assert_eq!(
            compute_exemptions(&salary, &rules, &regime).travel_allowance,
            Amount::major(40_000)
        );

        rules.travel_allowance_cap = Some(Amount::major(25_000));
        let result = compute_exemptions(&salary, &rules, &regime);
        assert_eq!(result.travel_allowance, Amount::major(25_000));
        assert_eq!(result.total, Amount::major(25_000));
    }
}
