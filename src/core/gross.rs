use super::input::SalaryInput;
use super::money::Amount;
use serde::Serialize;

/// Declared salary components and their sum
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrossSalaryBreakdown {
    pub basic: Amount,
    pub hra: Amount,
    pub conveyance_allowance: Amount,
    pub special_allowance: Amount,
    pub travel_allowance: Amount,
    pub bonus: Amount,
    pub other_taxable: Amount,
    /// Non-salary income, carried here so it reaches taxable income
    pub other_income: Amount,
    pub total: Amount,
}

pub fn aggregate(input: &SalaryInput) -> GrossSalaryBreakdown {
    let components = [
        input.basic,
        input.hra,
        input.conveyance_allowance,
        input.special_allowance,
        input.travel_allowance,
        input.bonus,
        input.other_taxable,
        input.other_income,
    ];

    GrossSalaryBreakdown {
        basic: input.basic,
        hra: input.hra,
        conveyance_allowance: input.conveyance_allowance,
        special_allowance: input.special_allowance,
        travel_allowance: input.travel_allowance,
        bonus: input.bonus,
        other_taxable: input.other_taxable,
        other_income: input.other_income,
        total: components.iter().sum(),
    }
}
