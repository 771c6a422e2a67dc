pub mod deductions;
pub mod error;
pub mod exemptions;
pub mod fiscal;
pub mod gross;
pub mod input;
pub mod money;
pub mod regime;
pub mod slab;

// Flat public surface for domain types and functions.
pub use deductions::{compute_deductions, DeductionResult};
pub use error::{EngineError, RuleSetUnavailable, Violation};
pub use exemptions::{compute_exemptions, ExemptionResult};
pub use fiscal::FiscalYear;
pub use gross::{aggregate, GrossSalaryBreakdown};
pub use input::{read_input_json, SalaryInput, MIN_AGE};
pub use money::{Amount, AmountOutOfRange};
pub use regime::{
    compare_regimes, compute_regime, payroll_tax, rule_violations, RegimeResult,
    SalaryBreakdownResult, StatutoryDeductions, TakeHome,
};
pub use slab::{base_tax, compute_tax, IncomeProfile, TaxBreakdown};
