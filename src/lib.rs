//! Salary breakdown and income tax across competing tax regimes.
//!
//! A [`SalaryEngine`] resolves the [`rules::TaxRuleSet`] published for a fiscal
//! year and runs the same salary input through each requested regime, returning
//! gross pay, exemptions, deductions, tax and take-home pay per regime.

pub mod core;
pub mod engine;
pub mod rules;

pub use engine::{CalculationRequest, SalaryEngine};
