//! Schema command - print expected input formats

use clap::Args;
use payslab::core::SalaryInput;
use payslab::rules::TaxRuleSet;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Which document to describe
    #[arg(value_enum, default_value = "input")]
    target: SchemaTarget,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaTarget {
    /// JSON Schema for the salary input file
    Input,
    /// JSON Schema for a fiscal-year rule set file
    Rules,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let schema = match self.target {
            SchemaTarget::Input => schema_for!(SalaryInput),
            SchemaTarget::Rules => schema_for!(TaxRuleSet),
        };
        println!("{}", serde_json::to_string_pretty(&schema)?);
        Ok(())
    }
}
