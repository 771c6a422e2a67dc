//! Calculate command - per-regime salary breakdown and take-home comparison

use super::{read_input, RuleArgs};
use clap::Args;
use payslab::core::{Amount, RegimeResult, SalaryBreakdownResult};
use payslab::rules::RuleSetCache;
use payslab::{CalculationRequest, SalaryEngine};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tabled::{
    builder::Builder,
    settings::{object::Columns, Alignment, Modify, Style},
};

#[derive(Args, Debug)]
pub struct CalculateCommand {
    /// JSON file containing the salary input ("-" for stdin)
    #[arg(short, long)]
    input: PathBuf,

    #[command(flatten)]
    rules: RuleArgs,

    /// Regime to compute; repeat for several (defaults to every regime in the rule set)
    #[arg(short = 'r', long = "regime")]
    regimes: Vec<String>,

    /// Output as JSON instead of a table
    #[arg(long, conflicts_with = "csv")]
    json: bool,

    /// Output one CSV row per regime
    #[arg(long)]
    csv: bool,

    /// Give up loading the rule set after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

impl CalculateCommand {
    pub async fn exec(&self) -> anyhow::Result<()> {
        let input = read_input(&self.input)?;
        let fiscal_year = self.rules.fiscal_year();

        let mut cache = RuleSetCache::new(self.rules.source());
        if let Some(secs) = self.timeout_secs {
            cache = cache.with_timeout(Duration::from_secs(secs));
        }
        let engine = SalaryEngine::with_cache(cache);

        let regimes = if self.regimes.is_empty() {
            let rules = engine.rule_set(&fiscal_year).await?;
            rules.regime_names().map(String::from).collect()
        } else {
            self.regimes.clone()
        };
        let request = CalculationRequest {
            fiscal_year,
            regimes,
        };

        let result = match engine.calculate(&input, &request).await {
            Ok(result) => result,
            Err(err) if err.is_validation() => {
                for violation in err.violations() {
                    eprintln!("  {violation}");
                }
                anyhow::bail!("{} invalid input field(s)", err.violations().len());
            }
            Err(err) => return Err(err.into()),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        } else if self.csv {
            write_csv(&result)
        } else {
            print_table(&result);
            Ok(())
        }
    }
}

fn print_table(result: &SalaryBreakdownResult) {
    let mut builder = Builder::default();
    let mut header = vec![format!("FY {}", result.fiscal_year)];
    header.extend(result.regimes.keys().cloned());
    builder.push_record(header);

    let mut gross = vec!["Gross salary".to_string()];
    gross.extend(result.regimes.values().map(|_| result.gross_salary.total.to_string()));
    builder.push_record(gross);

    let columns: Vec<[Amount; 12]> = result.regimes.values().map(figures).collect();
    for (i, label) in LINES.iter().enumerate() {
        let mut record = vec![label.to_string()];
        record.extend(columns.iter().map(|column| column[i].to_string()));
        builder.push_record(record);
    }

    let table = builder
        .build()
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}

const LINES: [&str; 12] = [
    "Exemptions",
    "Deductions",
    "Taxable income",
    "Slab tax",
    "Rebate",
    "Capital gains tax",
    "Surcharge",
    "Cess",
    "Total tax",
    "Statutory deductions",
    "Take-home (yearly)",
    "Take-home (monthly)",
];

/// Per-regime figures in the order of `LINES`
fn figures(r: &RegimeResult) -> [Amount; 12] {
    [
        r.exemptions.total,
        r.deductions.total,
        r.taxable_income,
        r.base_tax,
        r.rebate,
        r.capital_gains_tax,
        r.surcharge,
        r.cess,
        r.total_tax,
        r.statutory_deductions.total,
        r.take_home.yearly,
        r.take_home.monthly,
    ]
}

#[derive(Debug, Serialize)]
struct RegimeRow<'a> {
    fiscal_year: &'a str,
    regime: &'a str,
    gross_salary: Amount,
    exemptions: Amount,
    deductions: Amount,
    taxable_income: Amount,
    base_tax: Amount,
    rebate: Amount,
    capital_gains_tax: Amount,
    surcharge: Amount,
    cess: Amount,
    total_tax: Amount,
    statutory_deductions: Amount,
    take_home_yearly: Amount,
    take_home_monthly: Amount,
}

fn write_csv(result: &SalaryBreakdownResult) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(io::stdout());
    for (regime, r) in &result.regimes {
        wtr.serialize(RegimeRow {
            fiscal_year: result.fiscal_year.as_str(),
            regime,
            gross_salary: result.gross_salary.total,
            exemptions: r.exemptions.total,
            deductions: r.deductions.total,
            taxable_income: r.taxable_income,
            base_tax: r.base_tax,
            rebate: r.rebate,
            capital_gains_tax: r.capital_gains_tax,
            surcharge: r.surcharge,
            cess: r.cess,
            total_tax: r.total_tax,
            statutory_deductions: r.statutory_deductions.total,
            take_home_yearly: r.take_home.yearly,
            take_home_monthly: r.take_home.monthly,
        })?;
    }
    wtr.flush()?;
    Ok(())
}
