//! Rules command - validate and display a published rule set

use super::RuleArgs;
use clap::Args;
use payslab::rules::{PayrollTaxRule, RegimeRules, RuleSetCache, Slab, TaxRuleSet};
use rust_decimal::Decimal;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct RulesCommand {
    #[command(flatten)]
    rules: RuleArgs,

    /// Output the rule set as JSON
    #[arg(long)]
    json: bool,
}

impl RulesCommand {
    pub async fn exec(&self) -> anyhow::Result<()> {
        let fiscal_year = self.rules.fiscal_year();
        let cache = RuleSetCache::new(self.rules.source());
        let rules = cache.resolve(&fiscal_year).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(rules.as_ref())?);
            return Ok(());
        }

        println!("Fiscal year: {fiscal_year}");
        if let Some(description) = &rules.description {
            println!("{description}");
        }
        println!("Fingerprint: {}", rules.fingerprint());
        println!("Cess: {}", percent(rules.cess_rate));

        for (name, regime) in &rules.regimes {
            print_regime(name, regime);
        }
        print_limits(&rules);
        Ok(())
    }
}

#[derive(Tabled)]
struct SlabRow {
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Rate")]
    rate: String,
}

fn slab_rows(slabs: &[Slab]) -> Vec<SlabRow> {
    let mut from = String::from("0.00");
    slabs
        .iter()
        .map(|slab| {
            let to = slab.up_to.map_or_else(|| "-".to_string(), |u| u.to_string());
            SlabRow {
                from: std::mem::replace(&mut from, to.clone()),
                to,
                rate: percent(slab.rate),
            }
        })
        .collect()
}

fn print_regime(name: &str, regime: &RegimeRules) {
    println!();
    println!("Regime: {name}");
    println!("  Standard deduction: {}", regime.standard_deduction);
    if let Some(rebate) = &regime.rebate {
        println!(
            "  Rebate: up to {} when income <= {}",
            rebate.max_rebate_amount, rebate.net_income_threshold
        );
    }
    for tier in &regime.surcharge {
        println!("  Surcharge: {} from {}", percent(tier.rate), tier.income_threshold);
    }
    let sections: Vec<&str> = regime.eligibility.sections.iter().map(String::as_str).collect();
    println!(
        "  Sections: {}",
        if sections.is_empty() { "none".to_string() } else { sections.join(", ") }
    );
    println!(
        "  House rent exemption: {}, travel allowance exemption: {}",
        yes_no(regime.eligibility.house_rent_exemption),
        yes_no(regime.eligibility.travel_allowance_exemption)
    );

    print_slabs(&regime.slabs);
    for band in &regime.age_slabs {
        println!("  Age {} and over:", band.min_age);
        print_slabs(&band.slabs);
    }
}

fn print_slabs(slabs: &[Slab]) {
    let table = Table::new(slab_rows(slabs))
        .with(Style::rounded())
        .with(Modify::new(Columns::new(..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
}

#[derive(Tabled)]
struct LimitRow {
    #[tabled(rename = "Section")]
    section: String,
    #[tabled(rename = "Limit")]
    limit: String,
}

fn print_limits(rules: &TaxRuleSet) {
    if !rules.deduction_limits.is_empty() {
        println!();
        println!("Deduction limits");
        let rows = rules.deduction_limits.iter().map(|(section, limit)| LimitRow {
            section: section.clone(),
            limit: limit.to_string(),
        });
        println!("{}", Table::new(rows).with(Style::rounded()));
    }

    if !rules.regions.is_empty() {
        println!();
        println!("Payroll tax regions");
        for (code, rule) in &rules.regions {
            match rule {
                PayrollTaxRule::Flat { annual } => println!("  {code}: {annual} flat"),
                PayrollTaxRule::Slabs { bands } => {
                    let bands: Vec<String> = bands
                        .iter()
                        .map(|b| match b.up_to {
                            Some(upper) => format!("{} up to {upper}", b.annual),
                            None => format!("{} above", b.annual),
                        })
                        .collect();
                    println!("  {code}: {}", bands.join("; "));
                }
            }
        }
    }
}

fn percent(rate: Decimal) -> String {
    format!("{}%", (rate * Decimal::ONE_HUNDRED).normalize())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
