pub mod calculate;
pub mod rules;
pub mod schema;

use clap::Args;
use payslab::core::{read_input_json, FiscalYear, SalaryInput};
use payslab::rules::{BuiltinSource, DirectorySource, RuleSource};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where to load rule sets from and which fiscal year to use
#[derive(Args, Debug)]
pub struct RuleArgs {
    /// Fiscal year, e.g. 2025-26 (defaults to the current fiscal year)
    #[arg(short = 'y', long = "year")]
    fiscal_year: Option<String>,

    /// Directory of <fiscal-year>.json rule sets (defaults to the bundled rules)
    #[arg(long = "rules", env = "PAYSLAB_RULES_DIR")]
    rules_dir: Option<PathBuf>,
}

impl RuleArgs {
    pub fn fiscal_year(&self) -> FiscalYear {
        match &self.fiscal_year {
            Some(key) => FiscalYear::new(key.trim()),
            None => FiscalYear::containing(chrono::Local::now().date_naive()),
        }
    }

    pub fn source(&self) -> Arc<dyn RuleSource> {
        match &self.rules_dir {
            Some(dir) => {
                log::debug!("Using rule sets from {}", dir.display());
                Arc::new(DirectorySource::new(dir))
            }
            None => Arc::new(BuiltinSource),
        }
    }
}

/// Read a salary input (JSON) from a file, or stdin with "-"
pub fn read_input(path: &Path) -> anyhow::Result<SalaryInput> {
    if path.as_os_str() == "-" {
        read_from_stdin()
    } else {
        let file = File::open(path)
            .map_err(|err| anyhow::anyhow!("{}: {err}", path.display()))?;
        read_input_json(BufReader::new(file))
    }
}

fn read_from_stdin() -> anyhow::Result<SalaryInput> {
    let mut buffer = Vec::new();
    io::stdin().lock().read_to_end(&mut buffer)?;

    if buffer.iter().all(u8::is_ascii_whitespace) {
        anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
    }
    read_input_json(buffer.as_slice())
}
