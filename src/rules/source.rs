//! Where rule sets come from.

use super::TaxRuleSet;
use crate::core::error::RuleSetUnavailable;
use crate::core::fiscal::FiscalYear;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

/// Supplies the rule set published for a fiscal year.
///
/// Implementations only fetch and parse; structural validation is done once by
/// the cache.
#[async_trait]
pub trait RuleSource: Send + Sync {
    async fn fetch(&self, fiscal_year: &FiscalYear) -> Result<TaxRuleSet, RuleSetUnavailable>;
}

/// Reads `<root>/<fiscal-year>.json`
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectorySource { root: root.into() }
    }

    pub fn path_for(&self, fiscal_year: &FiscalYear) -> PathBuf {
        self.root.join(format!("{}.json", fiscal_year.as_str()))
    }
}

#[async_trait]
impl RuleSource for DirectorySource {
    async fn fetch(&self, fiscal_year: &FiscalYear) -> Result<TaxRuleSet, RuleSetUnavailable> {
        if fiscal_year.as_str().contains(['/', '\\']) || fiscal_year.as_str().starts_with('.') {
            return Err(RuleSetUnavailable::NotFound(fiscal_year.clone()));
        }
        let path = self.path_for(fiscal_year);
        log::debug!("Reading rule set {}", path.display());

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(RuleSetUnavailable::NotFound(fiscal_year.clone()))
            }
            Err(err) => {
                return Err(RuleSetUnavailable::Fetch {
                    fiscal_year: fiscal_year.clone(),
                    reason: format!("{}: {err}", path.display()),
                })
            }
        };
        parse(fiscal_year, &bytes)
    }
}

/// Rule sets held in memory, for embedding and tests
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rules: BTreeMap<FiscalYear, TaxRuleSet>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, fiscal_year: impl Into<FiscalYear>, rules: TaxRuleSet) -> Self {
        self.rules.insert(fiscal_year.into(), rules);
        self
    }
}

#[async_trait]
impl RuleSource for MemorySource {
    async fn fetch(&self, fiscal_year: &FiscalYear) -> Result<TaxRuleSet, RuleSetUnavailable> {
        self.rules
            .get(fiscal_year)
            .cloned()
            .ok_or_else(|| RuleSetUnavailable::NotFound(fiscal_year.clone()))
    }
}

const BUILTIN: &[(&str, &str)] = &[
    ("2024-25", include_str!("../../rules/2024-25.json")),
    ("2025-26", include_str!("../../rules/2025-26.json")),
];

/// Rule sets bundled with the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSource;

impl BuiltinSource {
    pub fn fiscal_years() -> impl Iterator<Item = FiscalYear> {
        BUILTIN.iter().map(|(key, _)| FiscalYear::from(*key))
    }
}

#[async_trait]
impl RuleSource for BuiltinSource {
    async fn fetch(&self, fiscal_year: &FiscalYear) -> Result<TaxRuleSet, RuleSetUnavailable> {
        let (_, json) = BUILTIN
            .iter()
            .find(|(key, _)| *key == fiscal_year.as_str())
            .ok_or_else(|| RuleSetUnavailable::NotFound(fiscal_year.clone()))?;
        parse(fiscal_year, json.as_bytes())
    }
}

fn parse(fiscal_year: &FiscalYear, bytes: &[u8]) -> Result<TaxRuleSet, RuleSetUnavailable> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(RuleSetUnavailable::Malformed {
            fiscal_year: fiscal_year.clone(),
            problems: vec!["empty rule set".to_string()],
        });
    }
    super::read_rules_json(bytes).map_err(|err| RuleSetUnavailable::Malformed {
        fiscal_year: fiscal_year.clone(),
        problems: vec![err.to_string()],
    })
}
