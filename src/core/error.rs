use super::fiscal::FiscalYear;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// A single rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Violation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// The rule source could not supply a usable rule set.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RuleSetUnavailable {
    #[error("no rule set published for fiscal year {0}")]
    NotFound(FiscalYear),
    #[error("rule set for fiscal year {fiscal_year} is malformed: {}", .problems.join("; "))]
    Malformed {
        fiscal_year: FiscalYear,
        problems: Vec<String>,
    },
    #[error("fetching rule set for fiscal year {fiscal_year} failed: {reason}")]
    Fetch {
        fiscal_year: FiscalYear,
        reason: String,
    },
    #[error("timed out after {timeout:?} resolving rule set for fiscal year {fiscal_year}")]
    Timeout {
        fiscal_year: FiscalYear,
        timeout: Duration,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {}", join(.0))]
    Validation(Vec<Violation>),
    #[error("unknown deduction section(s): {}", .0.join(", "))]
    UnknownDeductionSection(Vec<String>),
    #[error(transparent)]
    RuleSetUnavailable(#[from] RuleSetUnavailable),
    /// A rule set that passed validation still broke an invariant mid-pipeline
    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

impl EngineError {
    /// True for errors caused by the caller's input rather than the rule set.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_) | EngineError::UnknownDeductionSection(_)
        )
    }

    /// Every violation this error represents, with unknown sections reported
    /// against the `investments` field.
    pub fn violations(&self) -> Vec<Violation> {
        match self {
            EngineError::Validation(violations) => violations.clone(),
            EngineError::UnknownDeductionSection(sections) => sections
                .iter()
                .map(|s| {
                    Violation::new(
                        format!("investments.{s}"),
                        "no deduction limit for this section in the rule set",
                    )
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_violation() {
        let err = EngineError::Validation(vec![
            Violation::new("basic", "must not be negative"),
            Violation::new("age", "must be at least 18"),
        ]);
        assert_eq!(
            err.to_string(),
            "invalid input: basic: must not be negative; age: must be at least 18"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn unknown_section_is_a_validation_error() {
        let err = EngineError::UnknownDeductionSection(vec!["80Z".to_string()]);
        assert!(err.is_validation());
        assert_eq!(err.violations()[0].field, "investments.80Z");
    }

    #[test]
    fn rule_set_unavailable_is_not_validation() {
        let err: EngineError = RuleSetUnavailable::NotFound(FiscalYear::from("T9")).into();
        assert!(!err.is_validation());
        assert_eq!(err.to_string(), "no rule set published for fiscal year T9");
    }
}
