//! Judging results.

use serde::{Deserialize, Serialize};

use super::Assertion;

/// A front-end compilation diagnostic
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Human-readable description
    #[serde(alias = "messageText")]
    pub message: String,
    /// 1-based line in the submitted source, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based column in the submitted source, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Diagnostic {
    /// Diagnostic without a location
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
        }
    }
}

/// Outcome of one assertion
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Id of the assertion
    pub id: i64,
    /// Assertion source as supplied
    pub assertion: String,
    /// Visibility flag as supplied
    pub is_public: bool,
    /// Whether the assertion completed without throwing
    pub passed: bool,
    /// Sanitized failure message, present iff `passed` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestOutcome {
    /// A passing outcome for `assertion`
    #[must_use]
    pub fn passed(assertion: &Assertion) -> Self {
        Self {
            id: assertion.id,
            assertion: assertion.expression.clone(),
            is_public: assertion.is_public,
            passed: true,
            error: None,
        }
    }

    /// A failing outcome for `assertion`
    #[must_use]
    pub fn failed(assertion: &Assertion, error: String) -> Self {
        Self {
            id: assertion.id,
            assertion: assertion.expression.clone(),
            is_public: assertion.is_public,
            passed: false,
            error: Some(error),
        }
    }
}

/// The single structured result of a judging invocation.
///
/// Serializes externally tagged, so exactly one of `compilation_errors`,
/// `error` or `tests` is present.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionResult {
    /// Front-end compilation failed; nothing was executed
    CompilationErrors(Vec<Diagnostic>),
    /// The run as a whole failed (top-level throw, timeout, tampering)
    Error(String),
    /// Per-assertion outcomes in input order
    Tests(Vec<TestOutcome>),
}

impl ExecutionResult {
    /// Number of passing assertions; zero unless the run completed
    #[must_use]
    pub fn passed_count(&self) -> usize {
        match self {
            Self::Tests(tests) => tests.iter().filter(|t| t.passed).count(),
            _ => 0,
        }
    }

    /// Number of assertions out of `total` that did not pass
    #[must_use]
    pub fn failed_count(&self, total: usize) -> usize {
        total.saturating_sub(self.passed_count())
    }

    /// Whether enough assertions passed for the submission to be turned in
    #[must_use]
    pub fn is_eligible(&self, min_passing: usize) -> bool {
        self.passed_count() >= min_passing
    }

    /// The subset of this result that may be shown to the submitter
    #[must_use]
    pub fn public_view(&self) -> PublicDetails {
        match self {
            Self::Tests(tests) => PublicDetails::Tests {
                tests: tests.iter().filter(|t| t.is_public).cloned().collect(),
                failed_secret_tests: tests.iter().filter(|t| !t.is_public && !t.passed).count(),
            },
            other => PublicDetails::Unchanged(other.clone()),
        }
    }
}

/// Submitter-facing details: public outcomes plus a count of failed secret ones
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PublicDetails {
    /// Outcomes of a completed run
    Tests {
        /// Public outcomes only
        tests: Vec<TestOutcome>,
        /// Number of non-public assertions that failed
        failed_secret_tests: usize,
    },
    /// Compile-error and whole-run error results carry nothing secret
    Unchanged(ExecutionResult),
}
