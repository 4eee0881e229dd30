//! Assertions supplied with a judging request.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A single executable check run against the submitted code
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    /// Identifier, unique within a request
    pub id: i64,
    /// JavaScript source of the check, e.g. `assert.strictEqual(max(1, 2), 2)`
    #[serde(rename = "assertion", alias = "expression")]
    pub expression: String,
    /// Whether the outcome may be shown to the submitter
    #[serde(default = "default_public")]
    pub is_public: bool,
}

const fn default_public() -> bool {
    true
}

impl Assertion {
    /// Create a new assertion
    #[must_use]
    pub fn new(id: i64, expression: impl Into<String>, is_public: bool) -> Self {
        Self {
            id,
            expression: expression.into(),
            is_public,
        }
    }
}

/// Problems with the request itself, outside the harness's control
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// Assertions payload is not valid JSON of the expected shape
    #[error("invalid assertions payload: {0}")]
    InvalidAssertions(#[from] serde_json::Error),
    /// Two assertions share an id
    #[error("duplicate assertion id {0}")]
    DuplicateId(i64),
}

/// Check that assertion ids are unique.
///
/// # Errors
/// Returns [`RequestError::DuplicateId`] for the first repeated id.
pub fn validate_assertions(assertions: &[Assertion]) -> Result<(), RequestError> {
    let mut seen = HashSet::with_capacity(assertions.len());
    for assertion in assertions {
        if !seen.insert(assertion.id) {
            return Err(RequestError::DuplicateId(assertion.id));
        }
    }
    Ok(())
}
