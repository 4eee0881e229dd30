//! Core data types for judging requests and their results.

mod assertion;
mod outcome;

pub use assertion::{validate_assertions, Assertion, RequestError};
pub use outcome::{Diagnostic, ExecutionResult, PublicDetails, TestOutcome};
