//! Result reporting.
//!
//! Folds the front-end diagnostics and the sandbox outcome into exactly one
//! [`ExecutionResult`]. Every message that leaves this module has been
//! through the [`ErrorNormalizer`].

use tracing::warn;

use crate::harness::{
    ErrorNormalizer, Program, RawRecord, GENERIC_ERROR_MESSAGE, INTERNAL_ERROR_MESSAGE,
    MEMORY_ERROR_MESSAGE,
};
use crate::sandbox::SandboxFailure;
use crate::types::{Assertion, Diagnostic, ExecutionResult, TestOutcome};

/// Result for a submission the front end rejected
#[must_use]
pub fn compilation_failed(diagnostics: Vec<Diagnostic>) -> ExecutionResult {
    ExecutionResult::CompilationErrors(diagnostics)
}

/// Result for a program that went through the sandbox
#[must_use]
pub fn report(
    program: &Program,
    assertions: &[Assertion],
    run: Result<Vec<RawRecord>, SandboxFailure>,
) -> ExecutionResult {
    let normalizer = ErrorNormalizer::new(program.source_map(), program.identifiers());
    match run {
        Ok(records) => tests(&normalizer, assertions, &records),
        Err(failure) => ExecutionResult::Error(describe_failure(&normalizer, &failure)),
    }
}

fn tests(
    normalizer: &ErrorNormalizer<'_>,
    assertions: &[Assertion],
    records: &[RawRecord],
) -> ExecutionResult {
    if records.len() != assertions.len() {
        warn!(
            expected = assertions.len(),
            got = records.len(),
            "outcome count mismatch"
        );
        return ExecutionResult::Error(GENERIC_ERROR_MESSAGE.to_string());
    }

    let mut outcomes = Vec::with_capacity(records.len());
    for (assertion, record) in assertions.iter().zip(records) {
        if record.id != assertion.id {
            warn!(expected = assertion.id, got = record.id, "outcome id mismatch");
            return ExecutionResult::Error(GENERIC_ERROR_MESSAGE.to_string());
        }
        outcomes.push(outcome(normalizer, assertion, record));
    }
    ExecutionResult::Tests(outcomes)
}

fn outcome(normalizer: &ErrorNormalizer<'_>, assertion: &Assertion, record: &RawRecord) -> TestOutcome {
    if record.passed == Some(true) {
        return TestOutcome::passed(assertion);
    }
    let message = record.failure.as_ref().map_or_else(
        || GENERIC_ERROR_MESSAGE.to_string(),
        |failure| normalizer.normalize_captured(failure),
    );
    TestOutcome::failed(assertion, message)
}

fn describe_failure(normalizer: &ErrorNormalizer<'_>, failure: &SandboxFailure) -> String {
    match failure {
        SandboxFailure::Timeout { timeout_ms } => {
            warn!(timeout_ms, "submission timed out");
            ErrorNormalizer::normalize_timeout(*timeout_ms)
        }
        SandboxFailure::Tampered => INTERNAL_ERROR_MESSAGE.to_string(),
        SandboxFailure::Thrown(raw) => normalizer.normalize(raw),
        SandboxFailure::HeapExhausted { limit_bytes } => {
            warn!(limit_bytes, "submission exhausted the heap");
            MEMORY_ERROR_MESSAGE.to_string()
        }
        SandboxFailure::MalformedOutput(reason) | SandboxFailure::Runtime(reason) => {
            warn!(%reason, "sandbox failed without a user-facing cause");
            GENERIC_ERROR_MESSAGE.to_string()
        }
    }
}
