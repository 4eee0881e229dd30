//! The judging entry point.
//!
//! A [`Judge`] holds only configuration and its two collaborators. Every
//! call to [`Judge::judge`] draws fresh identifiers, assembles a fresh
//! program and runs it in a fresh sandbox, so nothing carries over between
//! submissions.

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::JudgeConfig;
use crate::frontend::{FrontEnd, FrontEndError, Unconfigured};
use crate::harness::{assemble, HarnessIdentifiers, IdentifierGenerator};
use crate::report;
use crate::sandbox::{Sandbox, V8Sandbox};
use crate::types::{validate_assertions, Assertion, ExecutionResult, RequestError};

/// One submission to judge
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JudgeRequest {
    /// Submitted source text
    pub source: String,
    /// Assertions to run, in reporting order
    pub assertions: Vec<Assertion>,
    /// Skip the front-end compiler and run `source` as JavaScript
    pub use_raw_source: bool,
}

impl JudgeRequest {
    /// Request for plain JavaScript
    #[must_use]
    pub fn raw(source: impl Into<String>, assertions: Vec<Assertion>) -> Self {
        Self {
            source: source.into(),
            assertions,
            use_raw_source: true,
        }
    }
}

/// Reasons a request could not be judged at all
#[derive(Debug, Error)]
pub enum JudgeError {
    /// The request itself is malformed
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The front-end compiler failed
    #[error(transparent)]
    FrontEnd(#[from] FrontEndError),
}

/// Runs submissions against assertions
pub struct Judge {
    config: JudgeConfig,
    sandbox: Box<dyn Sandbox>,
    front_end: Box<dyn FrontEnd>,
}

impl Judge {
    /// Create a judge with a V8 sandbox and no front-end compiler
    #[must_use]
    pub fn new(config: JudgeConfig) -> Self {
        Self {
            sandbox: Box::new(V8Sandbox::with_config(config.sandbox.clone())),
            front_end: Box::new(Unconfigured),
            config,
        }
    }

    /// Use `front_end` for requests that are not raw JavaScript
    #[must_use]
    pub fn with_front_end(mut self, front_end: Box<dyn FrontEnd>) -> Self {
        self.front_end = front_end;
        self
    }

    /// Replace the sandbox
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: Box<dyn Sandbox>) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Judge one submission.
    ///
    /// Anything the submission does, including failing to compile, throwing,
    /// hanging or tampering, ends up in the returned [`ExecutionResult`].
    ///
    /// # Errors
    /// Returns [`JudgeError`] when the assertions are invalid or the
    /// front-end compiler itself fails.
    pub fn judge(&self, request: &JudgeRequest) -> Result<ExecutionResult, JudgeError> {
        validate_assertions(&request.assertions)?;

        info!(
            assertions = request.assertions.len(),
            source_sha256 = %fingerprint(&request.source),
            use_raw_source = request.use_raw_source,
            "judging submission"
        );

        let compiled;
        let code = if request.use_raw_source {
            request.source.as_str()
        } else {
            compiled = self.front_end.compile(&request.source).map_err(|e| {
                warn!(front_end = self.front_end.name(), error = %e, "front-end compilation failed");
                e
            })?;
            if !compiled.is_ok() {
                debug!(
                    diagnostics = compiled.compilation_errors.len(),
                    "submission rejected by front end"
                );
                return Ok(report::compilation_failed(compiled.compilation_errors));
            }
            compiled.compiled_code.as_str()
        };

        let mut generator = IdentifierGenerator::new();
        let identifiers = HarnessIdentifiers::generate(&mut generator, &self.config.identifier_len);
        let program = assemble(code, &request.assertions, identifiers);
        debug!(
            program_bytes = program.text().len(),
            user_lines = program.source_map().user_lines(),
            "program assembled"
        );

        let run = self.sandbox.run(&program);
        let stats = self.sandbox.last_execution_stats();
        debug!(
            duration_ms = stats.duration_ms,
            success = stats.success,
            "submission executed"
        );

        Ok(report::report(&program, &request.assertions, run))
    }
}

impl Default for Judge {
    fn default() -> Self {
        Self::new(JudgeConfig::default())
    }
}

/// Hex SHA-256 of the submission, for correlating logs without the source
fn fingerprint(source: &str) -> String {
    hex::encode(Sha256::digest(source.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{Compilation, Passthrough};
    use crate::harness::INTERNAL_ERROR_MESSAGE;
    use crate::sandbox::{ExecutionStats, SandboxFailure};
    use crate::types::Diagnostic;

    const MAX: &str = "function max(a,b){return a>b?a:b}";

    fn max_assertions() -> Vec<Assertion> {
        vec![
            Assertion::new(1, "assert.strictEqual(max(1,2),2)", true),
            Assertion::new(2, "assert.strictEqual(max(1,2),1)", true),
        ]
    }

    fn judge(source: &str, assertions: Vec<Assertion>) -> ExecutionResult {
        Judge::default()
            .judge(&JudgeRequest::raw(source, assertions))
            .unwrap()
    }

    struct Rejecting;

    impl FrontEnd for Rejecting {
        fn compile(&self, _source: &str) -> Result<Compilation, FrontEndError> {
            Ok(Compilation {
                compiled_code: String::new(),
                compilation_errors: vec![Diagnostic {
                    message: "Type 'string' is not assignable to type 'number'.".to_string(),
                    line: Some(1),
                    column: Some(5),
                }],
            })
        }

        fn name(&self) -> &'static str {
            "rejecting"
        }
    }

    #[test]
    fn test_max_example() {
        let ExecutionResult::Tests(tests) = judge(MAX, max_assertions()) else {
            panic!("expected tests");
        };
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].id, 1);
        assert!(tests[0].passed);
        assert_eq!(tests[1].id, 2);
        assert!(!tests[1].passed);
        let error = tests[1].error.as_deref().unwrap();
        assert!(error.contains("expected value 1, but got 2"), "{error}");
    }

    #[test]
    fn test_infinite_loop_example() {
        let config = JudgeConfig::default().with_timeout_ms(300);
        let result = Judge::new(config)
            .judge(&JudgeRequest::raw("while(true){}", vec![Assertion::new(1, "assert.ok(true)", true)]))
            .unwrap();
        let ExecutionResult::Error(message) = &result else {
            panic!("expected error, got {result:?}");
        };
        assert!(message.starts_with("Script execution timed out"));
        assert!(!message.contains("line"));
        assert!(!message.contains("column"));
    }

    #[test]
    fn test_redefined_assert_does_not_change_outcomes() {
        let source = format!(
            "{MAX}\nvar assert = {{ strictEqual() {{}}, ok() {{}} }};\nglobalThis.assert = assert;\nObject.prototype.strictEqual = function () {{}};"
        );
        assert_eq!(
            judge(&source, max_assertions()).passed_count(),
            judge(MAX, max_assertions()).passed_count()
        );
        let ExecutionResult::Tests(tests) = judge(&source, max_assertions()) else {
            panic!("expected tests");
        };
        assert!(tests[0].passed);
        assert!(!tests[1].passed);
    }

    #[test]
    fn test_judging_is_idempotent() {
        let first = judge(MAX, max_assertions());
        let second = judge(MAX, max_assertions());
        assert_eq!(first, second);
    }

    #[test]
    fn test_top_level_throw_escalates() {
        let result = judge(
            "let a = 1;\nthrow new Error('nope');",
            vec![Assertion::new(1, "assert.ok(true)", true)],
        );
        let ExecutionResult::Error(message) = &result else {
            panic!("expected error, got {result:?}");
        };
        assert!(message.starts_with("Error: nope (line 2, column "), "{message}");
    }

    #[test]
    fn test_throw_inside_assertion_is_local() {
        let ExecutionResult::Tests(tests) = judge(
            "function boom() { throw new RangeError('too far'); }",
            vec![
                Assertion::new(1, "boom()", true),
                Assertion::new(2, "assert.ok(true)", true),
            ],
        ) else {
            panic!("expected tests");
        };
        assert!(!tests[0].passed);
        assert!(tests[0]
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("RangeError: too far (line 1, column")));
        assert!(tests[1].passed);
    }

    #[test]
    fn test_patched_builtins_do_not_reach_records() {
        let source = format!(
            "{MAX}\nArray.prototype.push = function () {{ Object.freeze(this); }};\n\
             Object.defineProperty(Object.prototype, 'passed', {{ set() {{}}, configurable: true }});"
        );
        let ExecutionResult::Tests(tests) = judge(&source, max_assertions()) else {
            panic!("expected tests");
        };
        assert!(tests[0].passed);
        assert!(!tests[1].passed);
    }

    #[test]
    fn test_dangling_with_cannot_capture_harness() {
        let source = "const leaked = [];\n\
                      function max(a,b){\n\
                        for (const name of leaked) {\n\
                          try { const v = (0, eval)(name); if (Array.isArray(v)) for (const r of v) r.passed = true; } catch (_) {}\n\
                        }\n\
                        return a>b?a:b\n\
                      }\n\
                      with (new Proxy({}, {has(t,k){ leaked.push(k); return false; }}))";
        let assertions = vec![
            Assertion::new(1, "assert.strictEqual(max(1,2),1)", true),
            Assertion::new(2, "assert.strictEqual(max(1,2),2)", true),
            Assertion::new(3, "assert.deepStrictEqual(leaked, [])", true),
        ];
        let ExecutionResult::Tests(tests) = judge(source, assertions) else {
            panic!("expected tests");
        };
        assert!(!tests[0].passed);
        assert!(tests[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("expected value 1, but got 2")));
        assert!(tests[1].passed);
        assert!(tests[2].passed, "{:?}", tests[2].error);
    }

    struct TamperedSandbox;

    impl Sandbox for TamperedSandbox {
        fn run(&self, _program: &crate::harness::Program) -> Result<Vec<crate::harness::RawRecord>, SandboxFailure> {
            Err(SandboxFailure::Tampered)
        }

        fn timeout_ms(&self) -> u64 {
            0
        }

        fn last_execution_stats(&self) -> ExecutionStats {
            ExecutionStats::default()
        }
    }

    #[test]
    fn test_tamper_reports_internal_error_only() {
        let judge = Judge::default().with_sandbox(Box::new(TamperedSandbox));
        let result = judge.judge(&JudgeRequest::raw(MAX, max_assertions())).unwrap();
        assert_eq!(result, ExecutionResult::Error(INTERNAL_ERROR_MESSAGE.to_string()));
        assert_eq!(result.passed_count(), 0);
    }

    #[test]
    fn test_empty_assertions() {
        assert_eq!(judge(MAX, Vec::new()), ExecutionResult::Tests(Vec::new()));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let assertions = vec![
            Assertion::new(7, "assert.ok(true)", true),
            Assertion::new(7, "assert.ok(true)", false),
        ];
        assert!(matches!(
            Judge::default().judge(&JudgeRequest::raw(MAX, assertions)),
            Err(JudgeError::Request(RequestError::DuplicateId(7)))
        ));
    }

    #[test]
    fn test_compile_errors_skip_execution() {
        let judge = Judge::default().with_front_end(Box::new(Rejecting));
        let request = JudgeRequest {
            use_raw_source: false,
            ..JudgeRequest::raw("let a: number = 'x';", max_assertions())
        };
        let result = judge.judge(&request).unwrap();
        assert!(matches!(result, ExecutionResult::CompilationErrors(ref d) if d.len() == 1));
        assert_eq!(result.passed_count(), 0);
    }

    #[test]
    fn test_missing_front_end_is_error() {
        let request = JudgeRequest {
            use_raw_source: false,
            ..JudgeRequest::raw(MAX, max_assertions())
        };
        assert!(matches!(
            Judge::default().judge(&request),
            Err(JudgeError::FrontEnd(FrontEndError::NotConfigured))
        ));
    }

    #[test]
    fn test_passthrough_front_end_runs_compiled_code() {
        let judge = Judge::default().with_front_end(Box::new(Passthrough));
        let request = JudgeRequest {
            use_raw_source: false,
            ..JudgeRequest::raw(MAX, max_assertions())
        };
        assert_eq!(judge.judge(&request).unwrap().passed_count(), 1);
    }

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let print = fingerprint(MAX);
        assert_eq!(print.len(), 64);
        assert_eq!(print, fingerprint(MAX));
        assert_ne!(print, fingerprint("function max() {}"));
    }
}
