//! Front-end compilation boundary.
//!
//! Submissions may be written in a typed dialect that has to be lowered to
//! JavaScript before judging. The harness only depends on the contract:
//! source text in, compiled text plus diagnostics out.

mod external;

pub use external::ExternalCompiler;

use thiserror::Error;

use crate::types::Diagnostic;

/// Output of a front-end compiler
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Compilation {
    /// Compiled JavaScript; ignored when `compilation_errors` is non-empty
    pub compiled_code: String,
    /// Diagnostics that reject the source
    pub compilation_errors: Vec<Diagnostic>,
}

impl Compilation {
    /// Whether the source was accepted
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.compilation_errors.is_empty()
    }
}

/// Failures of the compiler itself, as opposed to diagnostics about the source
#[derive(Debug, Error)]
pub enum FrontEndError {
    /// The compiler could not be started or talked to
    #[error("failed to run compiler `{command}`: {reason}")]
    Spawn {
        /// Command that was run
        command: String,
        /// What went wrong
        reason: String,
    },

    /// The compiler did not finish in time
    #[error("compiler timed out after {0}ms")]
    Timeout(u64),

    /// The compiler output is not the expected JSON document
    #[error("compiler produced unreadable output: {0}")]
    InvalidOutput(String),

    /// No compiler is configured but compilation was requested
    #[error("no front-end compiler configured")]
    NotConfigured,
}

/// A source-to-source compiler in front of the harness
pub trait FrontEnd: Send + Sync {
    /// Compile `source` to JavaScript.
    ///
    /// # Errors
    /// Returns [`FrontEndError`] when the compiler itself fails; problems with
    /// the source are reported as diagnostics instead.
    fn compile(&self, source: &str) -> Result<Compilation, FrontEndError>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Front-end that accepts everything unchanged
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

impl FrontEnd for Passthrough {
    fn compile(&self, source: &str) -> Result<Compilation, FrontEndError> {
        Ok(Compilation {
            compiled_code: source.to_string(),
            compilation_errors: Vec::new(),
        })
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}

/// Placeholder used when no compiler was configured
#[derive(Clone, Copy, Debug, Default)]
pub struct Unconfigured;

impl FrontEnd for Unconfigured {
    fn compile(&self, _source: &str) -> Result<Compilation, FrontEndError> {
        Err(FrontEndError::NotConfigured)
    }

    fn name(&self) -> &'static str {
        "unconfigured"
    }
}
