//! Sandboxed execution of assembled programs.
//!
//! A sandbox runs one [`Program`] under a single wall-clock budget and hands
//! back either the raw outcome records or a categorized failure.

mod javascript;

pub use javascript::V8Sandbox;

use thiserror::Error;

use crate::harness::{Program, RawError, RawRecord};

/// Default wall-clock budget for prelude, user code and all assertions
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Default V8 heap limit
pub const DEFAULT_MAX_HEAP_BYTES: usize = 64 * 1024 * 1024;

/// Why a run did not produce outcome records
#[derive(Debug, Error)]
pub enum SandboxFailure {
    /// The wall-clock budget elapsed
    #[error("execution timeout exceeded ({timeout_ms}ms)")]
    Timeout {
        /// Budget that was exceeded
        timeout_ms: u64,
    },

    /// User code made the output container unmodifiable
    #[error("output container was tampered with")]
    Tampered,

    /// An exception escaped the program
    #[error("uncaught exception: {0:?}")]
    Thrown(RawError),

    /// The isolate approached its heap limit
    #[error("heap limit exceeded ({limit_bytes} bytes)")]
    HeapExhausted {
        /// Configured heap limit
        limit_bytes: usize,
    },

    /// The program completed but its value is not a valid outcome list
    #[error("malformed program output: {0}")]
    MalformedOutput(String),

    /// The host could not run the program at all
    #[error("sandbox runtime failure: {0}")]
    Runtime(String),
}

/// Configuration for sandboxed execution
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Wall-clock budget in milliseconds
    pub timeout_ms: u64,
    /// Maximum V8 heap size in bytes
    pub max_heap_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_heap_bytes: DEFAULT_MAX_HEAP_BYTES,
        }
    }
}

/// Statistics from the most recent run
#[derive(Clone, Debug, Default)]
pub struct ExecutionStats {
    /// Wall-clock time in milliseconds
    pub duration_ms: u64,
    /// Whether the run produced outcome records
    pub success: bool,
}

/// An isolated execution context factory.
///
/// Implementations must build a fresh context per call; nothing may carry
/// over from one run to the next.
pub trait Sandbox: Send + Sync {
    /// Run `program` and return its outcome records in fragment order.
    ///
    /// # Errors
    /// Returns a [`SandboxFailure`] describing why no records were produced.
    fn run(&self, program: &Program) -> Result<Vec<RawRecord>, SandboxFailure>;

    /// Budget this sandbox enforces, for reporting
    fn timeout_ms(&self) -> u64;

    /// Resource usage of the last run
    fn last_execution_stats(&self) -> ExecutionStats;
}
