//! Judge configuration.

use std::ops::RangeInclusive;

use crate::harness::identifiers::{MAX_IDENTIFIER_LEN, MIN_IDENTIFIER_LEN};
use crate::sandbox::SandboxConfig;

/// Everything a [`crate::Judge`] needs to know besides its collaborators
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JudgeConfig {
    /// Limits for each sandboxed run
    pub sandbox: SandboxConfig,
    /// Length range for generated harness identifiers
    pub identifier_len: RangeInclusive<usize>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxConfig::default(),
            identifier_len: MIN_IDENTIFIER_LEN..=MAX_IDENTIFIER_LEN,
        }
    }
}

impl JudgeConfig {
    /// Override the wall-clock budget
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.sandbox.timeout_ms = timeout_ms;
        self
    }

    /// Override the heap limit, in mebibytes
    #[must_use]
    pub const fn with_max_heap_mb(mut self, megabytes: usize) -> Self {
        self.sandbox.max_heap_bytes = megabytes.saturating_mul(1024 * 1024);
        self
    }
}
