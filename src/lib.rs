//! # jsjudge
//!
//! A sandboxed assertion harness for judging untrusted JavaScript
//! submissions.
//!
//! ## Architecture
//!
//! A judging request flows through five stages:
//! - **Front end**: optionally lowers the submission to JavaScript and
//!   reports compilation diagnostics ([`frontend`])
//! - **Assembler**: splices the submission and one fragment per assertion
//!   into a single program under fresh, unguessable names ([`harness`])
//! - **Sandbox**: runs the program in a fresh V8 isolate with a wall-clock
//!   budget and a heap limit ([`sandbox`])
//! - **Normalizer**: reduces whatever was thrown to a short, user-facing
//!   message in user-code coordinates ([`harness::normalizer`])
//! - **Reporter**: folds everything into one [`ExecutionResult`] ([`report`])
//!
//! ## Security Model
//!
//! - Submissions get no file system, network, process or environment access
//! - Harness state lives in a strict closure entered after submitted code;
//!   script scope holds only a single-use claim on it
//! - Redefining `assert` cannot change any outcome
//! - Claiming the harness session early, or freezing or sealing the output
//!   container, aborts the run

#![forbid(unsafe_code)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms
)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod frontend;
pub mod harness;
pub mod judge;
pub mod report;
pub mod sandbox;
pub mod types;

pub use config::JudgeConfig;
pub use frontend::{Compilation, ExternalCompiler, FrontEnd, FrontEndError, Passthrough};
pub use judge::{Judge, JudgeError, JudgeRequest};
pub use sandbox::{Sandbox, SandboxConfig, SandboxFailure, V8Sandbox};
pub use types::{
    Assertion, Diagnostic, ExecutionResult, PublicDetails, RequestError, TestOutcome,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
