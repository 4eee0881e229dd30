//! The assertion harness: everything that happens between a submission and
//! the single program text handed to the sandbox, plus the way thrown values
//! are turned back into user-facing messages.
//!
//! ## Threat model
//!
//! Submitted code runs in the same script as the harness bookkeeping and is
//! adversarial by assumption. Defenses:
//! - every harness binding has a fresh, high-entropy name chosen after the
//!   submission is fixed ([`identifiers`])
//! - capabilities reach the program through a one-shot global that is
//!   deleted before user code starts ([`prelude`])
//! - user code is followed by an empty statement, so a dangling `with`,
//!   `if`, loop head or label cannot capture the harness code after it
//! - the output container and capabilities live only inside a strict
//!   closure entered after user code; the single script-scope binding is a
//!   claim that yields them once ([`program`])
//! - assertion records are written with captured intrinsics and null
//!   prototypes ([`fragment`])
//! - a frozen or sealed output container, or a session claimed before the
//!   harness, aborts the run ([`program`])

pub mod fragment;
pub mod identifiers;
pub mod normalizer;
pub mod prelude;
pub mod program;

pub use fragment::{AssertionNode, CapturedAssertion, CapturedFailure, RawRecord};
pub use identifiers::{HarnessIdentifiers, IdentifierGenerator};
pub use normalizer::{
    ErrorNormalizer, RawError, StackFrame, GENERIC_ERROR_MESSAGE, INTERNAL_ERROR_MESSAGE,
    MEMORY_ERROR_MESSAGE,
};
pub use prelude::{Capability, PRELUDE_SCRIPT};
pub use program::{assemble, Program, SourceMap, Statement, PROGRAM_SCRIPT};
