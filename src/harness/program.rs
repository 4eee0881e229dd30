//! Program assembly.
//!
//! The runnable program is built as a sequence of [`Statement`] nodes and
//! rendered by [`render`], the only place that turns harness structure into
//! source text. Layout of the rendered program:
//!
//! ```text
//! line 1      header: output container handed to a single-use session claim
//! line 2..    user code, verbatim
//! ...         `;` closing whatever statement user code left open
//! ...         strict harness closure: claim the session, bind capabilities
//! ...         tamper check
//! ...         one block per assertion, in input order
//! last        return the output container and invoke the closure
//! ```
//!
//! Only the session claim lives at script scope, and it yields the session
//! exactly once. Everything else is a parameter or local of the strict
//! closure, so neither indirect `eval` nor `Function` can resolve it, and
//! `caller`/`arguments` of the closure are not observable from user code.

use std::fmt::Write as _;

use super::fragment::AssertionNode;
use super::identifiers::HarnessIdentifiers;
use super::prelude::{self, Capability};
use crate::types::Assertion;

/// Script name the program is executed under
pub const PROGRAM_SCRIPT: &str = "jsjudge-program.js";

/// Lines emitted before user code starts
pub const HEADER_LINES: usize = 1;

/// One node of the assembled program
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    /// Declare the output container and bind the session claim; exactly one line
    DeclareContainer,
    /// Submitted code, spliced verbatim
    UserCode(String),
    /// Empty statement closing a dangling `with`, `if`, loop head or label
    Barrier,
    /// Open the strict harness closure and bind capabilities from the session
    EnterHarness,
    /// Abort if the output container was made unmodifiable
    TamperCheck,
    /// One compiled assertion
    Assertion(AssertionNode),
    /// Evaluate to the output container and close the harness closure
    FinalExpression,
}

/// Where user code sits inside the program text
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceMap {
    first_line: usize,
    line_count: usize,
}

impl SourceMap {
    /// Map a 1-based program position into user-code coordinates.
    ///
    /// Returns `None` for positions outside the user-code region.
    #[must_use]
    pub fn to_user(&self, line: i64, column: i64) -> Option<(u32, u32)> {
        let line = usize::try_from(line).ok()?;
        if line < self.first_line || line >= self.first_line + self.line_count {
            return None;
        }
        let user_line = u32::try_from(line - HEADER_LINES).ok()?;
        let column = u32::try_from(column).ok().filter(|c| *c > 0)?;
        Some((user_line, column))
    }

    /// Number of lines occupied by user code
    #[must_use]
    pub const fn user_lines(&self) -> usize {
        self.line_count
    }
}

/// A fully assembled, per-invocation program
#[derive(Clone, Debug)]
pub struct Program {
    identifiers: HarnessIdentifiers,
    prelude: String,
    text: String,
    source_map: SourceMap,
    assertions: usize,
}

impl Program {
    /// Names used by this program
    #[must_use]
    pub const fn identifiers(&self) -> &HarnessIdentifiers {
        &self.identifiers
    }

    /// Script that installs the capability set; runs before [`Self::text`]
    #[must_use]
    pub fn prelude(&self) -> &str {
        &self.prelude
    }

    /// Program text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// User-code region of [`Self::text`]
    #[must_use]
    pub const fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    /// Number of assertion fragments
    #[must_use]
    pub const fn assertion_count(&self) -> usize {
        self.assertions
    }
}

/// Build the statement sequence for `user_code` and `assertions`
#[must_use]
pub fn statements(user_code: &str, assertions: &[Assertion]) -> Vec<Statement> {
    let mut nodes = Vec::with_capacity(assertions.len() + 6);
    nodes.push(Statement::DeclareContainer);
    nodes.push(Statement::UserCode(user_code.to_string()));
    nodes.push(Statement::Barrier);
    nodes.push(Statement::EnterHarness);
    nodes.push(Statement::TamperCheck);
    nodes.extend(
        assertions
            .iter()
            .map(|a| Statement::Assertion(AssertionNode::compile(a))),
    );
    nodes.push(Statement::FinalExpression);
    nodes
}

/// Assemble the program for one invocation
#[must_use]
pub fn assemble(
    user_code: &str,
    assertions: &[Assertion],
    identifiers: HarnessIdentifiers,
) -> Program {
    let nodes = statements(user_code, assertions);
    let (text, source_map) = render(&nodes, &identifiers);
    Program {
        prelude: prelude::render(&identifiers),
        identifiers,
        text,
        source_map,
        assertions: assertions.len(),
    }
}

/// Serialize statements into program text.
///
/// Every statement ends with a newline, so user code can never swallow the
/// statement after it with a trailing line comment.
#[must_use]
pub fn render(nodes: &[Statement], ids: &HarnessIdentifiers) -> (String, SourceMap) {
    let mut out = String::new();
    let mut line = 1;
    let mut source_map = SourceMap {
        first_line: HEADER_LINES + 1,
        line_count: 0,
    };

    for node in nodes {
        let start = out.len();
        match node {
            Statement::DeclareContainer => render_header(&mut out, ids),
            Statement::UserCode(code) => {
                source_map.first_line = line;
                out.push_str(code);
                out.push('\n');
            }
            Statement::Barrier => out.push_str(";\n"),
            Statement::EnterHarness => render_enter_harness(&mut out, ids),
            Statement::TamperCheck => render_tamper_check(&mut out, ids),
            Statement::Assertion(fragment) => fragment.render(&mut out, ids),
            Statement::FinalExpression => {
                let _ = writeln!(out, "return {};", ids.output);
                let _ = writeln!(out, "}})({}());", ids.session);
            }
        }
        let added = count_lines(&out[start..]);
        if let Statement::UserCode(_) = node {
            source_map.line_count = added;
        }
        line += added;
    }

    (out, source_map)
}

fn render_header(out: &mut String, ids: &HarnessIdentifiers) {
    let _ = writeln!(
        out,
        "const {session} = globalThis.{handoff}.open([]); delete globalThis.{handoff};",
        session = ids.session,
        handoff = ids.handoff
    );
}

/// The closure parameter shadows the script-scope claim, and a session that
/// was already claimed means user code got there first.
fn render_enter_harness(out: &mut String, ids: &HarnessIdentifiers) {
    let session = &ids.session;
    let _ = writeln!(out, "(function ({session}) {{");
    let _ = writeln!(out, "\"use strict\";");
    let _ = writeln!(
        out,
        "if ({session} === null) {{ throw {}; }}",
        js_string(&ids.tamper_token)
    );
    let _ = write!(out, "const {} = {session}.container", ids.output);
    for capability in Capability::ALL {
        let _ = write!(
            out,
            ", {} = {session}.{}",
            capability.binding(ids),
            capability.key()
        );
    }
    let _ = writeln!(out, ";");
}

fn render_tamper_check(out: &mut String, ids: &HarnessIdentifiers) {
    let i = &ids.intrinsics;
    let o = &ids.output;
    let _ = writeln!(
        out,
        "if ({i}.isFrozen({o}) || {i}.isSealed({o}) || !{i}.isExtensible({o})) {{ throw new {i}.Error({}); }}",
        js_string(&ids.tamper_token)
    );
}

/// Render `text` as a JavaScript string literal.
///
/// JSON string syntax is a subset of JavaScript string literal syntax, so the
/// result can be embedded anywhere an expression is expected.
#[must_use]
pub fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| String::from("\"\""))
}

/// Count lines the way a JavaScript engine numbers them: LF, CR, CRLF,
/// U+2028 and U+2029 each terminate a line.
#[must_use]
pub fn count_lines(text: &str) -> usize {
    let mut lines = 0;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' | '\u{2028}' | '\u{2029}' => lines += 1,
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                lines += 1;
            }
            _ => {}
        }
    }
    lines
}
