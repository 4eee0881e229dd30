//! Assertion compilation.
//!
//! Each assertion becomes one self-contained block: a scratch record, a
//! try/catch around the expression, and an append to the output container.
//! A throw inside one block is caught by that block, so later assertions
//! still run.

use std::fmt::Write as _;

use serde::Deserialize;

use super::identifiers::HarnessIdentifiers;
use super::program::js_string;
use crate::types::Assertion;

/// A compiled assertion, ready to render
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssertionNode {
    id: i64,
    is_public: bool,
    expression: String,
}

impl AssertionNode {
    /// Compile an assertion record
    #[must_use]
    pub fn compile(assertion: &Assertion) -> Self {
        Self {
            id: assertion.id,
            is_public: assertion.is_public,
            expression: assertion.expression.clone(),
        }
    }

    /// Assertion id
    #[must_use]
    pub const fn id(&self) -> i64 {
        self.id
    }

    /// Append this fragment to `out`.
    ///
    /// The expression runs inside a function whose only parameter is named
    /// `assert` and receives the harness library, so a user-level `assert`
    /// binding is shadowed. Records have a null prototype and are appended
    /// with a captured `defineProperty`, so prototype setters planted by user
    /// code never see them.
    pub fn render(&self, out: &mut String, ids: &HarnessIdentifiers) {
        let HarnessIdentifiers {
            output,
            record,
            caught,
            assert_alias,
            marker,
            capture,
            intrinsics,
            ..
        } = ids;

        let _ = writeln!(out, "{{");
        let _ = writeln!(
            out,
            "const {record} = {{ __proto__: null, id: {}, assertion: {}, is_public: {}, passed: null, failure: null }};",
            self.id,
            js_string(&self.expression),
            self.is_public
        );
        let _ = writeln!(out, "try {{");
        let _ = writeln!(out, "(function (assert) {{");
        out.push_str(&self.expression);
        out.push('\n');
        let _ = writeln!(out, "}})({assert_alias});");
        let _ = writeln!(out, "{record}.passed = true;");
        let _ = writeln!(out, "}} catch ({caught}) {{");
        let _ = writeln!(out, "{record}.passed = false;");
        let _ = writeln!(
            out,
            "{record}.failure = {caught} instanceof {marker} ? {capture}.assertion({caught}) : {capture}.error({caught});"
        );
        let _ = writeln!(out, "}}");
        let _ = writeln!(
            out,
            "{intrinsics}.defineProperty({output}, {output}.length, {{ __proto__: null, value: {record}, writable: true, enumerable: true, configurable: true }});"
        );
        let _ = writeln!(out, "}}");
    }
}

/// A scratch record as read back from the output container
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RawRecord {
    /// Assertion id written by the fragment
    pub id: i64,
    /// `None` if the fragment never reached completion
    pub passed: Option<bool>,
    /// What was thrown, as extracted by the capture helper
    pub failure: Option<CapturedFailure>,
}

/// Plain data extracted from a thrown value inside the sandbox
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapturedFailure {
    /// An instance of the harness assertion-failure type
    Assertion(CapturedAssertion),
    /// Anything else
    Thrown {
        /// `error.name`, if readable
        name: Option<String>,
        /// `error.message`, or the thrown primitive
        message: Option<String>,
        /// `error.stack`, if readable
        stack: Option<String>,
    },
    /// Reading the thrown value itself threw
    Opaque,
}

/// Details of a failed assertion-library call
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CapturedAssertion {
    /// Failure message
    pub message: Option<String>,
    /// Expected operand rendered as JSON
    pub expected: Option<String>,
    /// Actual operand rendered as JSON
    pub actual: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::program::tests::fixed_identifiers;
    use serde_json::json;

    fn rendered(expression: &str) -> String {
        let mut out = String::new();
        AssertionNode::compile(&Assertion::new(42, expression, false))
            .render(&mut out, &fixed_identifiers());
        out
    }

    #[test]
    fn test_fragment_uses_generated_names_only() {
        let ids = fixed_identifiers();
        let text = rendered("assert.strictEqual(f(), 1)");
        assert!(text.contains(&format!("}})({});", ids.assert_alias)));
        assert!(text.contains(&format!("instanceof {}", ids.marker)));
        assert!(text.contains(&format!("{}.defineProperty({},", ids.intrinsics, ids.output)));
        assert!(!text.contains("output"));
        assert!(text.contains("id: 42"));
        assert!(text.contains("is_public: false"));
    }

    #[test]
    fn test_expression_literal_is_escaped() {
        let text = rendered("assert.equal(s, \"a\\\"}; evil(); //\")");
        let record_line = text.lines().nth(1).unwrap_or_default();
        assert!(record_line.contains(r#"assertion: "assert.equal(s, \"a\\\"}; evil(); //\")""#));
        assert!(record_line.ends_with("failure: null };"));
    }

    #[test]
    fn test_expression_on_its_own_lines() {
        let text = rendered("assert.ok(x) // trailing comment");
        assert!(text.contains("(function (assert) {\nassert.ok(x) // trailing comment\n})("));
    }

    #[test]
    fn test_captured_failure_shapes() {
        let assertion: CapturedFailure = serde_json::from_value(json!({
            "kind": "assertion", "message": "m", "expected": "1", "actual": "2"
        }))
        .unwrap();
        assert_eq!(
            assertion,
            CapturedFailure::Assertion(CapturedAssertion {
                message: Some("m".to_string()),
                expected: Some("1".to_string()),
                actual: Some("2".to_string()),
            })
        );

        let opaque: CapturedFailure = serde_json::from_value(json!({"kind": "opaque"})).unwrap();
        assert_eq!(opaque, CapturedFailure::Opaque);

        let record: RawRecord = serde_json::from_value(json!({
            "id": 3, "passed": false,
            "failure": {"kind": "thrown", "name": null, "message": "x", "stack": null}
        }))
        .unwrap();
        assert_eq!(record.passed, Some(false));
        assert!(matches!(record.failure, Some(CapturedFailure::Thrown { .. })));
    }
}
