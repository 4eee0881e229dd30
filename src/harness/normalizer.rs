//! Error normalization.
//!
//! Turns whatever the interpreter or the assertion library threw into a
//! short, user-facing message. Output never contains script names, harness
//! identifiers, or any stack frame beyond the first; positions are reported
//! in user-code coordinates or not at all. Every function here is total:
//! malformed input degrades to [`GENERIC_ERROR_MESSAGE`].

use super::fragment::{CapturedAssertion, CapturedFailure};
use super::identifiers::HarnessIdentifiers;
use super::prelude::PRELUDE_SCRIPT;
use super::program::{SourceMap, PROGRAM_SCRIPT};

/// Fallback when nothing usable could be extracted
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred while running the code";

/// Reported when the harness's own bookkeeping was interfered with
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal error";

/// Reported when the isolate ran out of heap
pub const MEMORY_ERROR_MESSAGE: &str = "Script execution exceeded the memory limit";

const MAX_MESSAGE_CHARS: usize = 2000;
const REDACTED: &str = "<internal>";

/// One parsed stack frame
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackFrame {
    /// Script the frame belongs to
    pub file: String,
    /// 1-based line
    pub line: i64,
    /// 1-based column
    pub column: i64,
}

/// An exception reduced to the parts normalization looks at
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawError {
    /// Constructor name, e.g. `TypeError`
    pub name: Option<String>,
    /// Top-level message
    pub message: Option<String>,
    /// First stack frame, if any
    pub frame: Option<StackFrame>,
}

impl RawError {
    /// Build from the pieces captured inside the sandbox
    #[must_use]
    pub fn from_parts(name: Option<&str>, message: Option<&str>, stack: Option<&str>) -> Self {
        Self {
            name: name.map(str::to_string),
            message: message.map(str::to_string),
            frame: stack.and_then(first_frame),
        }
    }
}

/// Parse the first `    at ...` line of a V8 stack trace.
#[must_use]
pub fn first_frame(stack: &str) -> Option<StackFrame> {
    let line = stack
        .lines()
        .map(str::trim_start)
        .find(|l| l.starts_with("at "))?;
    let location = line.strip_prefix("at ")?;
    let location = match (location.rfind('('), location.ends_with(')')) {
        (Some(open), true) => &location[open + 1..location.len() - 1],
        _ => location,
    };

    let mut parts = location.rsplitn(3, ':');
    let column = parts.next()?.parse().ok()?;
    let line = parts.next()?.parse().ok()?;
    let file = parts.next()?.to_string();
    Some(StackFrame { file, line, column })
}

/// Per-program normalizer
pub struct ErrorNormalizer<'a> {
    source_map: &'a SourceMap,
    redactions: Vec<&'a str>,
}

impl<'a> ErrorNormalizer<'a> {
    /// Create a normalizer for a program's source map and names
    #[must_use]
    pub fn new(source_map: &'a SourceMap, identifiers: &'a HarnessIdentifiers) -> Self {
        let mut redactions: Vec<&str> = identifiers.all().to_vec();
        redactions.push(PROGRAM_SCRIPT);
        redactions.push(PRELUDE_SCRIPT);
        Self {
            source_map,
            redactions,
        }
    }

    /// Normalize a generic exception: `Name: message`, plus the user-code
    /// position of the first frame when that frame is inside user code.
    #[must_use]
    pub fn normalize(&self, error: &RawError) -> String {
        let name = error.name.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let message = error
            .message
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let headline = match (name, message) {
            (Some(name), Some(message)) => format!("{name}: {message}"),
            (None, Some(message)) => message.to_string(),
            (Some(name), None) => name.to_string(),
            (None, None) => return GENERIC_ERROR_MESSAGE.to_string(),
        };
        let mut text = self.sanitize(&headline);

        if let Some((line, column)) = error.frame.as_ref().and_then(|f| self.locate(f)) {
            text.push_str(&format!(" (line {line}, column {column})"));
        }
        text
    }

    /// Normalize a failed comparison:
    /// `<message> expected value <expected>, but got <actual>`.
    #[must_use]
    pub fn normalize_assertion_failure(&self, failure: &CapturedAssertion) -> String {
        let message = failure
            .message
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Assertion failed.");

        let text = match (failure.expected.as_deref(), failure.actual.as_deref()) {
            (Some(expected), Some(actual)) => {
                format!("{message} expected value {expected}, but got {actual}")
            }
            _ => message.to_string(),
        };
        self.sanitize(&text)
    }

    /// Normalize a failure recorded by an assertion fragment
    #[must_use]
    pub fn normalize_captured(&self, failure: &CapturedFailure) -> String {
        match failure {
            CapturedFailure::Assertion(assertion) => self.normalize_assertion_failure(assertion),
            CapturedFailure::Thrown {
                name,
                message,
                stack,
            } => self.normalize(&RawError::from_parts(
                name.as_deref(),
                message.as_deref(),
                stack.as_deref(),
            )),
            CapturedFailure::Opaque => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    /// Message for an exhausted time budget; carries no location
    #[must_use]
    pub fn normalize_timeout(timeout_ms: u64) -> String {
        format!("Script execution timed out after {timeout_ms}ms")
    }

    fn locate(&self, frame: &StackFrame) -> Option<(u32, u32)> {
        if frame.file != PROGRAM_SCRIPT {
            return None;
        }
        self.source_map.to_user(frame.line, frame.column)
    }

    fn sanitize(&self, text: &str) -> String {
        let mut clean = text.to_string();
        for name in &self.redactions {
            if clean.contains(name) {
                clean = clean.replace(name, REDACTED);
            }
        }
        if clean.chars().count() > MAX_MESSAGE_CHARS {
            clean = clean.chars().take(MAX_MESSAGE_CHARS).collect();
            clean.push('…');
        }
        if clean.trim().is_empty() {
            return GENERIC_ERROR_MESSAGE.to_string();
        }
        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::program::{assemble, tests::fixed_identifiers};

    fn with_normalizer<T>(user_code: &str, f: impl FnOnce(&ErrorNormalizer<'_>) -> T) -> T {
        let program = assemble(user_code, &[], fixed_identifiers());
        let normalizer = ErrorNormalizer::new(program.source_map(), program.identifiers());
        f(&normalizer)
    }

    #[test]
    fn test_first_frame_parsing() {
        let stack = "TypeError: x is not a function\n    at max (jsjudge-program.js:4:11)\n    at jsjudge-program.js:9:3";
        assert_eq!(
            first_frame(stack),
            Some(StackFrame {
                file: PROGRAM_SCRIPT.to_string(),
                line: 4,
                column: 11
            })
        );
        assert_eq!(
            first_frame("Error\n    at jsjudge-program.js:2:1").map(|f| f.line),
            Some(2)
        );
        assert_eq!(first_frame("Error: no frames"), None);
        assert_eq!(first_frame("Error\n    at <anonymous>"), None);
    }

    #[test]
    fn test_location_is_user_relative() {
        with_normalizer("function max(a, b) {\n  return a.b.c;\n}", |n| {
            let raw = RawError {
                name: Some("TypeError".to_string()),
                message: Some("Cannot read properties of undefined (reading 'c')".to_string()),
                frame: Some(StackFrame {
                    file: PROGRAM_SCRIPT.to_string(),
                    line: 3,
                    column: 14,
                }),
            };
            assert_eq!(
                n.normalize(&raw),
                "TypeError: Cannot read properties of undefined (reading 'c') (line 2, column 14)"
            );
        });
    }

    #[test]
    fn test_frames_outside_user_code_have_no_location() {
        with_normalizer("let a = 1;", |n| {
            for (file, line) in [(PROGRAM_SCRIPT, 1), (PROGRAM_SCRIPT, 40), (PRELUDE_SCRIPT, 2)] {
                let raw = RawError {
                    name: Some("Error".to_string()),
                    message: Some("boom".to_string()),
                    frame: Some(StackFrame {
                        file: file.to_string(),
                        line,
                        column: 1,
                    }),
                };
                assert_eq!(n.normalize(&raw), "Error: boom");
            }
        });
    }

    #[test]
    fn test_identifiers_and_script_names_redacted() {
        let ids = fixed_identifiers();
        with_normalizer("", |n| {
            let raw = RawError {
                name: Some("ReferenceError".to_string()),
                message: Some(format!("{} is not defined in {PROGRAM_SCRIPT}", ids.output)),
                frame: None,
            };
            let text = n.normalize(&raw);
            assert!(!text.contains(&ids.output));
            assert!(!text.contains(PROGRAM_SCRIPT));
            assert_eq!(text, "ReferenceError: <internal> is not defined in <internal>");
        });
    }

    #[test]
    fn test_assertion_failure_format() {
        with_normalizer("", |n| {
            let failure = CapturedAssertion {
                message: Some("Expected values to be strictly equal.".to_string()),
                expected: Some("1".to_string()),
                actual: Some("2".to_string()),
            };
            assert_eq!(
                n.normalize_assertion_failure(&failure),
                "Expected values to be strictly equal. expected value 1, but got 2"
            );

            let object = CapturedAssertion {
                message: None,
                expected: Some(r#"{"a":[1,2]}"#.to_string()),
                actual: Some(r#"{"a":[1]}"#.to_string()),
            };
            assert_eq!(
                n.normalize_assertion_failure(&object),
                r#"Assertion failed. expected value {"a":[1,2]}, but got {"a":[1]}"#
            );

            let bare = CapturedAssertion {
                message: Some("Failed".to_string()),
                ..CapturedAssertion::default()
            };
            assert_eq!(n.normalize_assertion_failure(&bare), "Failed");
        });
    }

    #[test]
    fn test_degrades_to_generic_message() {
        with_normalizer("", |n| {
            assert_eq!(n.normalize(&RawError::default()), GENERIC_ERROR_MESSAGE);
            assert_eq!(
                n.normalize_captured(&CapturedFailure::Opaque),
                GENERIC_ERROR_MESSAGE
            );
            let blank = RawError {
                message: Some("   ".to_string()),
                ..RawError::default()
            };
            assert_eq!(n.normalize(&blank), GENERIC_ERROR_MESSAGE);
        });
    }

    #[test]
    fn test_thrown_primitive_and_long_messages() {
        with_normalizer("", |n| {
            let captured = CapturedFailure::Thrown {
                name: None,
                message: Some("plain string".to_string()),
                stack: None,
            };
            assert_eq!(n.normalize_captured(&captured), "plain string");

            let long = RawError {
                message: Some("x".repeat(5000)),
                ..RawError::default()
            };
            assert_eq!(n.normalize(&long).chars().count(), MAX_MESSAGE_CHARS + 1);
        });
    }

    #[test]
    fn test_timeout_message_has_no_location() {
        let text = ErrorNormalizer::normalize_timeout(1000);
        assert_eq!(text, "Script execution timed out after 1000ms");
        assert!(!text.contains("line"));
    }
}
