//! The capability set handed to each program.
//!
//! The prelude script runs in the fresh context before the program. It
//! captures pristine intrinsics, builds the assertion library, and parks an
//! `open` function on a one-shot global named by the invocation. The program
//! header hands the output container to `open`, keeps the returned
//! single-use claim and deletes the global before user code runs. The
//! harness closure after user code claims the session, which holds the
//! container and every capability; any later claim yields `null`.

use super::identifiers::HarnessIdentifiers;
use super::program::js_string;

/// Script name the prelude is executed under
pub const PRELUDE_SCRIPT: &str = "jsjudge-prelude.js";

const PRELUDE_SOURCE: &str = include_str!("prelude.js");

/// An allow-listed binding made available to the program
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capability {
    /// The assertion library (`assert`)
    AssertLibrary,
    /// The assertion-failure marker type
    FailureMarker,
    /// Extracts plain data from thrown values
    ErrorCapture,
    /// Intrinsics captured before user code runs
    Intrinsics,
}

impl Capability {
    /// Every capability, in binding order
    pub const ALL: [Self; 4] = [
        Self::AssertLibrary,
        Self::FailureMarker,
        Self::ErrorCapture,
        Self::Intrinsics,
    ];

    /// Property name on the session object
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::AssertLibrary => "assert",
            Self::FailureMarker => "marker",
            Self::ErrorCapture => "capture",
            Self::Intrinsics => "intrinsics",
        }
    }

    /// Generated name the program binds this capability to
    #[must_use]
    pub fn binding(self, ids: &HarnessIdentifiers) -> &str {
        match self {
            Self::AssertLibrary => &ids.assert_alias,
            Self::FailureMarker => &ids.marker,
            Self::ErrorCapture => &ids.capture,
            Self::Intrinsics => &ids.intrinsics,
        }
    }
}

/// Render the prelude for one invocation
#[must_use]
pub fn render(ids: &HarnessIdentifiers) -> String {
    format!(
        "{}(globalThis, {});\n",
        PRELUDE_SOURCE.trim_end().trim_end_matches(';'),
        js_string(&ids.handoff)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::program::tests::fixed_identifiers;

    #[test]
    fn test_prelude_installs_under_handoff_name() {
        let ids = fixed_identifiers();
        let text = render(&ids);
        assert!(text.ends_with(&format!("(globalThis, \"{}\");\n", ids.handoff)));
        assert!(text.contains("container: container,"));
        for capability in Capability::ALL {
            assert!(text.contains(&format!("{}:", capability.key())));
        }
    }

    #[test]
    fn test_bindings_are_distinct() {
        let ids = fixed_identifiers();
        let names: std::collections::HashSet<_> =
            Capability::ALL.iter().map(|c| c.binding(&ids)).collect();
        assert_eq!(names.len(), Capability::ALL.len());
    }
}
