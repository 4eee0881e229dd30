//! Unpredictable names for harness-owned state.
//!
//! Every binding the harness places next to user code is named here, after
//! the user code is fixed. Names are drawn from a ChaCha20 stream seeded from
//! OS entropy and their length varies per name, so neither the name nor its
//! length can be hardcoded or pre-declared by a submission.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Shortest length handed out by [`HarnessIdentifiers::generate`]
pub const MIN_IDENTIFIER_LEN: usize = 24;
/// Longest length handed out by [`HarnessIdentifiers::generate`]
pub const MAX_IDENTIFIER_LEN: usize = 40;

/// Requests below this length are raised to it
const FLOOR_LEN: usize = 20;

const LEADING: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_";
const TRAILING: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_";

/// Generates source-safe identifiers that never repeat
pub struct IdentifierGenerator {
    rng: ChaCha20Rng,
    issued: HashSet<String>,
}

impl IdentifierGenerator {
    /// Create a generator seeded from OS entropy
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: ChaCha20Rng::from_entropy(),
            issued: HashSet::new(),
        }
    }

    /// Create with a specific seed (for testing)
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            issued: HashSet::new(),
        }
    }

    /// Generate an identifier of exactly `length` characters (at least 20).
    ///
    /// The first character is a letter or underscore, the rest letters,
    /// digits or underscores.
    pub fn generate(&mut self, length: usize) -> String {
        let length = length.max(FLOOR_LEN);
        loop {
            let candidate = self.draw(length);
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    /// Generate an identifier whose length is itself drawn from `lengths`
    pub fn generate_in(&mut self, lengths: RangeInclusive<usize>) -> String {
        let (lo, hi) = (*lengths.start(), *lengths.end());
        let length = if lo >= hi {
            lo
        } else {
            self.rng.gen_range(lo..=hi)
        };
        self.generate(length)
    }

    /// Number of identifiers issued so far
    #[must_use]
    pub fn issued(&self) -> usize {
        self.issued.len()
    }

    fn draw(&mut self, length: usize) -> String {
        let mut name = String::with_capacity(length);
        name.push(char::from(LEADING[self.rng.gen_range(0..LEADING.len())]));
        for _ in 1..length {
            name.push(char::from(TRAILING[self.rng.gen_range(0..TRAILING.len())]));
        }
        name
    }
}

impl Default for IdentifierGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Names of every harness-owned binding for one invocation
#[derive(Clone, Debug)]
pub struct HarnessIdentifiers {
    /// Output container collecting outcome records
    pub output: String,
    /// Per-assertion scratch record
    pub record: String,
    /// Binding of the caught exception in each fragment
    pub caught: String,
    /// Assertion library entry point
    pub assert_alias: String,
    /// Assertion-failure marker type
    pub marker: String,
    /// Error capture helper
    pub capture: String,
    /// Intrinsics captured before user code runs
    pub intrinsics: String,
    /// One-shot global used to hand capabilities to the program header
    pub handoff: String,
    /// Single-use claim on the session that owns the output container
    pub session: String,
    /// Message carried by the tamper-check error
    pub tamper_token: String,
}

impl HarnessIdentifiers {
    /// Draw a fresh, mutually distinct set of names
    pub fn generate(generator: &mut IdentifierGenerator, lengths: &RangeInclusive<usize>) -> Self {
        let mut next = || generator.generate_in(lengths.clone());
        Self {
            output: next(),
            record: next(),
            caught: next(),
            assert_alias: next(),
            marker: next(),
            capture: next(),
            intrinsics: next(),
            handoff: next(),
            session: next(),
            tamper_token: next(),
        }
    }

    /// Every generated name, for redaction
    #[must_use]
    pub fn all(&self) -> [&str; 10] {
        [
            &self.output,
            &self.record,
            &self.caught,
            &self.assert_alias,
            &self.marker,
            &self.capture,
            &self.intrinsics,
            &self.handoff,
            &self.session,
            &self.tamper_token,
        ]
    }
}
