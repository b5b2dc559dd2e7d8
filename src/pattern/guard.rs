//! Pre-execution screening of search patterns
//!
//! Cheap checks run first (emptiness, length), then a fixed battery of shape
//! heuristics for classic catastrophic-backtracking constructs, then a count
//! of quantifier characters. False positives and negatives are expected; the
//! executor's time budget is what actually bounds execution.

use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

use super::{CompiledPattern, PatternVerdict, SearchPattern};
use crate::app::PatternConfig;

/// Compiled-program size cap handed to the regex engine
const REGEX_SIZE_LIMIT: usize = 10 * (1 << 20);

/// Limits applied by the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardLimits {
    /// Maximum pattern length in characters
    pub max_len: usize,
    /// Maximum number of `*`, `+` and `?` characters
    pub max_quantifiers: usize,
}

impl Default for GuardLimits {
    fn default() -> Self {
        Self {
            max_len: 1000,
            max_quantifiers: 10,
        }
    }
}

impl From<&PatternConfig> for GuardLimits {
    fn from(config: &PatternConfig) -> Self {
        Self {
            max_len: config.max_pattern_len,
            max_quantifiers: config.max_quantifiers,
        }
    }
}

/// Shapes that commonly blow up a backtracking matcher
const SUSPICIOUS_SHAPES: &[(&str, &str)] = &[
    // (.*)*  (.+)+  (.*){2,}  (.*?)+
    (r"\(\.[*+]\??\)[*+{]", "repeated group around an unbounded wildcard"),
    // (a+)+  (\w*\s)*  (?:x+y)*  (.*?.*)+
    (r"\([^()]*[*+][^()]*\)[*+{]", "repeated group containing a quantifier"),
    // (a{1,})+  (\d{2,9})*
    (r"\([^()]*\{\d+,\d*\}[^()]*\)[*+{]", "repeated group containing a counted repetition"),
    // ((a)+)+  ((ab)*)*
    (r"\)[*+]\)[*+{]", "nested quantified groups"),
];

fn suspicious_shapes() -> &'static [(Regex, &'static str)] {
    static SHAPES: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    SHAPES.get_or_init(|| {
        SUSPICIOUS_SHAPES
            .iter()
            .map(|(shape, reason)| (Regex::new(shape).expect("Invalid shape regex"), *reason))
            .collect()
    })
}

/// Screens search patterns before they are allowed to run
#[derive(Debug, Clone, Default)]
pub struct PatternGuard {
    limits: GuardLimits,
}

impl PatternGuard {
    pub fn new(limits: GuardLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> GuardLimits {
        self.limits
    }

    /// Evaluate a pattern, compiling it if every check passes
    pub fn evaluate(&self, pattern: &SearchPattern) -> PatternVerdict {
        if pattern.source.trim().is_empty() {
            return PatternVerdict::RejectedEmpty;
        }

        let len = pattern.source.chars().count();
        if len > self.limits.max_len {
            return PatternVerdict::RejectedTooLong {
                len,
                max: self.limits.max_len,
            };
        }

        if let Some(reason) = self.suspicion(&pattern.source) {
            tracing::warn!(pattern = %pattern.source, reason = %reason, "Rejected search pattern");
            return PatternVerdict::RejectedSuspicious(reason);
        }

        match RegexBuilder::new(&pattern.source)
            .case_insensitive(pattern.case_insensitive)
            .multi_line(pattern.multi_line)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
        {
            Ok(regex) => PatternVerdict::Accepted(CompiledPattern::new(pattern.clone(), regex)),
            Err(e) => PatternVerdict::RejectedSyntax(e.to_string()),
        }
    }

    /// First heuristic that flags the source, if any
    fn suspicion(&self, source: &str) -> Option<String> {
        for (shape, reason) in suspicious_shapes() {
            if shape.is_match(source) {
                return Some((*reason).to_string());
            }
        }

        let quantifiers = source
            .chars()
            .filter(|c| matches!(c, '*' | '+' | '?'))
            .count();
        if quantifiers > self.limits.max_quantifiers {
            return Some(format!(
                "{} quantifiers (max {})",
                quantifiers, self.limits.max_quantifiers
            ));
        }

        None
    }
}
