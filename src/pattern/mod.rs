//! Bounded pattern search
//!
//! User-supplied search patterns go through two gates. [`PatternGuard`]
//! rejects empty, oversized and backtracking-prone patterns before anything
//! runs; [`PatternExecutor`] then runs accepted patterns on an isolated
//! blocking worker under a wall-clock budget so the caller is always
//! unblocked with either matches or a timeout outcome.

mod executor;
mod guard;

pub use executor::{Bounded, ExecutionOutcome, MatchSpan, PatternExecutor};
pub use guard::{GuardLimits, PatternGuard};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PatternError;

/// A search pattern as typed by the operator, with its matching flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPattern {
    /// Pattern source text
    pub source: String,
    /// Match without regard to letter case
    pub case_insensitive: bool,
    /// `^` and `$` match at line boundaries
    pub multi_line: bool,
}

impl SearchPattern {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            case_insensitive: false,
            multi_line: false,
        }
    }

    /// Case-insensitive, multi-line pattern (the flags used for response search)
    pub fn for_search(source: impl Into<String>) -> Self {
        Self::new(source).case_insensitive(true).multi_line(true)
    }

    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    pub fn multi_line(mut self, yes: bool) -> Self {
        self.multi_line = yes;
        self
    }
}

/// A pattern that passed the guard and compiled. Cannot be modified.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pattern: SearchPattern,
    regex: Regex,
}

impl CompiledPattern {
    pub(crate) fn new(pattern: SearchPattern, regex: Regex) -> Self {
        Self { pattern, regex }
    }

    pub fn pattern(&self) -> &SearchPattern {
        &self.pattern
    }

    pub fn source(&self) -> &str {
        &self.pattern.source
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// Outcome of evaluating one [`SearchPattern`]
#[derive(Debug, Clone)]
pub enum PatternVerdict {
    Accepted(CompiledPattern),
    RejectedEmpty,
    RejectedTooLong { len: usize, max: usize },
    RejectedSuspicious(String),
    /// Passed the heuristics but the regex engine refused it
    RejectedSyntax(String),
}

impl PatternVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PatternVerdict::Accepted(_))
    }

    /// Convert into a `Result`, mapping every rejection to a [`PatternError`]
    pub fn into_result(self) -> Result<CompiledPattern, PatternError> {
        match self {
            PatternVerdict::Accepted(compiled) => Ok(compiled),
            PatternVerdict::RejectedEmpty => Err(PatternError::Empty),
            PatternVerdict::RejectedTooLong { len, max } => Err(PatternError::TooLong { len, max }),
            PatternVerdict::RejectedSuspicious(reason) => Err(PatternError::Suspicious(reason)),
            PatternVerdict::RejectedSyntax(reason) => Err(PatternError::Syntax(reason)),
        }
    }
}
