//! Time-bounded pattern execution
//!
//! Matching runs on tokio's blocking pool. The caller waits at most the
//! configured budget; on expiry the worker's cancel flag is raised and the
//! caller returns immediately with [`ExecutionOutcome::TimedOut`]. The worker
//! checks the flag between matches and winds down on its own.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::CompiledPattern;
use crate::app::PatternConfig;

/// Byte range of one match within the searched text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
}

impl MatchSpan {
    /// Matched slice of `text`, if the span lies on character boundaries
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

/// Result of one bounded search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Matches in text order, at most the configured cap
    Matches(Vec<MatchSpan>),
    /// Budget expired before the worker finished
    TimedOut,
    /// Worker could not run to completion
    Failed(String),
}

impl ExecutionOutcome {
    pub fn spans(&self) -> &[MatchSpan] {
        match self {
            ExecutionOutcome::Matches(spans) => spans,
            _ => &[],
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, ExecutionOutcome::TimedOut)
    }
}

/// Result of running arbitrary work under the executor's budget
#[derive(Debug, PartialEq, Eq)]
pub enum Bounded<T> {
    Done(T),
    TimedOut,
    Failed(String),
}

/// Runs compiled patterns under a wall-clock budget and a match cap
#[derive(Debug, Clone)]
pub struct PatternExecutor {
    budget: Duration,
    max_matches: usize,
}

impl Default for PatternExecutor {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(10),
            max_matches: 10_000,
        }
    }
}

impl PatternExecutor {
    pub fn new(budget: Duration, max_matches: usize) -> Self {
        Self { budget, max_matches }
    }

    pub fn from_config(config: &PatternConfig) -> Self {
        Self::new(Duration::from_secs(config.timeout_secs), config.max_matches)
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn max_matches(&self) -> usize {
        self.max_matches
    }

    /// Find all matches of `pattern` in `text`
    ///
    /// Empty text short-circuits without scheduling a worker.
    pub async fn find_all(&self, pattern: &CompiledPattern, text: impl Into<Arc<str>>) -> ExecutionOutcome {
        let text: Arc<str> = text.into();
        if text.is_empty() {
            return ExecutionOutcome::Matches(Vec::new());
        }

        let regex = pattern.regex().clone();
        let max_matches = self.max_matches;
        let source = pattern.source().to_string();

        match self
            .run_bounded(move |cancel| collect_spans(&regex, &text, max_matches, cancel))
            .await
        {
            Bounded::Done(spans) => {
                if spans.len() >= max_matches {
                    tracing::debug!(pattern = %source, cap = max_matches, "Match cap reached");
                }
                ExecutionOutcome::Matches(spans)
            }
            Bounded::TimedOut => {
                tracing::warn!(pattern = %source, budget = ?self.budget, "Pattern search timed out");
                ExecutionOutcome::TimedOut
            }
            Bounded::Failed(e) => ExecutionOutcome::Failed(e),
        }
    }

    /// Whether `pattern` matches anywhere in `text`. A timeout counts as no match.
    pub async fn matches_any(&self, pattern: &CompiledPattern, text: impl Into<Arc<str>>) -> bool {
        let text: Arc<str> = text.into();
        if text.is_empty() {
            return false;
        }

        let regex = pattern.regex().clone();
        match self.run_bounded(move |_| regex.is_match(&text)).await {
            Bounded::Done(found) => found,
            Bounded::TimedOut => {
                tracing::warn!(pattern = %pattern.source(), "Pattern test timed out, treating as no match");
                false
            }
            Bounded::Failed(e) => {
                tracing::warn!(pattern = %pattern.source(), error = %e, "Pattern test failed");
                false
            }
        }
    }

    /// Run `work` on the blocking pool, giving up after the budget
    ///
    /// `work` receives a flag that is raised when the caller stops waiting.
    pub async fn run_bounded<F, T>(&self, work: F) -> Bounded<T>
    where
        F: FnOnce(&AtomicBool) -> T + Send + 'static,
        T: Send + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = cancel.clone();
        let handle = tokio::task::spawn_blocking(move || work(&worker_cancel));

        match tokio::time::timeout(self.budget, handle).await {
            Ok(Ok(value)) => Bounded::Done(value),
            Ok(Err(e)) => Bounded::Failed(e.to_string()),
            Err(_) => {
                cancel.store(true, Ordering::SeqCst);
                Bounded::TimedOut
            }
        }
    }
}

fn collect_spans(regex: &regex::Regex, text: &str, max_matches: usize, cancel: &AtomicBool) -> Vec<MatchSpan> {
    let mut spans = Vec::new();
    if max_matches == 0 {
        return spans;
    }

    for m in regex.find_iter(text) {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        spans.push(MatchSpan {
            start: m.start(),
            end: m.end(),
        });
        if spans.len() >= max_matches {
            break;
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{PatternGuard, SearchPattern};
    use std::time::Instant;

    fn compile(source: &str) -> CompiledPattern {
        PatternGuard::default()
            .evaluate(&SearchPattern::new(source))
            .into_result()
            .unwrap()
    }

    #[tokio::test]
    async fn test_find_all_in_order() {
        let executor = PatternExecutor::default();
        let text = "Account, Contact, Lead";
        let outcome = executor.find_all(&compile(r"[A-Z][a-z]+"), text).await;

        let found: Vec<&str> = outcome.spans().iter().filter_map(|s| s.slice(text)).collect();
        assert_eq!(found, vec!["Account", "Contact", "Lead"]);
    }

    #[tokio::test]
    async fn test_empty_text_short_circuits() {
        let executor = PatternExecutor::default();
        let outcome = executor.find_all(&compile("x"), "").await;
        assert_eq!(outcome, ExecutionOutcome::Matches(Vec::new()));
        assert!(!executor.matches_any(&compile("x"), "").await);
    }

    #[tokio::test]
    async fn test_match_cap_is_exact() {
        let executor = PatternExecutor::new(Duration::from_secs(10), 10_000);
        let text = "x".repeat(15_000);
        let outcome = executor.find_all(&compile("x"), text).await;
        assert_eq!(outcome.spans().len(), 10_000);
        assert_eq!(outcome.spans()[9_999], MatchSpan { start: 9_999, end: 10_000 });
    }

    #[tokio::test]
    async fn test_every_span_rematches_at_its_offset() {
        let executor = PatternExecutor::default();
        let pattern = compile(r"[A-Za-z]+__c|\d{3}");
        let text = "Invoice__c, 001, Account, Quote__c 12 345 Case__cx";
        let outcome = executor.find_all(&pattern, text).await;

        assert_eq!(outcome.spans().len(), 5);
        for span in outcome.spans() {
            let again = pattern.regex().find_at(text, span.start).map(|m| (m.start(), m.end()));
            assert_eq!(again, Some((span.start, span.end)));
        }
    }

    #[tokio::test]
    async fn test_matches_any() {
        let executor = PatternExecutor::default();
        assert!(executor.matches_any(&compile("__c"), "Invoice__c").await);
        assert!(!executor.matches_any(&compile("__c"), "Account").await);
    }

    #[tokio::test]
    async fn test_budget_returns_timeout_and_cancels_worker() {
        let executor = PatternExecutor::new(Duration::from_millis(50), 10);
        let observed = Arc::new(AtomicBool::new(false));
        let worker_observed = observed.clone();

        let started = Instant::now();
        let outcome = executor
            .run_bounded(move |cancel| {
                while !cancel.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(5));
                }
                worker_observed.store(true, Ordering::SeqCst);
            })
            .await;

        assert_eq!(outcome, Bounded::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(2));

        // The abandoned worker sees the raised flag shortly after
        for _ in 0..100 {
            if observed.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(observed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_worker_panic_is_failure() {
        let executor = PatternExecutor::default();
        let outcome: Bounded<()> = executor.run_bounded(|_| panic!("boom")).await;
        assert!(matches!(outcome, Bounded::Failed(_)));
    }
}
