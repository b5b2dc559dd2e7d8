//! Insertion-ordered result storage

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::ScanError;

/// Entries keyed by discovered name, in first-insertion order
///
/// Re-adding a name replaces its payload and keeps its original position.
/// Entries are only ever removed by an explicit [`remove`](Self::remove).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultAccumulator {
    entries: IndexMap<String, String>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an entry. Returns true if the name was new.
    pub fn add_entry(&mut self, name: impl Into<String>, payload: impl Into<String>) -> bool {
        self.entries.insert(name.into(), payload.into()).is_none()
    }

    /// Union in the entries of another accumulator
    ///
    /// Names already present keep their position and take `other`'s payload;
    /// new names follow in `other`'s order.
    pub fn merge(&mut self, other: ResultAccumulator) {
        for (name, payload) in other.entries {
            self.entries.insert(name, payload);
        }
    }

    pub fn names_in_insertion_order(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Remove one entry, keeping the order of the rest
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Shared handle to an accumulator with a single-writer lease
#[derive(Debug, Clone, Default)]
pub struct SharedResults {
    inner: Arc<RwLock<ResultAccumulator>>,
    leased: Arc<AtomicBool>,
}

impl SharedResults {
    pub fn new(accumulator: ResultAccumulator) -> Self {
        Self {
            inner: Arc::new(RwLock::new(accumulator)),
            leased: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Take the write lease. Fails while another job holds it.
    pub fn lease(&self) -> Result<ResultLease, ScanError> {
        self.leased
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ScanError::AlreadyRunning)?;
        Ok(ResultLease {
            results: self.clone(),
        })
    }

    pub fn is_leased(&self) -> bool {
        self.leased.load(Ordering::Acquire)
    }

    pub fn read<R>(&self, f: impl FnOnce(&ResultAccumulator) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn snapshot(&self) -> ResultAccumulator {
        self.inner.read().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Operator-initiated removal
    pub fn remove(&self, name: &str) -> Option<String> {
        self.inner.write().remove(name)
    }

    /// Union a prior accumulator into this one
    pub fn merge(&self, prior: ResultAccumulator) {
        self.inner.write().merge(prior);
    }
}

/// Exclusive append access held by the running job; released on drop
#[derive(Debug)]
pub struct ResultLease {
    results: SharedResults,
}

impl ResultLease {
    pub fn add_entry(&self, name: impl Into<String>, payload: impl Into<String>) -> bool {
        self.results.inner.write().add_entry(name, payload)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &SharedResults {
        &self.results
    }
}

impl Drop for ResultLease {
    fn drop(&mut self) {
        self.results.leased.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(acc: &ResultAccumulator) -> Vec<&str> {
        acc.names_in_insertion_order().collect()
    }

    #[test]
    fn test_insertion_order() {
        let mut acc = ResultAccumulator::new();
        assert!(acc.add_entry("Contact", "c"));
        assert!(acc.add_entry("Account", "a"));
        assert!(acc.add_entry("Lead", "l"));
        assert_eq!(names(&acc), vec!["Contact", "Account", "Lead"]);
    }

    #[test]
    fn test_readd_keeps_position_and_replaces_payload() {
        let mut acc = ResultAccumulator::new();
        acc.add_entry("X", "1");
        acc.add_entry("Y", "1");
        assert!(!acc.add_entry("X", "2"));

        assert_eq!(names(&acc), vec!["X", "Y"]);
        assert_eq!(acc.get("X"), Some("2"));
    }

    #[test]
    fn test_append_continuation() {
        let mut prior = ResultAccumulator::new();
        prior.add_entry("X", "x-old");
        prior.add_entry("Y", "y-old");

        let mut found = ResultAccumulator::new();
        found.add_entry("Y", "y-new");
        found.add_entry("Z", "z-new");

        prior.merge(found);
        assert_eq!(names(&prior), vec!["X", "Y", "Z"]);
        assert_eq!(prior.get("Y"), Some("y-new"));
        assert_eq!(prior.get("X"), Some("x-old"));
    }

    #[test]
    fn test_explicit_remove_keeps_order() {
        let mut acc = ResultAccumulator::new();
        for n in ["A", "B", "C"] {
            acc.add_entry(n, "");
        }
        assert_eq!(acc.remove("B"), Some(String::new()));
        assert_eq!(acc.remove("B"), None);
        assert_eq!(names(&acc), vec!["A", "C"]);
    }

    #[test]
    fn test_serializes_as_ordered_object() {
        let mut acc = ResultAccumulator::new();
        acc.add_entry("b", "2");
        acc.add_entry("a", "1");
        assert_eq!(serde_json::to_string(&acc).unwrap(), r#"{"b":"2","a":"1"}"#);

        let back: ResultAccumulator = serde_json::from_str(r#"{"b":"2","a":"1"}"#).unwrap();
        assert_eq!(back, acc);
    }

    #[test]
    fn test_single_lease() {
        let shared = SharedResults::default();
        let lease = shared.lease().unwrap();
        assert!(shared.is_leased());
        assert_eq!(shared.lease().unwrap_err(), ScanError::AlreadyRunning);

        lease.add_entry("Account", "p");
        drop(lease);

        assert!(!shared.is_leased());
        assert!(shared.lease().is_ok());
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn test_shared_merge_and_remove() {
        let shared = SharedResults::default();
        {
            let lease = shared.lease().unwrap();
            lease.add_entry("Y", "new");
        }

        let mut prior = ResultAccumulator::new();
        prior.add_entry("X", "old");
        shared.merge(prior);

        assert_eq!(shared.read(|acc| names(acc).join(",")), "Y,X");
        assert_eq!(shared.remove("Y"), Some("new".to_string()));
        assert_eq!(shared.snapshot().len(), 1);
    }
}
