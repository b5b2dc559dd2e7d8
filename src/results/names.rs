//! Object names split by origin

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Suffix the platform gives to custom object names
const CUSTOM_SUFFIX: &str = "__c";

/// Standard and custom names from one discovery response
///
/// The two sets are disjoint; [`all`](Self::all) is a view over both and is
/// never materialised.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredNameSets {
    standard: BTreeSet<String>,
    custom: BTreeSet<String>,
}

impl DiscoveredNameSets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_custom_name(name: &str) -> bool {
        name.ends_with(CUSTOM_SUFFIX)
    }

    /// Classify and insert a name. Returns true if it was new.
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if Self::is_custom_name(&name) {
            self.custom.insert(name)
        } else {
            self.standard.insert(name)
        }
    }

    pub fn standard(&self) -> &BTreeSet<String> {
        &self.standard
    }

    pub fn custom(&self) -> &BTreeSet<String> {
        &self.custom
    }

    /// Standard names followed by custom names
    pub fn all(&self) -> impl Iterator<Item = &str> + '_ {
        self.standard
            .iter()
            .chain(self.custom.iter())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.standard.len() + self.custom.len()
    }

    pub fn is_empty(&self) -> bool {
        self.standard.is_empty() && self.custom.is_empty()
    }
}

impl<S: Into<String>> Extend<S> for DiscoveredNameSets {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.insert(name);
        }
    }
}

impl<S: Into<String>> FromIterator<S> for DiscoveredNameSets {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut sets = Self::new();
        sets.extend(iter);
        sets
    }
}
