//! Named result destinations

use serde::{Deserialize, Serialize};

use super::{ResultAccumulator, SharedResults};

const DESTINATION_PREFIX: &str = "Retrieved Objects";

/// Operator choice before a bulk job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionChoice {
    /// Continue the most recent destination
    Append,
    /// Open a new destination with an empty accumulator
    Fresh,
}

/// A named accumulator that bulk jobs write into
#[derive(Debug, Clone)]
pub struct ResultDestination {
    pub name: String,
    pub results: SharedResults,
}

/// All destinations opened during this run
#[derive(Debug, Default)]
pub struct ResultSessions {
    destinations: Vec<ResultDestination>,
    opened: usize,
}

impl ResultSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination for the next job
    ///
    /// `Append` with nothing open falls back to a fresh destination.
    pub fn open(&mut self, choice: SessionChoice) -> ResultDestination {
        if choice == SessionChoice::Append {
            if let Some(latest) = self.destinations.last() {
                return latest.clone();
            }
        }
        self.open_fresh(ResultAccumulator::new())
    }

    /// New destination seeded with entries from an earlier run
    pub fn open_seeded(&mut self, prior: ResultAccumulator) -> ResultDestination {
        self.open_fresh(prior)
    }

    fn open_fresh(&mut self, seed: ResultAccumulator) -> ResultDestination {
        self.opened += 1;
        let destination = ResultDestination {
            name: format!("{} {}", DESTINATION_PREFIX, self.opened),
            results: SharedResults::new(seed),
        };
        tracing::debug!(destination = %destination.name, "Opened result destination");
        self.destinations.push(destination.clone());
        destination
    }

    pub fn latest(&self) -> Option<&ResultDestination> {
        self.destinations.last()
    }

    pub fn get(&self, name: &str) -> Option<&ResultDestination> {
        self.destinations.iter().find(|d| d.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.destinations.iter().map(|d| d.name.as_str())
    }

    /// Drop a destination. Numbering is not reused.
    pub fn close(&mut self, name: &str) -> Option<ResultDestination> {
        let index = self.destinations.iter().position(|d| d.name == name)?;
        Some(self.destinations.remove(index))
    }
}
