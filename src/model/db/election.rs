use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// One named choice within an election, with its running vote count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionOption {
    pub name: String,
    /// Stored as a signed integer for compatibility with existing documents;
    /// a negative value is treated as corruption.
    #[serde(default)]
    pub count: i64,
}

impl ElectionOption {
    /// A fresh option with no votes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            count: 0,
        }
    }
}

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Globally unique title.
    pub title: String,
    /// Options in display order. Names are fixed at creation; only counts change.
    pub options: Vec<ElectionOption>,
}

impl ElectionCore {
    /// Create a new election with all counters at zero.
    ///
    /// Returns `None` if the title is blank, there are no options, or any
    /// option name is blank or repeated.
    pub fn new<I, S>(title: impl Into<String>, option_names: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let title = title.into();
        if title.trim().is_empty() {
            return None;
        }
        let options = option_names
            .into_iter()
            .map(ElectionOption::new)
            .collect::<Vec<_>>();
        let election = Self { title, options };
        if election.options.is_empty()
            || election.options.iter().any(|o| o.name.trim().is_empty())
            || election.check_integrity().is_err()
        {
            return None;
        }
        Some(election)
    }

    /// Look up an option by name.
    pub fn option(&self, name: &str) -> Option<&ElectionOption> {
        self.options.iter().find(|option| option.name == name)
    }

    /// Sum of all option counters, or `None` if it overflows.
    pub fn total_votes(&self) -> Option<i64> {
        self.options
            .iter()
            .try_fold(0_i64, |total, option| total.checked_add(option.count))
    }

    /// Check stored-data invariants: unique option names, non-negative
    /// counts, and a total that fits in a counter.
    pub fn check_integrity(&self) -> Result<(), String> {
        let mut names = HashSet::with_capacity(self.options.len());
        for option in &self.options {
            if !names.insert(option.name.as_str()) {
                return Err(format!(
                    "election '{}' has duplicate option '{}'",
                    self.title, option.name
                ));
            }
            if option.count < 0 {
                return Err(format!(
                    "election '{}' option '{}' has negative count {}",
                    self.title, option.name, option.count
                ));
            }
        }
        if self.total_votes().is_none() {
            return Err(format!(
                "election '{}' has vote counts summing past {}",
                self.title,
                i64::MAX
            ));
        }
        Ok(())
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl ElectionCore {
        pub fn example() -> Self {
            Self::new("Class President", ["Alice", "Bob"]).unwrap()
        }

        pub fn example2() -> Self {
            Self::new("Lunch Menu", ["Pizza", "Salad", "Soup"]).unwrap()
        }
    }
}
