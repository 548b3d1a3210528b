use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::tally, db::Election};

/// Per-option line of an election's results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionResult {
    pub name: String,
    pub count: u64,
    pub percentage: f64,
}

/// API-friendly snapshot of an election with its live tally.
///
/// All derived fields are computed from the same set of counts, so a
/// response never mixes numbers from different moments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub id: ApiId,
    pub title: String,
    pub options: Vec<OptionResult>,
    pub total_votes: u64,
    /// Name of the leading option; ties go to the earliest option.
    pub leader: Option<String>,
}

impl ElectionResults {
    /// Build results from raw `(name, count)` pairs.
    ///
    /// Fails if the counts sum past `u64::MAX`.
    pub fn from_counts(
        id: ApiId,
        title: String,
        counts: Vec<(String, u64)>,
    ) -> Result<Self, String> {
        let raw_counts = counts.iter().map(|(_, count)| *count).collect::<Vec<_>>();
        let total_votes = tally::total_votes(&raw_counts)
            .ok_or_else(|| format!("vote counts of '{title}' sum past {}", u64::MAX))?;
        let leader = tally::leader(&raw_counts).map(|index| counts[index].0.clone());
        let options = counts
            .into_iter()
            .map(|(name, count)| OptionResult {
                name,
                count,
                percentage: tally::percentage(count, total_votes),
            })
            .collect();
        Ok(Self {
            id,
            title,
            options,
            total_votes,
            leader,
        })
    }

    /// Recompute the derived fields from the option counts alone.
    pub fn recomputed(&self) -> Result<Self, String> {
        let counts = self
            .options
            .iter()
            .map(|option| (option.name.clone(), option.count))
            .collect();
        Self::from_counts(self.id, self.title.clone(), counts)
    }
}

impl TryFrom<Election> for ElectionResults {
    /// Description of the violated storage invariant.
    type Error = String;

    fn try_from(election: Election) -> Result<Self, Self::Error> {
        election.check_integrity()?;
        let Election { id, election } = election;
        let counts = election
            .options
            .into_iter()
            .map(|option| {
                // Non-negative: checked above.
                let count = u64::try_from(option.count).unwrap_or_default();
                (option.name, count)
            })
            .collect();
        Self::from_counts(id.into(), election.title, counts)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        db::{ElectionCore, ElectionOption},
        mongodb::Id,
    };

    use super::*;

    fn election_with(counts: &[(&str, i64)]) -> Election {
        Election {
            id: Id::new(),
            election: ElectionCore {
                title: "Tally".to_string(),
                options: counts
                    .iter()
                    .map(|(name, count)| ElectionOption {
                        name: name.to_string(),
                        count: *count,
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn tally_statistics() {
        let results = ElectionResults::try_from(election_with(&[("Alice", 3), ("Bob", 7)])).unwrap();
        assert_eq!(results.total_votes, 10);
        assert_eq!(results.leader.as_deref(), Some("Bob"));
        assert_eq!(results.options[0].percentage, 30.0);
        assert_eq!(results.options[1].percentage, 70.0);
        assert_eq!(Ok(results.clone()), results.recomputed());
    }

    #[test]
    fn empty_tally() {
        let results = ElectionResults::try_from(election_with(&[("A", 0), ("B", 0)])).unwrap();
        assert_eq!(results.total_votes, 0);
        assert_eq!(results.leader.as_deref(), Some("A"));
        assert!(results.options.iter().all(|option| option.percentage == 0.0));
    }

    #[test]
    fn corrupt_counts_are_refused() {
        assert!(ElectionResults::try_from(election_with(&[("A", -2), ("B", 1)])).is_err());
        assert!(ElectionResults::try_from(election_with(&[("A", 1), ("A", 1)])).is_err());
        assert!(ElectionResults::try_from(election_with(&[("A", i64::MAX), ("B", 1)])).is_err());
    }

    #[test]
    fn overflowing_counts_cannot_be_recomputed() {
        let results = ElectionResults {
            id: Id::new().into(),
            title: "Huge".to_string(),
            options: vec![
                OptionResult {
                    name: "A".to_string(),
                    count: u64::MAX,
                    percentage: 100.0,
                },
                OptionResult {
                    name: "B".to_string(),
                    count: 1,
                    percentage: 0.0,
                },
            ],
            total_votes: u64::MAX,
            leader: Some("A".to_string()),
        };
        assert!(results.recomputed().is_err());
    }
}
