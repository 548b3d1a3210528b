use std::collections::HashSet;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core user data, as stored in the database.
///
/// Credential material lives in the same document but belongs to the
/// authentication layer; it is never read or written here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCore {
    /// Unique email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// IDs of every election this user has cast a vote in.
    #[serde(default)]
    pub voted_elections: Vec<Id>,
}

impl UserCore {
    /// Create a new user who has not voted yet.
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            voted_elections: Vec::new(),
        }
    }

    /// Has this user already voted in the given election?
    pub fn has_voted_in(&self, election_id: Id) -> bool {
        self.voted_elections.contains(&election_id)
    }

    /// Check the voted-set invariant: no election may appear twice.
    pub fn check_integrity(&self) -> Result<(), String> {
        let mut seen = HashSet::with_capacity(self.voted_elections.len());
        for election_id in &self.voted_elections {
            if !seen.insert(election_id) {
                return Err(format!(
                    "user {} lists election {} more than once",
                    self.email, election_id
                ));
            }
        }
        Ok(())
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl UserCore {
        pub fn example() -> Self {
            Self::new("ada@example.com", "Ada")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_voted_election_is_corruption() {
        let election = Id::new();
        let mut user = UserCore::example();
        user.voted_elections.push(election);
        assert!(user.check_integrity().is_ok());
        assert!(user.has_voted_in(election));

        user.voted_elections.push(election);
        assert!(user.check_integrity().is_err());
    }
}
