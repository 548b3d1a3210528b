use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{api::election::ElectionResults, mongodb::Id};

/// How a request identifies the (already authenticated) voter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoterRef {
    Id(Id),
    Email(String),
}

impl Display for VoterRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Email(email) => write!(f, "{email}"),
        }
    }
}

/// Body of a vote request, exactly as submitted.
///
/// Every field is optional here so that a missing field becomes a
/// validation error rather than a generic parse failure; unknown fields are
/// still refused outright.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VoteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub election_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
}

/// A vote request that has passed boundary validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidVote {
    pub voter: VoterRef,
    pub election_id: Id,
    pub option: String,
}

/// Treat blank strings the same as absent ones.
fn present(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}

impl VoteRequest {
    /// Check the request has everything the coordinator needs.
    pub fn validate(self) -> Result<ValidVote> {
        let voter = match (present(self.email), present(self.user_id)) {
            (Some(email), None) => VoterRef::Email(email),
            (None, Some(user_id)) => VoterRef::Id(
                user_id
                    .parse()
                    .map_err(|_| Error::Validation(format!("Malformed user ID '{user_id}'")))?,
            ),
            (Some(_), Some(_)) => {
                return Err(Error::Validation(
                    "Give either an email or a user ID, not both".to_string(),
                ))
            }
            (None, None) => return Err(Error::Validation("All fields are required".to_string())),
        };
        let (election_id, option) = match (present(self.election_id), present(self.option)) {
            (Some(election_id), Some(option)) => (election_id, option),
            _ => return Err(Error::Validation("All fields are required".to_string())),
        };
        let election_id = election_id
            .parse()
            .map_err(|_| Error::Validation(format!("Malformed election ID '{election_id}'")))?;

        Ok(ValidVote {
            voter,
            election_id,
            option,
        })
    }
}

/// Response to a successful vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub message: String,
    /// The election as it stood immediately after this vote was committed.
    pub election: ElectionResults,
}

impl VoteReceipt {
    pub fn new(election: ElectionResults) -> Self {
        Self {
            message: "Vote recorded".to_string(),
            election,
        }
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    impl VoteRequest {
        pub fn by_email(email: &str, election_id: Id, option: &str) -> Self {
            Self {
                email: Some(email.to_string()),
                election_id: Some(election_id.to_string()),
                option: Some(option.to_string()),
                ..Self::default()
            }
        }

        pub fn by_id(user_id: Id, election_id: Id, option: &str) -> Self {
            Self {
                user_id: Some(user_id.to_string()),
                election_id: Some(election_id.to_string()),
                option: Some(option.to_string()),
                ..Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use super::*;

    #[test]
    fn valid_requests() {
        let election_id = Id::new();
        let vote = VoteRequest::by_email("ada@example.com", election_id, "Alice")
            .validate()
            .unwrap();
        assert_eq!(vote.voter, VoterRef::Email("ada@example.com".to_string()));
        assert_eq!(vote.election_id, election_id);
        assert_eq!(vote.option, "Alice");

        let user_id = Id::new();
        let vote = VoteRequest::by_id(user_id, election_id, "Bob").validate().unwrap();
        assert_eq!(vote.voter, VoterRef::Id(user_id));
    }

    #[test]
    fn missing_or_ambiguous_fields() {
        let election_id = Id::new();

        let mut request = VoteRequest::by_email("ada@example.com", election_id, "Alice");
        request.option = None;
        assert!(matches!(request.validate(), Err(Error::Validation(_))));

        let mut request = VoteRequest::by_email("ada@example.com", election_id, "Alice");
        request.election_id = Some("   ".to_string());
        assert!(matches!(request.validate(), Err(Error::Validation(_))));

        let mut request = VoteRequest::by_email("ada@example.com", election_id, "Alice");
        request.user_id = Some(Id::new().to_string());
        assert!(matches!(request.validate(), Err(Error::Validation(_))));

        let mut request = VoteRequest::by_email("ada@example.com", election_id, "Alice");
        request.email = None;
        assert!(matches!(request.validate(), Err(Error::Validation(_))));

        let mut request = VoteRequest::by_email("ada@example.com", election_id, "Alice");
        request.election_id = Some("not-an-id".to_string());
        assert!(matches!(request.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn unknown_fields_are_refused() {
        let body = r#"{"email":"a@b.c","electionId":"x","option":"A","weight":5}"#;
        assert!(serde_json::from_str::<VoteRequest>(body).is_err());
    }
}
