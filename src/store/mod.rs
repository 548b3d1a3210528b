//! Thin persistence interface for the election store and the voter ledger.
//!
//! Reads are available directly on a [`VoteStore`]. The two mutations a vote
//! needs are only reachable through a [`VoteTransaction`], which the
//! coordinator either commits as a whole or aborts.

use std::sync::Arc;

use mongodb::error::{
    Error as DbError, ErrorKind, TRANSIENT_TRANSACTION_ERROR,
};
use thiserror::Error;

use crate::model::{
    db::{Election, User},
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The store a running server uses, shared between request handlers.
pub type SharedStore = Arc<dyn VoteStore>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
    /// The commit may or may not have been applied. Retrying the whole
    /// transaction would misreport the caller's own vote as a duplicate.
    #[error("Commit outcome unknown: {0}")]
    CommitUnknown(DbError),
    #[error("Transient storage failure: {0}")]
    Transient(String),
    #[error("Storage corruption: {0}")]
    Corruption(String),
    #[error("Duplicate {field}: {value}")]
    Duplicate { field: &'static str, value: String },
}

impl StoreError {
    /// Whether the failed transaction can safely be retried from the start.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Db(err) => {
                err.contains_label(TRANSIENT_TRANSACTION_ERROR)
                    || matches!(
                        *err.kind,
                        ErrorKind::Io(_)
                            | ErrorKind::ConnectionPoolCleared { .. }
                            | ErrorKind::ServerSelection { .. }
                    )
            }
            Self::Transient(_) => true,
            Self::CommitUnknown(_) | Self::Corruption(_) | Self::Duplicate { .. } => false,
        }
    }
}

/// How to look up a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserKey<'a> {
    Id(Id),
    Email(&'a str),
}

/// Outcome of trying to add an election to a user's voted-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoterMark {
    /// The election was added.
    Marked,
    /// The election was already present; nothing changed.
    AlreadyMarked,
    /// No such user; nothing changed.
    UnknownUser,
}

/// Outcome of trying to increment an option counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TallyBump {
    /// The counter was incremented; carries the election as it now stands.
    Bumped(Election),
    UnknownElection,
    UnknownOption,
}

/// An election read together with the ledger entries that refer to it, from
/// one consistent snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionAudit {
    pub election: Election,
    /// How many users list this election in their voted-set.
    pub voter_count: u64,
}

#[rocket::async_trait]
pub trait VoteStore: Send + Sync {
    async fn find_user(&self, key: UserKey<'_>) -> StoreResult<Option<User>>;

    async fn find_election(&self, election_id: Id) -> StoreResult<Option<Election>>;

    /// All elections, oldest first.
    async fn list_elections(&self) -> StoreResult<Vec<Election>>;

    async fn audit_snapshot(&self, election_id: Id) -> StoreResult<Option<ElectionAudit>>;

    /// Start a transaction. Nothing done through it is visible to anyone
    /// else until [`VoteTransaction::commit`] succeeds.
    async fn begin(&self) -> StoreResult<Box<dyn VoteTransaction>>;
}

/// The mutation primitives, grouped into one atomic unit.
///
/// Neither primitive enforces duplicate-vote prevention on its own; they
/// only report what they matched.
#[rocket::async_trait]
pub trait VoteTransaction: Send {
    async fn add_voted_election(&mut self, user_id: Id, election_id: Id)
        -> StoreResult<VoterMark>;

    async fn increment_option(&mut self, election_id: Id, option: &str)
        -> StoreResult<TallyBump>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn abort(self: Box<Self>) -> StoreResult<()>;
}
