//! The vote transaction coordinator: the only code that mutates the election
//! store or the voter ledger.
//!
//! Each attempt at a vote is one storage transaction that adds the election
//! to the voter's voted-set *only if absent* and then increments the chosen
//! option. Both writes commit together or not at all, and the conditional
//! insert is what makes concurrent duplicates lose.

use std::time::Duration;

use rand::Rng;
use rocket::{
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    tokio, Request, State,
};

use crate::error::{Error, Result};
use crate::model::{db::Election, mongodb::Id};
use crate::store::{
    SharedStore, StoreError, TallyBump, VoteStore, VoteTransaction, VoterMark,
};
use crate::Config;

/// Bounded exponential backoff for transient storage failures.
///
/// Concurrent votes on one election conflict on its document, and every
/// round of conflicts commits at least one of them. A burst of `k`
/// simultaneous voters on one election therefore needs at most `k` attempts
/// for the unluckiest one; larger bursts may see `StorageUnavailable`, which
/// leaves nothing recorded and is safe to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// How long to wait after the given failed attempt (1-based): doubling
    /// from `base_delay`, capped at `max_delay`, plus up to 50% jitter so
    /// that conflicting requests spread out.
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self
            .base_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay);
        let jitter_ms = (backoff.as_millis() / 2) as u64;
        let jitter = rand::thread_rng().gen_range(0..=jitter_ms);
        backoff + Duration::from_millis(jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 25,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(500),
        }
    }
}

/// Why a single attempt did not commit.
enum Attempt {
    /// A precondition failed. Terminal.
    Rejected(Error),
    /// The store failed; may be retryable.
    Store(StoreError),
}

impl From<StoreError> for Attempt {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

/// Records votes. Borrowed per request from managed state.
pub struct Coordinator<'a> {
    store: &'a dyn VoteStore,
    policy: RetryPolicy,
}

impl<'a> Coordinator<'a> {
    pub fn new(store: &'a dyn VoteStore, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Cast `user_id`'s vote for `option` in `election_id`.
    ///
    /// Preconditions are checked in this order, each with its own error:
    /// the user exists, they have not voted in this election, the election
    /// exists, and it has an option with this name. On success the returned
    /// election includes this vote.
    pub async fn cast_vote(&self, user_id: Id, election_id: Id, option: &str) -> Result<Election> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.try_cast_vote(user_id, election_id, option).await {
                Ok(election) => {
                    info!("Recorded vote by user {user_id} in election {election_id} for '{option}'");
                    return Ok(election);
                }
                Err(Attempt::Rejected(err)) => return Err(err),
                Err(Attempt::Store(err)) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.delay(attempt);
                    warn!(
                        "Transient failure recording vote by user {user_id} in election \
                        {election_id} (attempt {attempt}/{max_attempts}), retrying in {delay:?}: {err}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(Attempt::Store(err)) if err.is_transient() => {
                    error!(
                        "Giving up on vote by user {user_id} in election {election_id} \
                        after {attempt} attempt(s): {err}"
                    );
                    return Err(Error::StorageUnavailable {
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(Attempt::Store(err)) => return Err(err.into()),
            }
        }
    }

    /// One transaction: apply both writes and commit, or abort.
    async fn try_cast_vote(
        &self,
        user_id: Id,
        election_id: Id,
        option: &str,
    ) -> std::result::Result<Election, Attempt> {
        let mut txn = self.store.begin().await?;
        match apply_vote(txn.as_mut(), user_id, election_id, option).await {
            Ok(election) => {
                txn.commit().await?;
                Ok(election)
            }
            Err(err) => {
                if let Err(abort_err) = txn.abort().await {
                    // The store discards uncommitted work regardless.
                    warn!("Failed to abort vote transaction cleanly: {abort_err}");
                }
                Err(err)
            }
        }
    }
}

async fn apply_vote(
    txn: &mut dyn VoteTransaction,
    user_id: Id,
    election_id: Id,
    option: &str,
) -> std::result::Result<Election, Attempt> {
    match txn.add_voted_election(user_id, election_id).await? {
        VoterMark::Marked => {}
        VoterMark::AlreadyMarked => {
            return Err(Attempt::Rejected(Error::AlreadyVoted(election_id)));
        }
        VoterMark::UnknownUser => {
            return Err(Attempt::Rejected(Error::UserNotFound(user_id.to_string())));
        }
    }
    match txn.increment_option(election_id, option).await? {
        TallyBump::Bumped(election) => Ok(election),
        TallyBump::UnknownElection => Err(Attempt::Rejected(Error::ElectionNotFound(election_id))),
        TallyBump::UnknownOption => Err(Attempt::Rejected(Error::InvalidOption {
            election_id,
            option: option.to_string(),
        })),
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Coordinator<'r> {
    type Error = ();

    /// Borrow the store and retry policy from managed state.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let store = try_outcome!(req.guard::<&State<SharedStore>>().await);
        let config = try_outcome!(req.guard::<&State<Config>>().await);
        Outcome::Success(Coordinator::new(
            store.inner().as_ref(),
            config.retry_policy(),
        ))
    }
}
