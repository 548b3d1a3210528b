//! The tally reader: read-only queries over the election store and voter
//! ledger. Nothing here mutates.

use rocket::{
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    Request, State,
};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        election::{AuditReport, ElectionResults},
        vote::VoterRef,
    },
    db::{Election, User},
    mongodb::Id,
};
use crate::store::{SharedStore, UserKey, VoteStore};

pub struct TallyReader<'a> {
    store: &'a dyn VoteStore,
}

impl<'a> TallyReader<'a> {
    pub fn new(store: &'a dyn VoteStore) -> Self {
        Self { store }
    }

    /// Current results of one election, from a single document read.
    pub async fn get_election(&self, election_id: Id) -> Result<ElectionResults> {
        let election = self
            .store
            .find_election(election_id)
            .await?
            .ok_or(Error::ElectionNotFound(election_id))?;
        results_of(election)
    }

    /// Results of every election, oldest first.
    pub async fn list_elections(&self) -> Result<Vec<ElectionResults>> {
        self.store
            .list_elections()
            .await?
            .into_iter()
            .map(results_of)
            .collect()
    }

    pub async fn find_user(&self, voter: &VoterRef) -> Result<User> {
        let key = match voter {
            VoterRef::Id(id) => UserKey::Id(*id),
            VoterRef::Email(email) => UserKey::Email(email),
        };
        self.store
            .find_user(key)
            .await?
            .ok_or_else(|| Error::UserNotFound(voter.to_string()))
    }

    /// Cross-check an election's counters against the voter ledger, reading
    /// both from one snapshot. A mismatch means the two diverged at some
    /// point; it is reported, never repaired.
    pub async fn audit(&self, election_id: Id) -> Result<AuditReport> {
        let audit = self
            .store
            .audit_snapshot(election_id)
            .await?
            .ok_or(Error::ElectionNotFound(election_id))?;
        let total_votes = results_of(audit.election)?.total_votes;
        if total_votes != audit.voter_count {
            let msg = format!(
                "election {election_id} has {total_votes} counted vote(s) \
                but {} voter(s) in the ledger",
                audit.voter_count
            );
            error!("Audit failed: {msg}");
            return Err(Error::StorageCorruption(msg));
        }
        debug!("Audit passed for election {election_id}: {total_votes} vote(s)");
        Ok(AuditReport {
            election_id: election_id.into(),
            total_votes,
            voter_count: audit.voter_count,
        })
    }
}

fn results_of(election: Election) -> Result<ElectionResults> {
    ElectionResults::try_from(election).map_err(|msg| {
        error!("Corrupt election document: {msg}");
        Error::StorageCorruption(msg)
    })
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for TallyReader<'r> {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let store = try_outcome!(req.guard::<&State<SharedStore>>().await);
        Outcome::Success(TallyReader::new(store.inner().as_ref()))
    }
}
