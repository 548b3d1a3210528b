use mongodb::{
    bson::doc,
    error::UNKNOWN_TRANSACTION_COMMIT_RESULT,
    options::{
        Acknowledgment, FindOneAndUpdateOptions, FindOptions, ReadConcern, ReturnDocument,
        SessionOptions, TransactionOptions, WriteConcern,
    },
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;

use crate::model::{
    db::{Election, User},
    mongodb::{Coll, Id},
};

use super::{
    ElectionAudit, StoreError, StoreResult, TallyBump, UserKey, VoteStore, VoteTransaction,
    VoterMark,
};

/// How many times to re-send a commit whose outcome the driver could not determine.
const COMMIT_ATTEMPTS: u32 = 3;

/// MongoDB-backed store. Votes run as multi-document transactions, so the
/// at-most-once guarantee holds across any number of server instances.
/// Requires a replica set or sharded cluster.
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    users: Coll<User>,
    elections: Coll<Election>,
}

impl MongoStore {
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            users: Coll::from_db(db),
            elections: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl VoteStore for MongoStore {
    async fn find_user(&self, key: UserKey<'_>) -> StoreResult<Option<User>> {
        let filter = match key {
            UserKey::Id(id) => id.as_doc(),
            UserKey::Email(email) => doc! { "email": email },
        };
        let user = self.users.find_one(filter, None).await?;
        if let Some(ref user) = user {
            user.check_integrity().map_err(StoreError::Corruption)?;
        }
        Ok(user)
    }

    async fn find_election(&self, election_id: Id) -> StoreResult<Option<Election>> {
        Ok(self.elections.find_one(election_id.as_doc(), None).await?)
    }

    async fn list_elections(&self) -> StoreResult<Vec<Election>> {
        let oldest_first = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let elections = self
            .elections
            .find(None, oldest_first)
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    async fn audit_snapshot(&self, election_id: Id) -> StoreResult<Option<ElectionAudit>> {
        // Read the counters and the ledger from the same point in time.
        let session_options = SessionOptions::builder().snapshot(true).build();
        let mut session = self.client.start_session(Some(session_options)).await?;

        let election = match self
            .elections
            .find_one_with_session(election_id.as_doc(), None, &mut session)
            .await?
        {
            Some(election) => election,
            None => return Ok(None),
        };
        let voter_count = self
            .users
            .count_documents_with_session(
                doc! { "votedElections": election_id },
                None,
                &mut session,
            )
            .await?;

        Ok(Some(ElectionAudit {
            election,
            voter_count,
        }))
    }

    async fn begin(&self) -> StoreResult<Box<dyn VoteTransaction>> {
        let mut session = self.client.start_session(None).await?;
        let options = TransactionOptions::builder()
            .read_concern(ReadConcern::snapshot())
            .write_concern(WriteConcern::builder().w(Acknowledgment::Majority).build())
            .build();
        session.start_transaction(options).await?;
        Ok(Box::new(MongoTransaction {
            session,
            users: self.users.clone(),
            elections: self.elections.clone(),
        }))
    }
}

/// An open MongoDB transaction. Dropping it without committing leaves the
/// server to abort it.
struct MongoTransaction {
    session: ClientSession,
    users: Coll<User>,
    elections: Coll<Election>,
}

#[rocket::async_trait]
impl VoteTransaction for MongoTransaction {
    async fn add_voted_election(
        &mut self,
        user_id: Id,
        election_id: Id,
    ) -> StoreResult<VoterMark> {
        // Conditional on absence, so two racing transactions cannot both match.
        let filter = doc! {
            "_id": user_id,
            "votedElections": { "$ne": election_id },
        };
        let update = doc! {
            "$push": { "votedElections": election_id }
        };
        let result = self
            .users
            .update_one_with_session(filter, update, None, &mut self.session)
            .await?;
        if result.matched_count == 1 {
            return Ok(VoterMark::Marked);
        }

        // Nothing matched: tell apart a missing user from a repeat vote.
        let user = self
            .users
            .find_one_with_session(user_id.as_doc(), None, &mut self.session)
            .await?;
        Ok(match user {
            Some(_) => VoterMark::AlreadyMarked,
            None => VoterMark::UnknownUser,
        })
    }

    async fn increment_option(
        &mut self,
        election_id: Id,
        option: &str,
    ) -> StoreResult<TallyBump> {
        let filter = doc! {
            "_id": election_id,
            "options.name": option,
        };
        let update = doc! {
            "$inc": { "options.$.count": 1_i64 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .elections
            .find_one_and_update_with_session(filter, update, options, &mut self.session)
            .await?;
        if let Some(election) = updated {
            election.check_integrity().map_err(StoreError::Corruption)?;
            return Ok(TallyBump::Bumped(election));
        }

        let election = self
            .elections
            .find_one_with_session(election_id.as_doc(), None, &mut self.session)
            .await?;
        Ok(match election {
            Some(_) => TallyBump::UnknownOption,
            None => TallyBump::UnknownElection,
        })
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        let mut attempts = 1;
        loop {
            match self.session.commit_transaction().await {
                Ok(()) => return Ok(()),
                Err(err) if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT) => {
                    if attempts >= COMMIT_ATTEMPTS {
                        return Err(StoreError::CommitUnknown(err));
                    }
                    warn!("Vote commit outcome unknown, re-sending commit ({attempts}/{COMMIT_ATTEMPTS}): {err}");
                    attempts += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn abort(mut self: Box<Self>) -> StoreResult<()> {
        self.session.abort_transaction().await?;
        Ok(())
    }
}
