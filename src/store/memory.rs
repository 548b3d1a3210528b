use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use rocket::tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::{
    db::{Election, NewElection, NewUser, User},
    mongodb::Id,
};

use super::{
    ElectionAudit, StoreError, StoreResult, TallyBump, UserKey, VoteStore, VoteTransaction,
    VoterMark,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    /// Insertion order is creation order.
    elections: Vec<Election>,
}

impl Tables {
    fn user(&self, key: UserKey<'_>) -> Option<&User> {
        self.users.iter().find(|user| match key {
            UserKey::Id(id) => user.id == id,
            UserKey::Email(email) => user.email == email,
        })
    }

    fn election(&self, election_id: Id) -> Option<&Election> {
        self.elections
            .iter()
            .find(|election| election.id == election_id)
    }
}

/// Single-process store. Transactions take the whole store for their
/// duration and work on a private copy, published only on commit.
///
/// Cheap to clone; clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    failing_commits: Arc<AtomicU32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user. Emails must be unique.
    pub async fn insert_user(&self, user: NewUser) -> StoreResult<Id> {
        let mut tables = self.tables.lock().await;
        if tables.user(UserKey::Email(&user.email)).is_some() {
            return Err(StoreError::Duplicate {
                field: "email",
                value: user.email,
            });
        }
        let id = Id::new();
        tables.users.push(User { id, user });
        Ok(id)
    }

    /// Seed an election. Titles must be unique.
    pub async fn insert_election(&self, election: NewElection) -> StoreResult<Id> {
        let mut tables = self.tables.lock().await;
        if tables.elections.iter().any(|e| e.title == election.title) {
            return Err(StoreError::Duplicate {
                field: "title",
                value: election.title,
            });
        }
        let id = Id::new();
        tables.elections.push(Election { id, election });
        Ok(id)
    }

    /// Make the next `count` commits fail with a transient error, discarding
    /// their staged changes, as a dropped connection would.
    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    /// Overwrite a stored election as-is, bypassing every check.
    #[cfg(test)]
    pub(crate) async fn overwrite_election(&self, election: Election) {
        let mut tables = self.tables.lock().await;
        if let Some(slot) = tables.elections.iter_mut().find(|e| e.id == election.id) {
            *slot = election;
        }
    }
}

#[rocket::async_trait]
impl VoteStore for MemoryStore {
    async fn find_user(&self, key: UserKey<'_>) -> StoreResult<Option<User>> {
        let user = self.tables.lock().await.user(key).cloned();
        if let Some(ref user) = user {
            user.check_integrity().map_err(StoreError::Corruption)?;
        }
        Ok(user)
    }

    async fn find_election(&self, election_id: Id) -> StoreResult<Option<Election>> {
        Ok(self.tables.lock().await.election(election_id).cloned())
    }

    async fn list_elections(&self) -> StoreResult<Vec<Election>> {
        Ok(self.tables.lock().await.elections.clone())
    }

    async fn audit_snapshot(&self, election_id: Id) -> StoreResult<Option<ElectionAudit>> {
        let tables = self.tables.lock().await;
        let election = match tables.election(election_id) {
            Some(election) => election.clone(),
            None => return Ok(None),
        };
        let voter_count = tables
            .users
            .iter()
            .filter(|user| user.has_voted_in(election_id))
            .count() as u64;
        Ok(Some(ElectionAudit {
            election,
            voter_count,
        }))
    }

    async fn begin(&self) -> StoreResult<Box<dyn VoteTransaction>> {
        let tables = self.tables.clone().lock_owned().await;
        let staged = tables.clone();
        Ok(Box::new(MemoryTransaction {
            tables,
            staged,
            failing_commits: self.failing_commits.clone(),
        }))
    }
}

struct MemoryTransaction {
    tables: OwnedMutexGuard<Tables>,
    staged: Tables,
    failing_commits: Arc<AtomicU32>,
}

#[rocket::async_trait]
impl VoteTransaction for MemoryTransaction {
    async fn add_voted_election(
        &mut self,
        user_id: Id,
        election_id: Id,
    ) -> StoreResult<VoterMark> {
        let user = match self.staged.users.iter_mut().find(|user| user.id == user_id) {
            Some(user) => user,
            None => return Ok(VoterMark::UnknownUser),
        };
        if user.has_voted_in(election_id) {
            return Ok(VoterMark::AlreadyMarked);
        }
        user.voted_elections.push(election_id);
        Ok(VoterMark::Marked)
    }

    async fn increment_option(
        &mut self,
        election_id: Id,
        option: &str,
    ) -> StoreResult<TallyBump> {
        let election = match self
            .staged
            .elections
            .iter_mut()
            .find(|election| election.id == election_id)
        {
            Some(election) => election,
            None => return Ok(TallyBump::UnknownElection),
        };
        match election.options.iter_mut().find(|o| o.name == option) {
            Some(counter) => {
                counter.count = counter.count.checked_add(1).ok_or_else(|| {
                    StoreError::Corruption(format!("option '{option}' count overflows"))
                })?
            }
            None => return Ok(TallyBump::UnknownOption),
        }
        election.check_integrity().map_err(StoreError::Corruption)?;
        Ok(TallyBump::Bumped(election.clone()))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let Self {
            mut tables,
            staged,
            failing_commits,
        } = *self;
        let injected = failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Transient("injected commit failure".to_string()));
        }
        *tables = staged;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
