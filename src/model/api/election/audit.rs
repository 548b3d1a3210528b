use serde::{Deserialize, Serialize};

use crate::model::api::id::ApiId;

/// Outcome of cross-checking an election's counters against the voter ledger.
/// Only ever produced when the two agree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub election_id: ApiId,
    /// Sum of the election's option counters.
    pub total_votes: u64,
    /// Number of users whose voted-set contains the election.
    pub voter_count: u64,
}
