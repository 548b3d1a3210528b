use rocket::{
    serde::json::{Error as JsonError, Json},
    Route,
};

use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::logging::RequestId;
use crate::model::api::{
    election::ElectionResults,
    vote::{VoteReceipt, VoteRequest, VoterRef},
};
use crate::tally::TallyReader;

pub fn routes() -> Vec<Route> {
    routes![cast_vote]
}

#[post("/vote", data = "<request>")]
async fn cast_vote(
    request_id: &RequestId,
    reader: TallyReader<'_>,
    coordinator: Coordinator<'_>,
    request: std::result::Result<Json<VoteRequest>, JsonError<'_>>,
) -> Result<Json<VoteReceipt>> {
    let request = request.map_err(|e| Error::Validation(format!("Invalid vote request: {e}")))?;
    let vote = request.into_inner().validate()?;

    // Authentication happens upstream; all we need here is the user's ID.
    let user_id = match vote.voter {
        VoterRef::Id(id) => id,
        ref voter @ VoterRef::Email(_) => reader.find_user(voter).await?.id,
    };
    debug!("{request_id}: user {user_id} voting in election {}", vote.election_id);

    let election = coordinator
        .cast_vote(user_id, vote.election_id, &vote.option)
        .await?;
    let results = ElectionResults::try_from(election).map_err(Error::StorageCorruption)?;
    Ok(Json(VoteReceipt::new(results)))
}
