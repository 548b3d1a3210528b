use rocket::{serde::json::Json, Route};

use crate::error::Result;
use crate::model::api::election::{AuditReport, ElectionResults};
use crate::tally::TallyReader;

use super::{require_id, IdParam};

pub fn routes() -> Vec<Route> {
    routes![elections, election, election_audit]
}

#[get("/elections")]
async fn elections(reader: TallyReader<'_>) -> Result<Json<Vec<ElectionResults>>> {
    Ok(Json(reader.list_elections().await?))
}

#[get("/elections/<election_id>")]
async fn election(election_id: IdParam, reader: TallyReader<'_>) -> Result<Json<ElectionResults>> {
    let election_id = require_id(election_id, "election")?;
    Ok(Json(reader.get_election(election_id).await?))
}

#[get("/elections/<election_id>/audit")]
async fn election_audit(
    election_id: IdParam,
    reader: TallyReader<'_>,
) -> Result<Json<AuditReport>> {
    let election_id = require_id(election_id, "election")?;
    Ok(Json(reader.audit(election_id).await?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::{http::Status, local::asynchronous::Client, serde::json::serde_json};

    use crate::coordinator::{Coordinator, RetryPolicy};
    use crate::model::{
        api::id::ApiId,
        db::{ElectionCore, UserCore},
        mongodb::Id,
    };
    use crate::store::{MemoryStore, VoteStore};

    use super::*;

    async fn client_for(store: &MemoryStore) -> Client {
        Client::tracked(crate::build_with_store(Arc::new(store.clone())))
            .await
            .unwrap()
    }

    /// Two elections; the first has votes Alice 3, Bob 7.
    async fn insert_elections(store: &MemoryStore) -> (Id, Id) {
        let first = store.insert_election(ElectionCore::example()).await.unwrap();
        let second = store.insert_election(ElectionCore::example2()).await.unwrap();
        let coordinator = Coordinator::new(store, RetryPolicy::immediate(1));
        for i in 0..10 {
            let user = UserCore::new(format!("voter{i}@example.com"), format!("Voter {i}"));
            let user_id = store.insert_user(user).await.unwrap();
            let option = if i < 3 { "Alice" } else { "Bob" };
            coordinator.cast_vote(user_id, first, option).await.unwrap();
        }
        (first, second)
    }

    #[rocket::async_test]
    async fn get_all_elections() {
        let store = MemoryStore::new();
        let (first, second) = insert_elections(&store).await;
        let client = client_for(&store).await;

        let response = client.get(uri!(elections)).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let raw_response = response.into_string().await.unwrap();
        let fetched = serde_json::from_str::<Vec<ElectionResults>>(&raw_response).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].id, ApiId::from(first));
        assert_eq!(fetched[0].title, "Class President");
        assert_eq!(fetched[1].id, ApiId::from(second));
        assert_eq!(fetched[1].total_votes, 0);
    }

    #[rocket::async_test]
    async fn get_election_results() {
        let store = MemoryStore::new();
        let (first, _) = insert_elections(&store).await;
        let client = client_for(&store).await;

        let response = client.get(format!("/elections/{first}")).dispatch().await;
        assert_eq!(Status::Ok, response.status());

        let raw_response = response.into_string().await.unwrap();
        let results = serde_json::from_str::<ElectionResults>(&raw_response).unwrap();
        assert_eq!(results.total_votes, 10);
        assert_eq!(results.leader.as_deref(), Some("Bob"));
        assert_eq!(results.options[0].name, "Alice");
        assert_eq!(results.options[0].percentage, 30.0);
        assert_eq!(results.options[1].percentage, 70.0);
        assert!(raw_response.contains("\"totalVotes\":10"));
    }

    #[rocket::async_test]
    async fn get_missing_or_malformed_election() {
        let store = MemoryStore::new();
        let client = client_for(&store).await;

        let response = client
            .get(format!("/elections/{}", Id::new()))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let response = client.get("/elections/not-an-id").dispatch().await;
        assert_eq!(Status::BadRequest, response.status());

        let response = client.get("/elections/not-an-id/audit").dispatch().await;
        assert_eq!(Status::BadRequest, response.status());
    }

    #[rocket::async_test]
    async fn audit_election() {
        let store = MemoryStore::new();
        let (first, _) = insert_elections(&store).await;
        let client = client_for(&store).await;

        let response = client
            .get(format!("/elections/{first}/audit"))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let raw_response = response.into_string().await.unwrap();
        let report = serde_json::from_str::<AuditReport>(&raw_response).unwrap();
        assert_eq!(report.total_votes, 10);
        assert_eq!(report.voter_count, 10);

        // Tamper with the counters directly.
        let mut election = store.find_election(first).await.unwrap().unwrap();
        election.options[0].count += 1;
        store.overwrite_election(election).await;

        let response = client
            .get(format!("/elections/{first}/audit"))
            .dispatch()
            .await;
        assert_eq!(Status::InternalServerError, response.status());
        let raw_response = response.into_string().await.unwrap();
        assert!(!raw_response.contains("ledger"));
    }
}
