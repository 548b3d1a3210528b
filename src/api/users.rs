use rocket::{serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::api::{user::UserDescription, vote::VoterRef};
use crate::tally::TallyReader;

use super::{require_id, IdParam};

pub fn routes() -> Vec<Route> {
    routes![user_by_email, user_by_id]
}

#[get("/users?<email>")]
async fn user_by_email(
    email: Option<String>,
    reader: TallyReader<'_>,
) -> Result<Json<UserDescription>> {
    let email = email
        .filter(|email| !email.trim().is_empty())
        .ok_or_else(|| Error::Validation("Email is required".to_string()))?;
    let user = reader.find_user(&VoterRef::Email(email)).await?;
    Ok(Json(user.into()))
}

#[get("/users/<user_id>")]
async fn user_by_id(user_id: IdParam, reader: TallyReader<'_>) -> Result<Json<UserDescription>> {
    let user_id = require_id(user_id, "user")?;
    let user = reader.find_user(&VoterRef::Id(user_id)).await?;
    Ok(Json(user.into()))
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
    use crate::store::MemoryStore;

    use super::*;

    async fn client_for(store: &MemoryStore) -> Client {
        Client::tracked(crate::build_with_store(Arc::new(store.clone())))
            .await
            .unwrap()
    }

    #[rocket::async_test]
    async fn lookup_by_email_and_id() {
        let store = MemoryStore::new();
        let user_id = store.insert_user(UserCore::example()).await.unwrap();
        let election_id = store.insert_election(ElectionCore::example()).await.unwrap();
        Coordinator::new(&store, RetryPolicy::immediate(1))
            .cast_vote(user_id, election_id, "Alice")
            .await
            .unwrap();
        let client = client_for(&store).await;

        let response = client
            .get(uri!(user_by_email(Some("ada@example.com"))))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let raw_response = response.into_string().await.unwrap();
        let by_email = serde_json::from_str::<UserDescription>(&raw_response).unwrap();
        assert_eq!(by_email.id, ApiId::from(user_id));
        assert_eq!(by_email.name, "Ada");
        assert_eq!(by_email.voted_elections, vec![ApiId::from(election_id)]);
        assert!(!raw_response.contains("password"));

        let response = client.get(format!("/users/{user_id}")).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let raw_response = response.into_string().await.unwrap();
        let by_id = serde_json::from_str::<UserDescription>(&raw_response).unwrap();
        assert_eq!(by_id, by_email);
    }

    #[rocket::async_test]
    async fn lookup_failures() {
        let store = MemoryStore::new();
        let client = client_for(&store).await;

        let response = client.get("/users").dispatch().await;
        assert_eq!(Status::BadRequest, response.status());

        let response = client
            .get(uri!(user_by_email(Some("nobody@example.com"))))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let response = client.get(format!("/users/{}", Id::new())).dispatch().await;
        assert_eq!(Status::NotFound, response.status());

        let response = client.get("/users/123").dispatch().await;
        assert_eq!(Status::BadRequest, response.status());
    }
}
