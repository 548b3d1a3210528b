use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::User};

/// Public view of a user: no credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDescription {
    pub id: ApiId,
    pub email: String,
    pub name: String,
    pub voted_elections: Vec<ApiId>,
}

impl From<User> for UserDescription {
    fn from(user: User) -> Self {
        Self {
            id: user.id.into(),
            email: user.user.email,
            name: user.user.name,
            voted_elections: user
                .user
                .voted_elections
                .into_iter()
                .map(ApiId::from)
                .collect(),
        }
    }
}
