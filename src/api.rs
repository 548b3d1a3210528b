use mongodb::bson::oid::Error as IdError;
use rocket::{
    http::Status, response::status::Custom, serde::json::Json, Catcher, Request, Route,
};

use crate::error::{Error, ErrorBody, Result};
use crate::model::mongodb::Id;

mod elections;
mod users;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(voting::routes());
    routes.extend(elections::routes());
    routes.extend(users::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![default_catcher]
}

/// Anything not handled by a route still gets a JSON error body.
#[catch(default)]
fn default_catcher(status: Status, _req: &Request) -> Custom<Json<ErrorBody>> {
    let error = status.reason().unwrap_or("Unknown Error").to_string();
    Custom(status, Json(ErrorBody { error }))
}

/// An ID taken straight from the path, possibly malformed.
type IdParam = std::result::Result<Id, IdError>;

/// Turn a malformed path ID into a 400 rather than an unmatched route.
fn require_id(param: IdParam, what: &str) -> Result<Id> {
    param.map_err(|_| Error::Validation(format!("Malformed {what} ID")))
}
