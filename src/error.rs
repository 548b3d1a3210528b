use rocket::{
    http::{Status, StatusClass},
    response::{status::Custom, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::mongodb::Id;
use crate::store::StoreError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed input; the caller's fault.
    #[error("{0}")]
    Validation(String),
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Election not found: {0}")]
    ElectionNotFound(Id),
    #[error("Invalid option '{option}' for election {election_id}")]
    InvalidOption { election_id: Id, option: String },
    /// A duplicate vote attempt. This is an expected outcome, not a fault.
    #[error("You have already voted in election {0}")]
    AlreadyVoted(Id),
    /// Transient storage failures persisted through every retry.
    #[error("Storage unavailable after {attempts} attempt(s): {source}")]
    StorageUnavailable {
        attempts: u32,
        #[source]
        source: StoreError,
    },
    /// Stored data violates an invariant. Never repaired automatically.
    #[error("Storage corruption: {0}")]
    StorageCorruption(String),
    /// Any other storage failure.
    #[error(transparent)]
    Store(StoreError),
}

impl Error {
    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) | Self::InvalidOption { .. } => Status::BadRequest,
            Self::UserNotFound(_) | Self::ElectionNotFound(_) => Status::NotFound,
            Self::AlreadyVoted(_) => Status::Forbidden,
            Self::StorageUnavailable { .. } | Self::StorageCorruption(_) | Self::Store(_) => {
                Status::InternalServerError
            }
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corruption(msg) => Self::StorageCorruption(msg),
            StoreError::Duplicate { field, value } => {
                Self::Validation(format!("{field} '{value}' is already in use"))
            }
            other => Self::Store(other),
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        let message = if status.class() == StatusClass::ServerError {
            // Keep storage internals in the log, not the response.
            error!("{self}");
            "Internal Server Error".to_string()
        } else {
            debug!("Rejected request: {self}");
            self.to_string()
        };
        Custom(status, Json(ErrorBody { error: message })).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        let id = Id::new();
        assert_eq!(Error::AlreadyVoted(id).status(), Status::Forbidden);
        assert_eq!(Error::ElectionNotFound(id).status(), Status::NotFound);
        assert_eq!(
            Error::UserNotFound("x@example.com".into()).status(),
            Status::NotFound
        );
        assert_eq!(
            Error::InvalidOption {
                election_id: id,
                option: "Nobody".into()
            }
            .status(),
            Status::BadRequest
        );
        assert_eq!(
            Error::from(StoreError::Transient("conn reset".into())).status(),
            Status::InternalServerError
        );
    }

    #[test]
    fn store_errors_are_classified() {
        assert!(matches!(
            Error::from(StoreError::Corruption("bad".into())),
            Error::StorageCorruption(_)
        ));
        assert!(matches!(
            Error::from(StoreError::Duplicate {
                field: "email",
                value: "a@b.c".into()
            }),
            Error::Validation(_)
        ));
    }
}
