//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs are serialised in MongoDB's own format.
//! - Field names match the collections written by earlier deployments.

pub mod election;
pub use election::{Election, ElectionCore, ElectionOption, NewElection};

pub mod user;
pub use user::{NewUser, User, UserCore};
