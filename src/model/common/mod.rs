//! Types and logic shared between the DB and API representations.

pub mod tally;
