#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{ConfigFairing, DatabaseFairing};
use crate::logging::LoggerFairing;
use crate::store::SharedStore;

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod model;
pub mod store;
pub mod tally;

pub use config::Config;

/// The server as deployed: MongoDB-backed, configured from the figment.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
}

/// The server over an existing store, e.g. a [`store::MemoryStore`].
pub fn build_with_store(store: SharedStore) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .manage(store)
}

/// The MongoDB URI for database-backed tests: `TEST_DB_URI` if set, otherwise
/// the `db_uri` the figment would give the server.
#[cfg(test)]
fn test_db_uri(figment: &rocket::figment::Figment, env_uri: Option<String>) -> String {
    env_uri.unwrap_or_else(|| {
        figment
            .extract_inner::<String>("db_uri")
            .expect("set `TEST_DB_URI` or `db_uri` to a MongoDB replica set")
    })
}

/// A MongoDB client for database-backed tests. Transactions need the URI to
/// point at a replica set.
#[cfg(test)]
async fn test_db_client() -> mongodb::Client {
    let db_uri = test_db_uri(
        &rocket::Config::figment(),
        std::env::var("TEST_DB_URI").ok(),
    );
    let client = mongodb::Client::with_uri_str(&db_uri)
        .await
        .unwrap_or_else(|err| panic!("Could not connect to database with `db_uri` \"{db_uri}\": {err}"));
    client
        .database("admin")
        .run_command(mongodb::bson::doc! { "ping": 1 }, None)
        .await
        .unwrap_or_else(|err| panic!("No database reachable at `db_uri` \"{db_uri}\": {err}"));
    client
}

/// A fresh database name per test, so tests can run in parallel.
#[cfg(test)]
fn test_database_name() -> String {
    let random: u32 = rand::random();
    format!("votekeep_test{random}")
}

/// The MongoDB-backed server over the given test database.
#[cfg(test)]
async fn rocket_for_db(db_client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    let db = db_client.database(db_name);
    model::mongodb::ensure_indexes_exist(&db).await.unwrap();
    let store: SharedStore = std::sync::Arc::new(store::MongoStore::new(db_client.clone(), &db));
    build_with_store(store).manage(db_client).manage(db)
}
