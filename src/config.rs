use std::sync::Arc;
use std::time::Duration;

use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::coordinator::RetryPolicy;
use crate::model::mongodb::ensure_indexes_exist;
use crate::store::{MongoStore, SharedStore};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_max_attempts")]
    vote_max_attempts: u32,
    #[serde(default = "default_retry_base_ms")]
    vote_retry_base_ms: u64,
    #[serde(default = "default_retry_max_ms")]
    vote_retry_max_ms: u64,
}

fn default_max_attempts() -> u32 {
    RetryPolicy::default().max_attempts
}

fn default_retry_base_ms() -> u64 {
    RetryPolicy::default().base_delay.as_millis() as u64
}

fn default_retry_max_ms() -> u64 {
    RetryPolicy::default().max_delay.as_millis() as u64
}

impl Config {
    /// How the vote coordinator retries transient storage failures.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.vote_max_attempts.max(1),
            base_delay: Duration::from_millis(self.vote_retry_base_ms),
            max_delay: Duration::from_millis(self.vote_retry_max_ms.max(self.vote_retry_base_ms)),
        }
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        debug!("Vote retry policy: {:?}", config.retry_policy());
        Ok(rocket.manage(config))
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
}

fn default_db_name() -> String {
    "votekeep".to_string()
}

/// A fairing that loads the MongoDB config, connects to the database,
/// ensures the indexes exist, and places the `Client`, the `Database` and a
/// MongoDB-backed [`SharedStore`] into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&database_name(config.db_name));

        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        let store: SharedStore = Arc::new(MongoStore::new(client.clone(), &db));
        Ok(rocket.manage(client).manage(db).manage(store))
    }
}

/// The name of the database to use (production version).
#[cfg(not(test))]
fn database_name(configured: String) -> String {
    configured
}

/// The name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn database_name(configured: String) -> String {
    let random: u32 = rand::random();
    let db = format!("{configured}_test{random}");
    info!("Using database {db}");
    db
}

#[cfg(test)]
mod tests {
    use rocket::figment::{providers::Serialized, Figment};

    use super::*;

    #[test]
    fn defaults_apply() {
        let config = Figment::new().extract::<Config>().unwrap();
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn overrides_are_sanitised() {
        let figment = Figment::new()
            .merge(Serialized::default("vote_max_attempts", 0))
            .merge(Serialized::default("vote_retry_base_ms", 50))
            .merge(Serialized::default("vote_retry_max_ms", 20));
        let policy = figment.extract::<Config>().unwrap().retry_policy();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(50));
        assert_eq!(policy.max_delay, Duration::from_millis(50));
    }
}
