#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{
    figment::{providers::Env, Figment},
    Build, Rocket,
};

use crate::config::{ConfigFairing, DatabaseFairing, MediaFairing};
use crate::cors::CorsFairing;
use crate::logging::LoggerFairing;

pub mod api;
pub mod config;
pub mod cors;
pub mod error;
pub mod logging;
pub mod media;
pub mod model;

pub use config::Config;

/// Rocket's own configuration sources, plus the plain `PORT`, `MONGODB_URI`
/// and `ALLOWED_ORIGINS` environment variables hosting platforms tend to set.
pub fn figment() -> Figment {
    rocket::Config::figment()
        .merge(Env::raw().only(&["PORT", "ALLOWED_ORIGINS"]))
        .merge(Env::raw().only(&["MONGODB_URI"]).map(|_| "db_uri".into()))
}

/// Assemble the server. Configuration is loaded, and the database connected,
/// when the returned instance is ignited.
pub fn build() -> Rocket<Build> {
    rocket::custom(figment())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(MediaFairing)
        .attach(CorsFairing)
        .mount("/api", api::routes())
        .mount("/", cors::routes())
        .register("/", api::catchers())
}

/// Environment variable holding the MongoDB URI the database tests run against.
/// `#[backend_test]` marks those tests ignored when it is unset at build time.
#[cfg(test)]
const TEST_DB_URI_VAR: &str = "BALLOTBOX_TEST_DB_URI";

/// Connect to the test database server.
#[cfg(test)]
async fn test_db_client() -> mongodb::Client {
    let uri = std::env::var(TEST_DB_URI_VAR)
        .unwrap_or_else(|_| panic!("Set {TEST_DB_URI_VAR} to run database tests"));
    mongodb::Client::with_uri_str(&uri)
        .await
        .unwrap_or_else(|e| panic!("Could not connect to test database at {uri}: {e}"))
}

/// Get the name of the database to use for a test.
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn test_database_name() -> String {
    let random: u32 = rand::random();
    format!("ballotbox_test{random}")
}

/// Build a server against the given test database, with an in-memory media
/// host and example configuration instead of the ignite-time fairings.
#[cfg(test)]
async fn rocket_for_tests(db_client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    use std::sync::Arc;

    use crate::media::{Media, MemoryMediaHost};
    use crate::model::mongodb::{ensure_indexes_exist, TransactionSupport};

    let db = db_client.database(db_name);
    ensure_indexes_exist(&db).await.unwrap();
    let transactions = TransactionSupport::probe(&db_client).await.unwrap();
    let images = Arc::new(MemoryMediaHost::new());

    rocket::custom(figment())
        .attach(CorsFairing)
        .manage(Config::example())
        .manage(db_client)
        .manage(db)
        .manage(transactions)
        .manage(Media::new(images.clone(), "test"))
        .manage(images)
        .mount("/api", api::routes())
        .mount("/", cors::routes())
        .register("/", api::catchers())
}
