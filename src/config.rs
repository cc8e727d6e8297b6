use std::sync::Arc;

use chrono::Duration;
use log::{error, info, warn};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::media::{Media, MemoryMediaHost, RemoteMediaHost};
use crate::model::mongodb::{ensure_indexes_exist, TransactionSupport};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    #[serde(default)]
    admin_emails: StringList,
    // secrets
    jwt_secret: String,
}

impl Config {
    /// Valid lifetime of auth tokens in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Is a voter registering with this e-mail made an administrator?
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.trim().eq_ignore_ascii_case(email.trim()))
    }
}

/// A list of strings that may be configured either as a list or as a single
/// comma-separated string, as is convenient in environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "RawStringList")]
pub struct StringList(Vec<String>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStringList {
    List(Vec<String>),
    Joined(String),
}

impl From<RawStringList> for StringList {
    fn from(raw: RawStringList) -> Self {
        let items = match raw {
            RawStringList::List(items) => items,
            RawStringList::Joined(joined) => joined.split(',').map(str::to_string).collect(),
        };
        Self(
            items
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        )
    }
}

impl From<Vec<String>> for StringList {
    fn from(items: Vec<String>) -> Self {
        RawStringList::List(items).into()
    }
}

impl std::ops::Deref for StringList {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.admin_emails.is_empty() {
            warn!("No admin e-mails configured, nobody can manage elections");
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

fn default_db_name() -> String {
    "ballotbox".to_string()
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places a `Client`, a `Database` and the
/// deployment's [`TransactionSupport`] into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&config.db_name);

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }

        // Find out once whether writes can be grouped into transactions.
        let transactions = match TransactionSupport::probe(&client).await {
            Ok(support) => support,
            Err(e) => {
                error!("Failed to query database deployment: {e}");
                return Err(rocket);
            }
        };
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db).manage(transactions);
        Ok(rocket)
    }
}

/// Where uploaded images are kept.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaBackend {
    /// The remote media host.
    #[default]
    Remote,
    /// Process memory; images are lost on restart.
    Memory,
}

fn default_media_folder() -> String {
    "ballotbox".to_string()
}

/// Configuration for the media host.
#[derive(Deserialize)]
struct MediaConfig {
    // non-secrets
    #[serde(default)]
    media_backend: MediaBackend,
    #[serde(default = "default_media_folder")]
    media_folder: String,
    media_url: Option<String>,
    // secrets
    media_api_key: Option<String>,
    media_api_secret: Option<String>,
}

/// A fairing that loads the media host config and places a [`Media`] handle
/// into managed state.
pub struct MediaFairing;

#[rocket::async_trait]
impl Fairing for MediaFairing {
    fn info(&self) -> Info {
        Info {
            name: "Media host",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<MediaConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load media host config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let media = match config.media_backend {
            MediaBackend::Remote => {
                match (config.media_url, config.media_api_key, config.media_api_secret) {
                    (Some(url), Some(key), Some(secret)) => {
                        info!("Storing images on {url}");
                        Media::new(
                            Arc::new(RemoteMediaHost::new(url, key, secret)),
                            config.media_folder,
                        )
                    }
                    _ => {
                        error!("`media_url`, `media_api_key` and `media_api_secret` must be set for the remote media host");
                        return Err(rocket);
                    }
                }
            }
            MediaBackend::Memory => {
                warn!("Storing images in memory, they will be lost on shutdown");
                Media::new(Arc::new(MemoryMediaHost::new()), config.media_folder)
            }
        };

        // Manage the state.
        rocket = rocket.manage(media);
        Ok(rocket)
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self::example_with_secret("test jwt secret")
        }

        pub fn example_with_secret(secret: &str) -> Self {
            Self {
                auth_ttl: 3600,
                admin_emails: vec!["admin@example.com".to_string()].into(),
                jwt_secret: secret.to_string(),
            }
        }
    }
}
