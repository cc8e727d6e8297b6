use argon2::Config as Argon2Config;
use chrono::{DateTime, SubsecRound, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core voter user data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterCore {
    pub full_name: String,
    /// Lower-cased login e-mail; unique across voters.
    pub email: String,
    /// Argon2 encoded password hash. Never leaves the server.
    pub password_hash: String,
    /// Elections this voter has voted in. Each appears at most once.
    #[serde(default)]
    pub voted_elections: Vec<Id>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl VoterCore {
    /// Create a new voter, hashing the password.
    pub fn new(
        full_name: String,
        email: String,
        password: &str,
        is_admin: bool,
    ) -> Result<Self, argon2::Error> {
        // 16 bytes is recommended for password hashing:
        //  https://en.wikipedia.org/wiki/Argon2
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(password.as_bytes(), &salt, &Argon2Config::default())?;

        // The database keeps millisecond precision.
        let now = Utc::now().trunc_subsecs(3);
        Ok(Self {
            full_name,
            email,
            password_hash,
            voted_elections: Vec::new(),
            is_admin,
            created_at: now,
            updated_at: now,
        })
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> Result<bool, argon2::Error> {
        argon2::verify_encoded(&self.password_hash, password.as_ref())
    }

    /// Has this voter already voted in the given election?
    pub fn has_voted_in(&self, election: Id) -> bool {
        self.voted_elections.contains(&election)
    }
}
