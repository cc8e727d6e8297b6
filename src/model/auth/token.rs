use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{
    errors::Error as JwtError, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration,
    Request,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{api::id::ApiId, voter::Voter};

use super::{GuardFailure, Rights};

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// An authentication token representing a specific voter with specific rights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub id: ApiId,
    /// The voter's rights when the token was issued, for clients to read.
    /// Admin checks on the server go by the stored voter instead.
    #[serde(rename = "rgt")]
    pub rights: Rights,
}

impl AuthToken {
    /// Create a new [`AuthToken`] for the given voter.
    pub fn new(voter: &Voter) -> Self {
        Self {
            id: voter.id.into(),
            rights: Rights::from_admin_flag(voter.is_admin),
        }
    }

    /// Sign this token into a JWT that expires after the configured lifetime.
    pub fn encode(self, config: &Config) -> Result<String, JwtError> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.auth_ttl(),
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
    }

    /// Verify and decode a JWT.
    pub fn decode(jwt: &str, config: &Config) -> Result<Self, JwtError> {
        jsonwebtoken::decode(
            jwt,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.token)
    }

    /// Wrap an encoded JWT in the authentication cookie.
    pub fn cookie(jwt: String, config: &Config) -> Cookie<'static> {
        Cookie::build(AUTH_TOKEN_COOKIE, jwt)
            .path("/")
            .max_age(Duration::seconds(config.auth_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Lax)
            .finish()
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: AuthToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// Find the raw JWT: a bearer `Authorization` header takes precedence over the cookie.
fn raw_token(req: &Request<'_>) -> Option<String> {
    if let Some(header) = req.headers().get_one("Authorization") {
        if let Some(jwt) = header.strip_prefix("Bearer ") {
            return Some(jwt.trim().to_string());
        }
    }
    req.cookies()
        .get(AUTH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    /// Get an [`AuthToken`] from the request and verify its signature and expiry.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let Some(config) = req.rocket().state::<Config>() else {
            return Outcome::Failure((
                Status::InternalServerError,
                Error::Status(Status::InternalServerError, "Config unavailable".to_string()),
            ));
        };

        let jwt = match raw_token(req) {
            Some(jwt) => jwt,
            None => {
                GuardFailure::record(req, "Unauthorized. No token");
                return Outcome::Failure((
                    Status::Unauthorized,
                    Error::unauthorized("Unauthorized. No token"),
                ));
            }
        };

        match Self::decode(&jwt, config) {
            Ok(token) => Outcome::Success(token),
            Err(e) => {
                GuardFailure::record(req, "Unauthorized. Invalid token");
                Outcome::Failure((Status::Unauthorized, e.into()))
            }
        }
    }
}
