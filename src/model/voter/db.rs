use std::ops::{Deref, DerefMut};

use rocket::{
    http::Status,
    outcome::try_outcome,
    request::{self, FromRequest, Request},
};
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    model::{
        auth::{AuthToken, GuardFailure},
        mongodb::{Coll, Id},
    },
};

use super::voter_core::VoterCore;

/// A voter user from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Voter {
    /// Fail with 403 unless this voter is an administrator.
    pub fn require_admin(&self) -> Result<(), Error> {
        if self.is_admin {
            Ok(())
        } else {
            Err(Error::forbidden("Only an admin can perform this action."))
        }
    }
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Voter {
    type Error = Error;

    /// The authenticated voter, looked up from their token.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let auth_token = try_outcome!(req.guard::<AuthToken>().await);

        let voters = match req.guard::<Coll<Self>>().await {
            request::Outcome::Success(voters) => voters,
            _ => {
                return request::Outcome::Failure((
                    Status::InternalServerError,
                    Error::Status(Status::InternalServerError, "Database unavailable".to_string()),
                ))
            }
        };

        match voters.find_one(auth_token.id.as_doc(), None).await {
            Ok(Some(voter)) => request::Outcome::Success(voter),
            Ok(None) => {
                GuardFailure::record(req, "Unauthorized. Unknown voter");
                request::Outcome::Failure((
                    Status::Unauthorized,
                    Error::unauthorized("Unauthorized. Unknown voter"),
                ))
            }
            Err(e) => request::Outcome::Failure((Status::InternalServerError, e.into())),
        }
    }
}
