use jsonwebtoken::errors::Error as JwtError;
use log::{debug, error};
use mongodb::{bson::oid::Error as OidError, error::Error as DbError};
use rocket::{
    http::{Status, StatusClass},
    response::{self, status, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::RequestId;
use crate::media::MediaError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] argon2::Error),
    #[error(transparent)]
    OidParse(#[from] OidError),
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    /// Create a 404 error for the named entity.
    pub fn not_found(what: impl AsRef<str>) -> Self {
        Self::Status(Status::NotFound, format!("{} not found", what.as_ref()))
    }

    /// Create a 422 error for invalid input.
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::Status(Status::UnprocessableEntity, message.into())
    }

    /// Create a 403 error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Status(Status::Forbidden, message.into())
    }

    /// Create a 401 error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Status(Status::Unauthorized, message.into())
    }

    /// Create a 400 error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, message.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Argon2(_) | Self::Media(_) => Status::InternalServerError,
            Self::Jwt(_) => Status::Unauthorized,
            Self::OidParse(_) => Status::UnprocessableEntity,
            Self::Status(status, _) => *status,
        }
    }

    /// The message shown to the client. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Db(_) | Self::Argon2(_) => "An unknown error occurred.".to_string(),
            Self::Jwt(_) => "Unauthorized. Invalid token".to_string(),
            Self::OidParse(_) => "Invalid identifier.".to_string(),
            Self::Media(_) => "Image upload failed. Try again.".to_string(),
            Self::Status(_, message) => message.clone(),
        }
    }
}

/// The JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        let id = RequestId::of(req);
        if status.class() == StatusClass::ServerError {
            error!("  req{id} failed: {self}");
        } else {
            debug!("  req{id} rejected: {self}");
        }
        status::Custom(status, Json(ErrorBody::new(self.public_message()))).respond_to(req)
    }
}
