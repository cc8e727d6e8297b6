use mongodb::results::InsertOneResult;
use rocket::http::Status;

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

/// The ID the database assigned to a freshly inserted document.
pub fn inserted_id(result: &InsertOneResult) -> Result<Id> {
    result
        .inserted_id
        .as_object_id()
        .map(Id::from)
        .ok_or_else(|| {
            Error::Status(
                Status::InternalServerError,
                format!("Unexpected inserted ID {}", result.inserted_id),
            )
        })
}
