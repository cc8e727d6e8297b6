use chrono::{DateTime, Utc};
use rocket::fs::TempFile;
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, election::Election};

/// Multipart form used to create or update an election.
///
/// Every field is optional here so that missing input is reported with a
/// readable message rather than a form error.
#[derive(Debug, FromForm)]
pub struct ElectionForm<'r> {
    pub title: Option<String>,
    pub description: Option<String>,
    pub club: Option<TempFile<'r>>,
}

/// An API-friendly election description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    /// URL of the club image.
    pub club: String,
    pub candidates: Vec<ApiId>,
    pub voters: Vec<ApiId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        let core = election.election;
        Self {
            id: election.id.into(),
            title: core.title,
            description: core.description,
            club: core.club,
            candidates: core.candidates.into_iter().map(ApiId::from).collect(),
            voters: core.voters.into_iter().map(ApiId::from).collect(),
            created_at: core.created_at,
            updated_at: core.updated_at,
        }
    }
}

/// A plain confirmation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
