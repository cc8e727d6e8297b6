use chrono::{DateTime, Utc};
use rocket::fs::TempFile;
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, candidate::Candidate};

/// Multipart form used to add a candidate to an election.
#[derive(Debug, FromForm)]
pub struct CandidateForm<'r> {
    #[field(name = "fullName")]
    pub full_name: Option<String>,
    pub motto: Option<String>,
    #[field(name = "currentElection")]
    pub current_election: Option<String>,
    pub image: Option<TempFile<'r>>,
}

/// An API-friendly candidate description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescription {
    pub id: ApiId,
    pub full_name: String,
    pub motto: String,
    /// URL of the candidate's image.
    pub image: String,
    pub vote_count: u32,
    pub election: ApiId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        let core = candidate.candidate;
        Self {
            id: candidate.id.into(),
            full_name: core.full_name,
            motto: core.motto,
            image: core.image,
            vote_count: core.vote_count,
            election: core.election.into(),
            created_at: core.created_at,
            updated_at: core.updated_at,
        }
    }
}

/// Response to a successfully added candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCreated {
    pub message: String,
    pub candidate: CandidateDescription,
}

/// A vote for a candidate in the selected election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(default)]
    pub selected_election: Option<String>,
}
