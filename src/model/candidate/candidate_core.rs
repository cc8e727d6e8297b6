use chrono::{DateTime, SubsecRound, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::media::StoredImage;
use crate::model::mongodb::Id;

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateCore {
    pub full_name: String,
    pub motto: String,
    /// URL of the candidate's image.
    pub image: String,
    /// Media host identifier of the image.
    pub image_id: String,
    /// Accepted votes. Only ever incremented, one per vote.
    #[serde(default)]
    pub vote_count: u32,
    /// The election this candidate stands in.
    pub election: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl CandidateCore {
    /// Create a new candidate with no votes.
    pub fn new(full_name: String, motto: String, image: StoredImage, election: Id) -> Self {
        // The database keeps millisecond precision.
        let now = Utc::now().trunc_subsecs(3);
        Self {
            full_name,
            motto,
            image: image.url,
            image_id: image.id,
            vote_count: 0,
            election,
            created_at: now,
            updated_at: now,
        }
    }
}
