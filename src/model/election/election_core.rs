use chrono::{DateTime, SubsecRound, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::media::StoredImage;
use crate::model::mongodb::Id;

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionCore {
    /// Election title.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// URL of the club image.
    pub club: String,
    /// Media host identifier of the club image.
    pub image_id: String,
    /// Candidates standing in this election, in the order they were added.
    #[serde(default)]
    pub candidates: Vec<Id>,
    /// Voters who have voted in this election.
    #[serde(default)]
    pub voters: Vec<Id>,
    /// Soft-delete flag; deleted elections are hidden from every read.
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl ElectionCore {
    /// Create a new, empty election.
    pub fn new(title: String, description: String, image: StoredImage) -> Self {
        // The database keeps millisecond precision.
        let now = Utc::now().trunc_subsecs(3);
        Self {
            title,
            description,
            club: image.url,
            image_id: image.id,
            candidates: Vec::new(),
            voters: Vec::new(),
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl ElectionCore {
        pub fn example() -> Self {
            Self::new(
                "Chess club president".to_string(),
                "Annual election for the chess club committee.".to_string(),
                StoredImage {
                    url: "memory://ballotbox/elections/chess".to_string(),
                    id: "ballotbox/elections/chess".to_string(),
                },
            )
        }
    }
}
