use std::ops::{Deref, DerefMut};

use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

use super::election_core::ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Election {
    /// Filter matching the election with this ID, unless it has been soft-deleted.
    pub fn active_filter(id: Id) -> Document {
        doc! {
            "_id": id,
            "isDeleted": false,
        }
    }

    /// Filter matching every election that has not been soft-deleted.
    pub fn all_active_filter() -> Document {
        doc! { "isDeleted": false }
    }
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}
