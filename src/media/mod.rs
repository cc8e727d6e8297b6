//! Remote image storage.
//!
//! Election and candidate images live on a media host. The rest of the
//! server only sees the [`MediaHost`] trait and the [`Media`] handle kept in
//! managed state.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;

use crate::model::api::image::ImageUpload;

mod memory;
mod remote;

pub use memory::MemoryMediaHost;
pub use remote::RemoteMediaHost;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("media host request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("media host rejected the request: {0}")]
    Rejected(String),
    #[error("image {0} not found on media host")]
    NotFound(String),
}

/// An image that has been stored on the media host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Public URL the image is served from.
    pub url: String,
    /// Identifier used to delete the image again.
    pub id: String,
}

/// A service able to store and delete images.
#[rocket::async_trait]
pub trait MediaHost: Send + Sync {
    /// Store the image inside `folder`.
    async fn upload(&self, image: &ImageUpload, folder: &str) -> Result<StoredImage, MediaError>;

    /// Delete a previously stored image.
    async fn destroy(&self, id: &str) -> Result<(), MediaError>;
}

/// The folders images are sorted into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Folder {
    Elections,
    Candidates,
}

impl Display for Folder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Elections => write!(f, "elections"),
            Self::Candidates => write!(f, "candidates"),
        }
    }
}

/// Managed handle on the configured media host.
#[derive(Clone)]
pub struct Media {
    host: Arc<dyn MediaHost>,
    root_folder: String,
}

impl Media {
    pub fn new(host: Arc<dyn MediaHost>, root_folder: impl Into<String>) -> Self {
        Self {
            host,
            root_folder: root_folder.into(),
        }
    }

    /// Upload an image into the given folder under the configured root.
    pub async fn upload(&self, image: &ImageUpload, folder: Folder) -> Result<StoredImage, MediaError> {
        let folder = format!("{}/{folder}", self.root_folder);
        self.host.upload(image, &folder).await
    }

    /// Delete an image. Failures are logged and otherwise ignored, so that
    /// the database operation the deletion belongs to still goes ahead.
    pub async fn destroy_quietly(&self, id: &str) {
        if id.is_empty() {
            return;
        }
        match self.host.destroy(id).await {
            Ok(()) => debug!("Deleted image {id}"),
            Err(e) => warn!("Failed to delete image {id}: {e}"),
        }
    }
}
