use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use data_encoding::HEXLOWER;

use super::{MediaError, MediaHost, StoredImage};
use crate::model::api::image::ImageUpload;

/// A media host that keeps images in memory.
/// Used for local development and tests.
#[derive(Debug, Default)]
pub struct MemoryMediaHost {
    images: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryMediaHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Is an image with this ID currently stored?
    pub fn contains(&self, id: &str) -> bool {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Number of images currently stored.
    pub fn len(&self) -> usize {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[rocket::async_trait]
impl MediaHost for MemoryMediaHost {
    async fn upload(&self, image: &ImageUpload, folder: &str) -> Result<StoredImage, MediaError> {
        let id = format!("{folder}/{}", HEXLOWER.encode(&rand::random::<[u8; 12]>()));
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), image.bytes.clone());
        Ok(StoredImage {
            url: format!("memory://{id}"),
            id,
        })
    }

    async fn destroy(&self, id: &str) -> Result<(), MediaError> {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| MediaError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use rocket::http::ContentType;

    use super::*;

    #[rocket::async_test]
    async fn upload_then_destroy() {
        let host = MemoryMediaHost::new();
        let image = ImageUpload::new(vec![1, 2, 3], ContentType::PNG, None).unwrap();

        let stored = host.upload(&image, "root/elections").await.unwrap();
        assert!(stored.id.starts_with("root/elections/"));
        assert!(host.contains(&stored.id));
        assert_eq!(host.len(), 1);

        host.destroy(&stored.id).await.unwrap();
        assert!(host.is_empty());
        assert!(matches!(
            host.destroy(&stored.id).await,
            Err(MediaError::NotFound(_))
        ));
    }
}
