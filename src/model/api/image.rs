use rocket::{
    fs::TempFile,
    http::{ContentType, Status},
    tokio::fs,
};

use crate::error::{Error, Result};

/// Largest accepted image, in bytes.
pub const MAX_IMAGE_SIZE: usize = 1_000_000;

/// Accepted image subtypes, all under `image/`.
const ALLOWED_SUBTYPES: &[&str] = &["jpeg", "jpg", "png", "webp"];

/// A validated image, read fully into memory and ready for the media host.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub content_type: ContentType,
    pub file_name: Option<String>,
}

impl ImageUpload {
    /// Validate the content type and size of an image.
    pub fn new(bytes: Vec<u8>, content_type: ContentType, file_name: Option<String>) -> Result<Self> {
        check_content_type(&content_type)?;
        check_size(bytes.len())?;
        Ok(Self {
            bytes,
            content_type,
            file_name,
        })
    }

    /// Read and validate a file submitted in a multipart form.
    ///
    /// A missing or empty file is rejected with `missing` as the message.
    pub async fn from_form_file(file: Option<TempFile<'_>>, missing: &str) -> Result<Self> {
        let file = file
            .filter(|file| file.len() > 0)
            .ok_or_else(|| Error::unprocessable(missing))?;

        // Check before reading anything in.
        let content_type = file.content_type().cloned().unwrap_or(ContentType::Binary);
        check_content_type(&content_type)?;
        check_size(file.len() as usize)?;

        let path = file.path().ok_or_else(|| Error::unprocessable(missing))?;
        let bytes = fs::read(path).await.map_err(|e| {
            Error::Status(
                Status::InternalServerError,
                format!("Failed to read uploaded image: {e}"),
            )
        })?;

        Self::new(bytes, content_type, file.name().map(str::to_string))
    }
}

fn check_content_type(content_type: &ContentType) -> Result<()> {
    let allowed = content_type.top().as_str().eq_ignore_ascii_case("image")
        && ALLOWED_SUBTYPES
            .iter()
            .any(|sub| content_type.sub().as_str().eq_ignore_ascii_case(sub));
    if allowed {
        Ok(())
    } else {
        Err(Error::unprocessable("Only JPG, PNG or WEBP images allowed"))
    }
}

fn check_size(len: usize) -> Result<()> {
    if len > MAX_IMAGE_SIZE {
        Err(Error::unprocessable("Image size must be less than 1MB"))
    } else {
        Ok(())
    }
}
