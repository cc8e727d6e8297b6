use std::collections::BTreeMap;

use chrono::Utc;
use data_encoding::HEXLOWER;
use log::debug;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{MediaError, MediaHost, StoredImage};
use crate::model::api::image::ImageUpload;

/// A media host reached over HTTP using signed requests.
///
/// Every request carries the API key, a timestamp and a signature: the
/// SHA-256 of the key-sorted signed parameters joined as `k=v&k=v`,
/// followed by the API secret.
pub struct RemoteMediaHost {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Deserialize)]
struct UploadReply {
    secure_url: String,
    public_id: String,
}

#[derive(Deserialize)]
struct DestroyReply {
    result: String,
}

impl RemoteMediaHost {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Compute the signature for the given parameters.
    fn signature(&self, params: &BTreeMap<&'static str, String>) -> String {
        let joined = params
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        HEXLOWER.encode(&hasher.finalize())
    }

    /// Add the timestamp, then the credentials and signature, to the given parameters.
    fn sign(&self, mut params: BTreeMap<&'static str, String>) -> BTreeMap<&'static str, String> {
        params.insert("timestamp", Utc::now().timestamp().to_string());
        let signature = self.signature(&params);
        params.insert("api_key", self.api_key.clone());
        params.insert("signature", signature);
        params.insert("signature_algorithm", "sha256".to_string());
        params
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/image/{action}", self.base_url)
    }
}

/// Turn a non-success response into an error, keeping the body for the logs.
async fn check_status(response: Response) -> Result<Response, MediaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MediaError::Rejected(format!("{status}: {body}")))
}

#[rocket::async_trait]
impl MediaHost for RemoteMediaHost {
    async fn upload(&self, image: &ImageUpload, folder: &str) -> Result<StoredImage, MediaError> {
        let public_id = HEXLOWER.encode(&rand::random::<[u8; 16]>());
        let params = self.sign(BTreeMap::from([
            ("folder", folder.to_string()),
            ("public_id", public_id),
        ]));

        let file = Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone().unwrap_or_else(|| "upload".to_string()))
            .mime_str(&image.content_type.to_string())?;
        let form = params
            .into_iter()
            .fold(Form::new().part("file", file), |form, (key, value)| {
                form.text(key, value)
            });

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        let reply: UploadReply = check_status(response).await?.json().await?;
        debug!("Uploaded image {}", reply.public_id);

        Ok(StoredImage {
            url: reply.secure_url,
            id: reply.public_id,
        })
    }

    async fn destroy(&self, id: &str) -> Result<(), MediaError> {
        let params = self.sign(BTreeMap::from([("public_id", id.to_string())]));
        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await?;
        let reply: DestroyReply = check_status(response).await?.json().await?;

        match reply.result.as_str() {
            "ok" => Ok(()),
            "not found" => Err(MediaError::NotFound(id.to_string())),
            other => Err(MediaError::Rejected(other.to_string())),
        }
    }
}
