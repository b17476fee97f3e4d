use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors from the photo object store.
#[derive(Debug, Error)]
pub enum UploadError {
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Storage API returned a non-success status code.
    #[error("upload rejected ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response did not contain a usable URL.
    #[error("malformed upload response: {0}")]
    Malformed(String),
}

/// Stores a photo and returns a URL it can be fetched from.
#[async_trait]
pub trait PhotoUploader: Send + Sync {
    async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, UploadError>;
}

#[derive(serde::Deserialize)]
struct UploadResponse {
    url: Option<String>,
}

/// Multipart upload to `POST {base_url}/upload/farm-photo`.
pub struct HttpPhotoUploader {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPhotoUploader {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("farmcred/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl PhotoUploader for HttpPhotoUploader {
    async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, UploadError> {
        let size = bytes.len();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)?;
        let form = reqwest::multipart::Form::new().part("photo", part);

        let url = format!("{}/upload/farm-photo", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            tracing::warn!(file_name, status, "photo upload rejected");
            return Err(UploadError::Api {
                status,
                message: resp.text().await.unwrap_or_default(),
            });
        }

        let body: UploadResponse = resp.json().await?;
        let stored = body
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| UploadError::Malformed("missing url".to_string()))?;
        tracing::info!(file_name, size, url = %stored, "photo uploaded");
        Ok(stored)
    }
}
