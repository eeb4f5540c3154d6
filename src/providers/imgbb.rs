//! ImgBB image hosting client.

use super::{ensure_success, HostedImage, ImageHost};
use crate::error::{ConjureError, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

/// HTTP client for the ImgBB upload API.
pub struct ImgbbClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ImgbbClient {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

/// Read an upload response. ImgBB reports failures both as HTTP errors and
/// as `success: false` bodies.
pub(crate) fn parse_upload(body: &Value) -> Result<HostedImage> {
    if !body["success"].as_bool().unwrap_or(false) {
        let message = body["error"]["message"].as_str().unwrap_or("Unknown error");
        return Err(ConjureError::Provider(format!("ImgBB upload failed: {}", message)));
    }

    let data = &body["data"];
    let url = data["url"]
        .as_str()
        .ok_or_else(|| ConjureError::Provider("ImgBB response has no url".to_string()))?;
    let size = data["size"]
        .as_u64()
        .or_else(|| data["size"].as_str().and_then(|s| s.parse().ok()))
        .unwrap_or(0);

    Ok(HostedImage {
        id: data["id"].as_str().unwrap_or_default().to_string(),
        title: data["title"].as_str().unwrap_or_default().to_string(),
        url: url.to_string(),
        size,
    })
}

#[async_trait]
impl ImageHost for ImgbbClient {
    async fn upload(&self, base64: &str, expiration_secs: u64) -> Result<HostedImage> {
        let expiration = expiration_secs.to_string();
        let response = self
            .http
            .post(format!("{}/1/upload", self.base_url))
            .query(&[("expiration", expiration.as_str()), ("key", self.api_key.as_str())])
            .form(&[("image", base64)])
            .send()
            .await?;

        let response = ensure_success(response, "ImgBB upload").await?;
        let body: Value = response.json().await?;
        let hosted = parse_upload(&body)?;

        info!("Image uploaded: {}", hosted.url);
        Ok(hosted)
    }
}
