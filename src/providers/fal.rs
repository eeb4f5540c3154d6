//! fal.ai client: synchronous image synthesis and the queue API used for video.

use super::{ensure_success, GeneratedImage, GenerationQueue, ImageSynthesizer, JobStatus};
use crate::config::ProviderSettings;
use crate::error::{ConjureError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};
use tracing::debug;

/// HTTP client for fal.ai.
pub struct FalClient {
    http: reqwest::Client,
    run_base: String,
    queue_base: String,
    image_model: String,
    video_model: String,
    api_key: String,
}

impl FalClient {
    pub fn new(http: reqwest::Client, settings: &ProviderSettings, api_key: &str) -> Self {
        Self {
            http,
            run_base: settings.fal_base_url.trim_end_matches('/').to_string(),
            queue_base: settings.fal_queue_base_url.trim_end_matches('/').to_string(),
            image_model: settings.image_model.clone(),
            video_model: settings.video_model.clone(),
            api_key: api_key.to_string(),
        }
    }

    fn auth(&self) -> String {
        format!("Key {}", self.api_key)
    }

    fn request_url(&self, request_id: &str) -> String {
        format!("{}/{}/requests/{}", self.queue_base, self.video_model, request_id)
    }

    /// Turn an image reference from fal into base64 bytes.
    async fn load_image(&self, url: &str, content_type: Option<&str>) -> Result<GeneratedImage> {
        if let Some((media_type, data)) = parse_data_url(url) {
            return Ok(GeneratedImage {
                base64: data.to_string(),
                media_type: media_type.to_string(),
            });
        }

        let response = self.http.get(url).send().await?;
        let response = ensure_success(response, "Image download").await?;
        let media_type = content_type
            .map(str::to_string)
            .or_else(|| {
                response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "image/jpeg".to_string());
        let bytes = response.bytes().await?;

        Ok(GeneratedImage {
            base64: STANDARD.encode(&bytes),
            media_type,
        })
    }
}

/// Split a `data:<type>;base64,<payload>` URL.
fn parse_data_url(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (meta, data) = rest.split_once(',')?;
    let media_type = meta.strip_suffix(";base64")?;
    Some((media_type, data))
}

#[async_trait]
impl ImageSynthesizer for FalClient {
    async fn synthesize(&self, prompt: &str) -> Result<GeneratedImage> {
        debug!("fal image request: {}", self.image_model);

        let response = self
            .http
            .post(format!("{}/{}", self.run_base, self.image_model))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .json(&json!({ "prompt": prompt, "num_images": 1 }))
            .send()
            .await?;

        let response = ensure_success(response, "fal image generation").await?;
        let body: Value = response.json().await?;

        let image = body["images"]
            .get(0)
            .ok_or_else(|| ConjureError::Provider("fal returned no images".to_string()))?;
        let url = image["url"]
            .as_str()
            .ok_or_else(|| ConjureError::Provider("fal image has no url".to_string()))?;

        self.load_image(url, image["content_type"].as_str()).await
    }
}

#[async_trait]
impl GenerationQueue for FalClient {
    async fn submit(&self, body: &Value) -> Result<Value> {
        let response = self
            .http
            .post(format!("{}/{}", self.queue_base, self.video_model))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .json(body)
            .send()
            .await?;

        let response = ensure_success(response, "fal video generation").await?;
        Ok(response.json().await?)
    }

    async fn status(&self, request_id: &str) -> Result<JobStatus> {
        let response = self
            .http
            .get(format!("{}/status", self.request_url(request_id)))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .send()
            .await?;

        let response = ensure_success(response, "Video status check").await?;
        Ok(response.json().await?)
    }

    async fn result(&self, request_id: &str) -> Result<Value> {
        let response = self
            .http
            .get(self.request_url(request_id))
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .send()
            .await?;

        let response = ensure_success(response, "Video result fetch").await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_url() {
        assert_eq!(
            parse_data_url("data:image/png;base64,iVBORw0"),
            Some(("image/png", "iVBORw0"))
        );
        assert_eq!(parse_data_url("https://fal.media/a.png"), None);
        assert_eq!(parse_data_url("data:text/plain,hello"), None);
    }

    #[test]
    fn test_queue_urls() {
        let settings = ProviderSettings::default();
        let client = FalClient::new(reqwest::Client::new(), &settings, "k");
        assert_eq!(
            client.request_url("abc"),
            "https://queue.fal.run/fal-ai/ltxv-13b-098-distilled/requests/abc"
        );
        assert_eq!(client.auth(), "Key k");
    }
}
