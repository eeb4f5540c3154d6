//! Image generation tool: synthesize, then host with an expiry.

use super::{parse_input, ServerTool, ToolDefinition};
use crate::error::Result;
use crate::providers::{HostedImage, ImageHost, ImageSynthesizer};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
struct ImageInput {
    prompt: String,
}

/// Generates an image and returns its hosted URL.
pub struct ImageTool {
    synthesizer: Arc<dyn ImageSynthesizer>,
    host: Arc<dyn ImageHost>,
    expiration_secs: u64,
}

impl ImageTool {
    pub fn new(
        synthesizer: Arc<dyn ImageSynthesizer>,
        host: Arc<dyn ImageHost>,
        expiration_secs: u64,
    ) -> Self {
        Self {
            synthesizer,
            host,
            expiration_secs,
        }
    }

    async fn generate(&self, prompt: &str) -> Result<HostedImage> {
        let image = self.synthesizer.synthesize(prompt).await?;
        info!("Uploading {} image for prompt: {}", image.media_type, prompt);
        self.host.upload(&image.base64, self.expiration_secs).await
    }
}

#[async_trait]
impl ServerTool for ImageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "createImage",
            "Create an image based on the prompt",
            json!({
                "type": "object",
                "properties": {
                    "prompt": {"type": "string", "description": "The prompt to create an image based on"}
                },
                "required": ["prompt"]
            }),
        )
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: ImageInput = parse_input("createImage", input)?;

        match self.generate(&input.prompt).await {
            Ok(hosted) => Ok(json!({
                "type": "image",
                "url": hosted.url,
                "prompt": input.prompt,
                "uploadInfo": {
                    "id": hosted.id,
                    "title": hosted.title,
                    "size": hosted.size,
                }
            })),
            Err(e) => {
                error!("Error generating or uploading image: {}", e);
                Ok(json!({
                    "type": "error",
                    "message": "Failed to generate or upload image",
                    "error": e.to_string(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConjureError;
    use crate::providers::GeneratedImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSynth {
        fail: bool,
    }

    #[async_trait]
    impl ImageSynthesizer for FakeSynth {
        async fn synthesize(&self, _prompt: &str) -> Result<GeneratedImage> {
            if self.fail {
                return Err(ConjureError::Provider("fal image generation failed: 503".to_string()));
            }
            Ok(GeneratedImage {
                base64: "aGVsbG8=".to_string(),
                media_type: "image/jpeg".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct FakeHost {
        fail: bool,
        uploads: AtomicUsize,
        expirations: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl ImageHost for FakeHost {
        async fn upload(&self, base64: &str, expiration_secs: u64) -> Result<HostedImage> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            self.expirations.lock().unwrap().push(expiration_secs);
            if self.fail {
                return Err(ConjureError::Provider("ImgBB upload failed: 400 Bad Request".to_string()));
            }
            assert_eq!(base64, "aGVsbG8=");
            Ok(HostedImage {
                id: "abc".to_string(),
                title: "owl".to_string(),
                url: "https://i.ibb.co/abc/owl.jpg".to_string(),
                size: 5,
            })
        }
    }

    #[tokio::test]
    async fn test_successful_generation() {
        let host = Arc::new(FakeHost::default());
        let tool = ImageTool::new(Arc::new(FakeSynth { fail: false }), host.clone(), 600);

        let output = tool.execute(json!({"prompt": "a snowy owl"})).await.unwrap();
        assert_eq!(output["type"], "image");
        assert_eq!(output["url"], "https://i.ibb.co/abc/owl.jpg");
        assert_eq!(output["prompt"], "a snowy owl");
        assert_eq!(output["uploadInfo"]["id"], "abc");
        assert_eq!(host.expirations.lock().unwrap().as_slice(), &[600]);
    }

    #[tokio::test]
    async fn test_upload_failure_returns_error_without_url() {
        let host = Arc::new(FakeHost {
            fail: true,
            ..Default::default()
        });
        let tool = ImageTool::new(Arc::new(FakeSynth { fail: false }), host.clone(), 600);

        let output = tool.execute(json!({"prompt": "a snowy owl"})).await.unwrap();
        assert_eq!(output["type"], "error");
        assert_eq!(output["message"], "Failed to generate or upload image");
        assert!(output["error"].as_str().unwrap().contains("ImgBB"));
        assert!(output.get("url").is_none());
        assert_eq!(host.uploads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_synthesis_failure_skips_upload() {
        let host = Arc::new(FakeHost::default());
        let tool = ImageTool::new(Arc::new(FakeSynth { fail: true }), host.clone(), 600);

        let output = tool.execute(json!({"prompt": "a snowy owl"})).await.unwrap();
        assert_eq!(output["type"], "error");
        assert_eq!(host.uploads.load(Ordering::SeqCst), 0);
    }
}
