//! Video generation tool.
//!
//! Submits a job to a queue-based generation API and polls it:
//!
//! ```text
//! Submitting ──inline result──────────────────────────────▶ Completed
//!     │
//!     └─IN_QUEUE─▶ InQueue ──status poll──▶ COMPLETED ─fetch─▶ Completed
//!                    ▲   │                 FAILED ──────────▶ Failed
//!                    └───┘ IN_QUEUE / IN_PROGRESS
//!                          attempts exhausted ──────────────▶ TimedOut
//! ```
//!
//! The poll budget is independent of the model's step budget. Every failure
//! resolves to the same error shape.

use super::{parse_input, ServerTool, ToolDefinition};
use crate::config::VideoSettings;
use crate::error::{ConjureError, Result};
use crate::providers::{GenerationQueue, JobState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const RESOLUTION: &str = "720p";
const NUM_FRAMES: u32 = 121;
const FRAME_RATE: u32 = 24;

/// Output aspect ratio.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
}

#[derive(Debug, Deserialize)]
struct VideoInput {
    prompt: String,
    #[serde(default)]
    aspect_ratio: AspectRatio,
}

/// Poll pacing for queued jobs.
#[derive(Debug, Clone, Copy)]
pub struct VideoToolConfig {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl From<&VideoSettings> for VideoToolConfig {
    fn from(settings: &VideoSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            max_attempts: settings.max_poll_attempts,
        }
    }
}

impl VideoToolConfig {
    fn budget_description(&self) -> String {
        let total = self.poll_interval.as_secs() * u64::from(self.max_attempts);
        if total >= 60 && total % 60 == 0 {
            let minutes = total / 60;
            format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
        } else {
            format!("{} seconds", total)
        }
    }
}

/// A finished video.
#[derive(Debug, Clone, PartialEq)]
struct GeneratedVideo {
    url: String,
    prompt: Option<String>,
}

impl GeneratedVideo {
    /// Read `video.url` (and the echoed prompt) from a result payload.
    fn from_payload(payload: &Value) -> Option<Self> {
        let url = payload.pointer("/video/url").and_then(Value::as_str)?;
        Some(Self {
            url: url.to_string(),
            prompt: payload["prompt"].as_str().map(str::to_string),
        })
    }
}

/// Generates short videos through a generation queue.
pub struct VideoTool {
    queue: Arc<dyn GenerationQueue>,
    config: VideoToolConfig,
}

impl VideoTool {
    pub fn new(queue: Arc<dyn GenerationQueue>, config: VideoToolConfig) -> Self {
        Self { queue, config }
    }

    /// Fixed generation parameters plus the caller's prompt and aspect ratio.
    fn request_body(prompt: &str, aspect_ratio: AspectRatio) -> Value {
        json!({
            "prompt": prompt,
            "negative_prompt": "worst quality, inconsistent motion, blurry, jittery, distorted",
            "resolution": RESOLUTION,
            "aspect_ratio": aspect_ratio,
            "num_frames": NUM_FRAMES,
            "first_pass_num_inference_steps": 8,
            "second_pass_num_inference_steps": 8,
            "second_pass_skip_initial_steps": 5,
            "frame_rate": FRAME_RATE,
            "expand_prompt": false,
            "reverse_video": false,
            "enable_safety_checker": true,
            "enable_detail_pass": false,
            "temporal_adain_factor": 0.5,
            "tone_map_compression_ratio": 0
        })
    }

    async fn generate(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<GeneratedVideo> {
        info!("Creating video with prompt: {}", prompt);

        let submitted = self
            .queue
            .submit(&Self::request_body(prompt, aspect_ratio))
            .await?;

        let queued_id = match (submitted["status"].as_str(), submitted["request_id"].as_str()) {
            (Some("IN_QUEUE"), Some(id)) => Some(id.to_string()),
            _ => None,
        };

        if let Some(request_id) = queued_id {
            info!("Video request queued: {}", request_id);
            return self.poll(&request_id).await;
        }

        GeneratedVideo::from_payload(&submitted).ok_or_else(|| {
            ConjureError::Provider("Unexpected response format from video provider".to_string())
        })
    }

    async fn poll(&self, request_id: &str) -> Result<GeneratedVideo> {
        let max = self.config.max_attempts;

        for attempt in 1..=max {
            tokio::time::sleep(self.config.poll_interval).await;
            debug!("Checking video status (attempt {}/{})", attempt, max);

            let status = self.queue.status(request_id).await?;
            match status.status {
                JobState::Completed => {
                    let payload = self.queue.result(request_id).await?;
                    return GeneratedVideo::from_payload(&payload).ok_or_else(|| {
                        ConjureError::Provider("No video URL in completed result".to_string())
                    });
                }
                JobState::Failed => {
                    return Err(ConjureError::Provider(format!(
                        "Video generation failed: {}",
                        status.error.as_deref().unwrap_or("Unknown error")
                    )));
                }
                JobState::InQueue | JobState::InProgress | JobState::Unknown => {}
            }
        }

        Err(ConjureError::Timeout(format!(
            "Video generation timed out after {}",
            self.config.budget_description()
        )))
    }
}

#[async_trait]
impl ServerTool for VideoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "createVideo",
            "Create a video based on the prompt using AI video generation",
            json!({
                "type": "object",
                "properties": {
                    "prompt": {"type": "string", "description": "The prompt to create a video based on"},
                    "aspect_ratio": {
                        "type": "string",
                        "enum": ["16:9", "9:16", "1:1"],
                        "default": "16:9",
                        "description": "Video aspect ratio"
                    }
                },
                "required": ["prompt"]
            }),
        )
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let input: VideoInput = parse_input("createVideo", input)?;

        match self.generate(&input.prompt, input.aspect_ratio).await {
            Ok(video) => {
                info!("Video created: {}", video.url);
                Ok(json!({
                    "type": "video",
                    "url": video.url,
                    "prompt": video.prompt.unwrap_or(input.prompt),
                    "videoInfo": {
                        "resolution": RESOLUTION,
                        "aspect_ratio": input.aspect_ratio,
                        "num_frames": NUM_FRAMES,
                        "frame_rate": FRAME_RATE,
                    }
                }))
            }
            Err(e) => {
                error!("Error creating video: {}", e);
                Ok(json!({
                    "type": "error",
                    "message": "Failed to create video",
                    "error": e.to_string(),
                }))
            }
        }
    }
}
