//! Configuration settings for Conjure.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub model: ModelSettings,
    pub providers: ProviderSettings,
    pub video: VideoSettings,
    pub client: ClientSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Chat model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Base URL of an OpenAI-compatible chat completions API.
    pub api_base: String,
    /// Model name.
    pub model: String,
    /// Environment variable holding the model API key.
    pub api_key_env: String,
    /// Maximum output tokens per model turn.
    pub max_output_tokens: u32,
    /// Maximum model/tool round trips per request.
    pub max_steps: usize,
    /// Retries for a model turn that fails before streaming anything.
    pub max_retries: usize,
    /// HTTP timeout for model calls in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model: "gemini-2.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            max_output_tokens: 8192,
            max_steps: 10,
            max_retries: 1,
            timeout_secs: 300,
        }
    }
}

/// External tool provider endpoints and models.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Tavily API base URL (search and extract).
    pub tavily_base_url: String,
    /// fal.ai synchronous run endpoint.
    pub fal_base_url: String,
    /// fal.ai queue endpoint.
    pub fal_queue_base_url: String,
    /// fal.ai image model.
    pub image_model: String,
    /// fal.ai video model.
    pub video_model: String,
    /// ImgBB API base URL.
    pub imgbb_base_url: String,
    /// Seconds before a hosted image expires.
    pub image_expiration_secs: u64,
    /// YouTube base URL for the results page scrape.
    pub youtube_base_url: String,
    /// HTTP timeout for provider calls in seconds.
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            tavily_base_url: "https://api.tavily.com".to_string(),
            fal_base_url: "https://fal.run".to_string(),
            fal_queue_base_url: "https://queue.fal.run".to_string(),
            image_model: "fal-ai/flux/schnell".to_string(),
            video_model: "fal-ai/ltxv-13b-098-distilled".to_string(),
            imgbb_base_url: "https://api.imgbb.com".to_string(),
            image_expiration_secs: 600,
            youtube_base_url: "https://www.youtube.com".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Video generation polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    /// Seconds between status polls.
    pub poll_interval_secs: u64,
    /// Maximum status polls before giving up.
    pub max_poll_attempts: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            max_poll_attempts: 60,
        }
    }
}

impl VideoSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Terminal client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Base URL of a running `conjure serve`.
    pub server_url: String,
    /// Persona selected when the client starts.
    pub persona: String,
    /// Delay before a client-resolved tool call is marked completed.
    pub client_ack_delay_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            persona: "dumbledore".to_string(),
            client_ack_delay_ms: 2000,
        }
    }
}

impl ClientSettings {
    pub fn client_ack_delay(&self) -> Duration {
        Duration::from_millis(self.client_ack_delay_ms)
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ConjureError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("conjure")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Set one `section.field` value from its string form.
    ///
    /// The new value is parsed as the type the field currently holds.
    pub fn set_value(&mut self, key: &str, value: &str) -> crate::error::Result<()> {
        use crate::error::ConjureError;

        let (section, field) = key.split_once('.').ok_or_else(|| {
            ConjureError::Config(format!("Expected a key like 'section.field', got '{}'", key))
        })?;
        let unknown = || ConjureError::Config(format!("Unknown configuration key: {}", key));
        let invalid = |kind: &str| ConjureError::Config(format!("{} expects {}, got '{}'", key, kind, value));

        let mut root = toml::Value::try_from(&*self)
            .map_err(|e| ConjureError::Config(e.to_string()))?;
        let table = root
            .get_mut(section)
            .and_then(toml::Value::as_table_mut)
            .ok_or_else(unknown)?;

        let parsed = match table.get(field) {
            Some(toml::Value::Integer(_)) => {
                toml::Value::Integer(value.parse().map_err(|_| invalid("an integer"))?)
            }
            Some(toml::Value::Float(_)) => {
                toml::Value::Float(value.parse().map_err(|_| invalid("a number"))?)
            }
            Some(toml::Value::Boolean(_)) => {
                toml::Value::Boolean(value.parse().map_err(|_| invalid("true or false"))?)
            }
            Some(toml::Value::String(_)) | None => toml::Value::String(value.to_string()),
            Some(_) => return Err(unknown()),
        };
        table.insert(field.to_string(), parsed);

        let updated: Settings = root.try_into()?;
        let check = toml::Value::try_from(&updated)
            .map_err(|e| ConjureError::Config(e.to_string()))?;
        if check.get(section).and_then(|s| s.get(field)).is_none() {
            return Err(unknown());
        }

        *self = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_request_limits() {
        let settings = Settings::default();
        assert_eq!(settings.model.max_steps, 10);
        assert_eq!(settings.model.max_retries, 1);
        assert_eq!(settings.video.max_poll_attempts, 60);
        assert_eq!(settings.video.poll_interval(), Duration::from_secs(5));
        assert_eq!(settings.client.client_ack_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [server]
            port = 8080

            [video]
            max_poll_attempts = 12
            "#,
        )
        .unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.video.max_poll_attempts, 12);
        assert_eq!(settings.video.poll_interval_secs, 5);
        assert_eq!(settings.providers.image_expiration_secs, 600);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.client.persona = "snape".to_string();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.client.persona, "snape");
    }

    #[test]
    fn test_set_value_keeps_field_types() {
        let mut settings = Settings::default();
        settings.set_value("video.max_poll_attempts", "30").unwrap();
        settings.set_value("client.persona", "luna").unwrap();
        settings.set_value("prompts.custom_dir", "~/prompts").unwrap();

        assert_eq!(settings.video.max_poll_attempts, 30);
        assert_eq!(settings.client.persona, "luna");
        assert_eq!(settings.prompts.custom_dir.as_deref(), Some("~/prompts"));
    }

    #[test]
    fn test_set_value_rejects_bad_input() {
        let mut settings = Settings::default();
        assert!(settings.set_value("video.max_poll_attempts", "lots").is_err());
        assert!(settings.set_value("video.colour", "red").is_err());
        assert!(settings.set_value("persona", "luna").is_err());
        assert_eq!(settings.video.max_poll_attempts, 60);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.model.max_output_tokens, 8192);
    }
}
