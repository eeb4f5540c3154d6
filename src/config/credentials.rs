//! Provider credentials read from the environment.

use super::Settings;
use crate::error::{ConjureError, Result};

pub const FAL_API_KEY: &str = "FAL_API_KEY";
pub const TAVILY_API_KEY: &str = "TAVILY_API_KEY";
pub const IMGBB_API_KEY: &str = "IMGBB_API_KEY";

/// API keys for the model and every tool provider.
#[derive(Clone)]
pub struct Credentials {
    pub model: String,
    pub fal: String,
    pub tavily: String,
    pub imgbb: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").finish_non_exhaustive()
    }
}

impl Credentials {
    /// Read all keys. A missing or empty key is a configuration error.
    pub fn from_env(settings: &Settings) -> Result<Self> {
        Self::from_lookup(settings, |name| std::env::var(name).ok())
    }

    /// Read all keys through `lookup`.
    pub fn from_lookup(
        settings: &Settings,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let require = |name: &str| -> Result<String> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => Ok(value),
                Some(_) => Err(ConjureError::Config(format!(
                    "{} is empty. Set it with: export {}='...'",
                    name, name
                ))),
                None => Err(ConjureError::Config(format!(
                    "{} is not set in environment variables. Set it with: export {}='...'",
                    name, name
                ))),
            }
        };

        Ok(Self {
            model: require(&settings.model.api_key_env)?,
            fal: require(FAL_API_KEY)?,
            tavily: require(TAVILY_API_KEY)?,
            imgbb: require(IMGBB_API_KEY)?,
        })
    }
}
