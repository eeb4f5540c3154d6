//! Pre-flight checks before starting long-running commands.
//!
//! Validates that credentials and endpoints are usable before the server
//! accepts requests that would otherwise fail midway.

use crate::config::{Credentials, Settings};
use crate::error::{ConjureError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Serving requires every provider credential.
    Serve,
    /// The terminal client only needs a server URL.
    Chat,
}

/// Run pre-flight checks for the given operation.
///
/// Returns the resolved credentials for `Serve`, or `None` for operations
/// that need none.
pub fn check(operation: Operation, settings: &Settings) -> Result<Option<Credentials>> {
    match operation {
        Operation::Serve => {
            check_url("model.api_base", &settings.model.api_base)?;
            check_url("providers.tavily_base_url", &settings.providers.tavily_base_url)?;
            check_url("providers.fal_base_url", &settings.providers.fal_base_url)?;
            check_url("providers.fal_queue_base_url", &settings.providers.fal_queue_base_url)?;
            check_url("providers.imgbb_base_url", &settings.providers.imgbb_base_url)?;
            check_url("providers.youtube_base_url", &settings.providers.youtube_base_url)?;
            if settings.model.max_steps == 0 {
                return Err(ConjureError::Config(
                    "model.max_steps must be at least 1".to_string(),
                ));
            }
            Credentials::from_env(settings).map(Some)
        }
        Operation::Chat => {
            check_url("client.server_url", &settings.client.server_url)?;
            Ok(None)
        }
    }
}

fn check_url(key: &str, value: &str) -> Result<()> {
    url::Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConjureError::Config(format!("{} is not a valid URL ({}): {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_needs_no_credentials() {
        let settings = Settings::default();
        assert!(check(Operation::Chat, &settings).unwrap().is_none());
    }

    #[test]
    fn test_invalid_server_url_rejected() {
        let mut settings = Settings::default();
        settings.client.server_url = "localhost 3000".to_string();
        assert!(matches!(
            check(Operation::Chat, &settings),
            Err(ConjureError::Config(_))
        ));
    }

    #[test]
    fn test_zero_step_budget_rejected() {
        let mut settings = Settings::default();
        settings.model.max_steps = 0;
        let err = check(Operation::Serve, &settings).unwrap_err();
        assert!(err.to_string().contains("max_steps"));
    }
}
