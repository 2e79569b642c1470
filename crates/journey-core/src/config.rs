//! Journey configuration
//!
//! Tunables for the orchestration layer: URL assembly, token sizing,
//! and the progression trigger mode.

use journey_domain::AccessToken;
use serde::{Deserialize, Serialize};

/// Configuration for the journey core
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyConfig {
    /// Public base URL of the survey frontend
    pub base_url: String,
    /// Raw entropy per issued token, in bytes
    pub token_bytes: usize,
    /// Collision-retry bound for token issuance
    pub max_token_attempts: u32,
    /// Advance completed participants inline when their survey
    /// reaches done, instead of waiting for the next
    /// `create_or_advance` sweep
    pub auto_advance: bool,
    /// Whether bulk sends actually call the notifier
    pub notifications_enabled: bool,
}

impl JourneyConfig {
    /// Create a configuration with production defaults
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: "https://journey.example.com".to_string(),
            token_bytes: AccessToken::BYTE_LEN,
            max_token_attempts: 100,
            auto_advance: false,
            notifications_enabled: true,
        }
    }

    /// Override the public base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Enable inline progression on survey completion
    #[must_use]
    pub fn with_auto_advance(mut self) -> Self {
        self.auto_advance = true;
        self
    }

    /// Assemble the public fill-in URL for a participant
    ///
    /// Shape: `{base}/survey/start/{session_token}/{participant_token}`
    #[must_use]
    pub fn fill_url(&self, session_token: &AccessToken, participant_token: &AccessToken) -> String {
        format!(
            "{}/survey/start/{}/{}",
            self.base_url.trim_end_matches('/'),
            session_token,
            participant_token
        )
    }
}

impl Default for JourneyConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_lazy_with_full_entropy() {
        let config = JourneyConfig::new();
        assert!(!config.auto_advance);
        assert_eq!(config.token_bytes, 32);
        assert_eq!(config.max_token_attempts, 100);
    }

    #[test]
    fn fill_url_joins_both_tokens() {
        let config = JourneyConfig::new().with_base_url("https://x.test/");
        let url = config.fill_url(
            &AccessToken::from_raw("sess"),
            &AccessToken::from_raw("part"),
        );
        assert_eq!(url, "https://x.test/survey/start/sess/part");
    }
}
