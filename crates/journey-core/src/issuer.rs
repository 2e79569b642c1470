//! Token issuer
//!
//! Mints opaque access tokens and guarantees they are free against
//! the registry's token set. Collisions are astronomically unlikely at
//! the default 256 bits, so hitting the retry bound means the
//! deployment is misconfigured (token size shrunk, or the table is
//! corrupt); that case is fatal and never retried by callers.

use crate::config::JourneyConfig;
use crate::error::JourneyError;
use journey_domain::AccessToken;
use journey_store::ParticipantRegistry;

/// Issues collision-free opaque access tokens
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    byte_len: usize,
    max_attempts: u32,
}

impl TokenIssuer {
    /// Create an issuer from the journey configuration
    #[must_use]
    pub fn new(config: &JourneyConfig) -> Self {
        Self {
            byte_len: config.token_bytes,
            max_attempts: config.max_token_attempts,
        }
    }

    /// Mint a token that is free in the registry's token set
    ///
    /// The final uniqueness check still happens inside the registry's
    /// write lock; this pre-check only keeps the write path from ever
    /// seeing a collision in practice.
    ///
    /// # Errors
    /// - [`JourneyError::Exhausted`] after the bounded retry count
    pub fn issue(&self, registry: &ParticipantRegistry) -> Result<AccessToken, JourneyError> {
        for attempt in 1..=self.max_attempts {
            let token = AccessToken::generate_sized(self.byte_len);
            if !registry.contains_token(token.as_str()) {
                return Ok(token);
            }
            tracing::warn!(attempt, "access token collision during issuance");
        }
        tracing::error!(
            attempts = self.max_attempts,
            byte_len = self.byte_len,
            "token space exhausted; token sizing is misconfigured"
        );
        Err(JourneyError::Exhausted {
            attempts: self.max_attempts,
        })
    }

    /// Mint a token and immediately reserve it outside the participant
    /// table (session-level survey tokens)
    ///
    /// # Errors
    /// - [`JourneyError::Exhausted`] after the bounded retry count
    pub fn issue_reserved(
        &self,
        registry: &ParticipantRegistry,
    ) -> Result<AccessToken, JourneyError> {
        for attempt in 1..=self.max_attempts {
            let token = AccessToken::generate_sized(self.byte_len);
            if registry.reserve_token(&token) {
                return Ok(token);
            }
            tracing::warn!(attempt, "access token collision during reservation");
        }
        Err(JourneyError::Exhausted {
            attempts: self.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_returns_a_free_token() {
        let registry = ParticipantRegistry::new();
        let issuer = TokenIssuer::new(&JourneyConfig::new());

        let token = issuer.issue(&registry).unwrap();
        assert_eq!(token.as_str().len(), 64);
        assert!(!registry.contains_token(token.as_str()));
    }

    #[test]
    fn issue_reserved_claims_the_token() {
        let registry = ParticipantRegistry::new();
        let issuer = TokenIssuer::new(&JourneyConfig::new());

        let token = issuer.issue_reserved(&registry).unwrap();
        assert!(registry.contains_token(token.as_str()));
    }

    #[test]
    fn tiny_token_space_exhausts() {
        let registry = ParticipantRegistry::new();
        let config = JourneyConfig {
            token_bytes: 1,
            max_token_attempts: 64,
            ..JourneyConfig::new()
        };
        let issuer = TokenIssuer::new(&config);

        // Fill all 256 one-byte tokens
        for b in 0u16..=255 {
            let _ = registry.reserve_token(&AccessToken::from_raw(format!("{b:02x}")));
        }

        assert_eq!(
            issuer.issue(&registry),
            Err(JourneyError::Exhausted { attempts: 64 })
        );
    }
}
