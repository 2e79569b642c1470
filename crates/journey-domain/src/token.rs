//! Opaque access tokens
//!
//! Access tokens substitute for login on the public survey URL. They
//! are 32 bytes of CSPRNG output, hex encoded (256 bits of entropy),
//! globally unique across participants and session-level survey
//! tokens, minted once and never reused.

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Opaque, unguessable access credential
///
/// The `Debug` impl redacts the token body so request traces never
/// leak a usable credential.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Raw entropy per token, in bytes
    pub const BYTE_LEN: usize = 32;

    /// Mint a fresh token from the thread-local CSPRNG
    ///
    /// Uniqueness against the existing token set is the issuer's job;
    /// this only guarantees the entropy.
    #[must_use]
    pub fn generate() -> Self {
        Self::generate_sized(Self::BYTE_LEN)
    }

    /// Mint a token with a caller-chosen byte length
    #[must_use]
    pub fn generate_sized(byte_len: usize) -> Self {
        let mut bytes = vec![0u8; byte_len];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Wrap an already-issued token value (e.g. parsed from a URL)
    #[inline]
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The token as presented in URLs
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let head = self.0.get(..6).unwrap_or(&self.0);
        write!(f, "AccessToken({head}..)")
    }
}

impl std::fmt::Display for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
