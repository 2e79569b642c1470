//! Error types for the journey core
//!
//! One taxonomy for the whole orchestration layer:
//! - lookup / validation failures that come back as typed values
//! - integrity failures (token mismatch) that are logged and surfaced
//!   as generic client errors
//! - fatal faults (token-space exhaustion, storage corruption) that
//!   operators must see
//!
//! Expected conditions never cross component boundaries as panics;
//! only truly unexpected faults do.

use journey_domain::{ParticipantId, SessionType};
use journey_store::{ConfigLookupError, DirectoryError, RegistryError};

/// Main journey error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JourneyError {
    /// Unknown token, missing session or missing config
    #[error("not found: {0}")]
    NotFound(String),

    /// A participant row for this identity already exists
    #[error("participant already exists: {existing}")]
    Conflict {
        /// The row that got there first
        existing: ParticipantId,
    },

    /// A concurrent writer superseded the row mid-operation
    #[error("concurrent update won; re-read the latest record")]
    StaleAdvance,

    /// Session token does not match the participant's session
    #[error("session token mismatch")]
    TokenMismatch,

    /// Missing or unusable survey configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Token space exhausted after bounded retries
    #[error("token space exhausted after {attempts} attempts")]
    Exhausted {
        /// How many generation attempts were made
        attempts: u32,
    },

    /// Advance attempted past the last journey stage
    #[error("no further sessions after {at}")]
    InvalidTransition {
        /// The terminal stage the participant sits at
        at: SessionType,
    },

    /// Advance attempted before the survey was completed
    #[error("participant {participant} has not completed the survey")]
    NotReady {
        /// The incomplete participant
        participant: ParticipantId,
    },

    /// External survey subsystem failure
    #[error("survey backend error: {0}")]
    Backend(String),

    /// Unexpected storage fault
    #[error("storage error: {0}")]
    Storage(String),

    /// Notification delivery failure (fire-and-log; never rolls back)
    #[error("notification failed: {0}")]
    Notify(String),
}

impl JourneyError {
    /// The generic, non-leaking message shown to end users
    ///
    /// Which check failed is deliberately not disclosed; full detail
    /// goes to the operator log at the failure site.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotFound(_) | Self::TokenMismatch => "This link is invalid or has expired.",
            _ => "Something went wrong. Please try again later.",
        }
    }

    /// Whether the caller can usefully retry later
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Backend(_) | Self::Notify(_) | Self::StaleAdvance
        )
    }

    /// Whether this is a fatal, operator-visible fault
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Exhausted { .. } | Self::Storage(_))
    }
}

impl From<RegistryError> for JourneyError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound => Self::NotFound("participant".to_string()),
            RegistryError::Conflict { existing } => Self::Conflict { existing },
            RegistryError::TokenInUse => Self::Storage("access token already in use".to_string()),
            RegistryError::StaleAdvance => Self::StaleAdvance,
        }
    }
}

impl From<ConfigLookupError> for JourneyError {
    fn from(err: ConfigLookupError) -> Self {
        match err {
            ConfigLookupError::NotFound(slot) => {
                Self::Configuration(format!("no active survey config for {slot}"))
            }
        }
    }
}

impl From<DirectoryError> for JourneyError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound {
                facilitator,
                session_type,
            } => Self::NotFound(format!("{session_type} session for {facilitator}")),
            DirectoryError::UnknownSession(id) => Self::NotFound(format!("session {id}")),
            other => Self::Storage(other.to_string()),
        }
    }
}
