//! Session-type state machine
//!
//! The journey is a fixed, compiled-in sequence: a kickoff followed by
//! six follow-up sessions. `next` is the single forward transition;
//! after `Followup6` the journey is terminal. No cycles, no branching,
//! no skipping.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One stage of the participant journey
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    /// The initial session of a cohort
    Kickoff,
    Followup1,
    Followup2,
    Followup3,
    Followup4,
    Followup5,
    Followup6,
}

/// The complete journey order, first to last
pub const SESSION_ORDER: [SessionType; 7] = [
    SessionType::Kickoff,
    SessionType::Followup1,
    SessionType::Followup2,
    SessionType::Followup3,
    SessionType::Followup4,
    SessionType::Followup5,
    SessionType::Followup6,
];

impl SessionType {
    /// Position of this stage in the journey order (kickoff = 0)
    #[inline]
    #[must_use]
    pub fn sequence_index(self) -> usize {
        SESSION_ORDER
            .iter()
            .position(|s| *s == self)
            .unwrap_or_default()
    }

    /// The immediate successor stage, or `None` when the journey is
    /// terminal after this stage
    #[must_use]
    pub fn next(self) -> Option<SessionType> {
        let idx = self.sequence_index();
        SESSION_ORDER.get(idx + 1).copied()
    }

    /// Whether this is the last stage of the journey
    #[inline]
    #[must_use]
    pub fn is_last(self) -> bool {
        self.next().is_none()
    }

    /// Stable wire/storage identifier (`kickoff`, `followup1`, ...)
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kickoff => "kickoff",
            Self::Followup1 => "followup1",
            Self::Followup2 => "followup2",
            Self::Followup3 => "followup3",
            Self::Followup4 => "followup4",
            Self::Followup5 => "followup5",
            Self::Followup6 => "followup6",
        }
    }

    /// Human-readable stage label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Kickoff => "KickOff Session",
            Self::Followup1 => "Follow-up Session 1",
            Self::Followup2 => "Follow-up Session 2",
            Self::Followup3 => "Follow-up Session 3",
            Self::Followup4 => "Follow-up Session 4",
            Self::Followup5 => "Follow-up Session 5",
            Self::Followup6 => "Follow-up Session 6",
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a session type from its wire identifier
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown session type: {0}")]
pub struct ParseSessionTypeError(pub String);

impl FromStr for SessionType {
    type Err = ParseSessionTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SESSION_ORDER
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ParseSessionTypeError(s.to_string()))
    }
}
