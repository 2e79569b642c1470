//! External survey instances
//!
//! A `SurveyInstance` mirrors the external subsystem's record of one
//! person's answer set. Its lifecycle state is the source of truth the
//! sync layer projects onto participant flags; state only ever moves
//! forward (`New → InProgress → Done`).

use crate::ids::{InstanceId, ParticipantId, SurveyId};
use crate::token::AccessToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a survey instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Created, not yet opened
    New,
    /// Opened, answers in flight
    InProgress,
    /// Submitted
    Done,
}

impl InstanceState {
    /// Monotonic rank; higher states never yield to lower ones
    #[inline]
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::New => 0,
            Self::InProgress => 1,
            Self::Done => 2,
        }
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// One external survey instance, bound 1:1 to a participant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyInstance {
    /// Instance identifier
    pub id: InstanceId,
    /// Survey template this instance answers
    pub survey: SurveyId,
    /// Bound participant, for reverse lookup by sync/notify layers
    pub participant: Option<ParticipantId>,
    /// Respondent email, carried from the participant
    pub email: String,
    /// Respondent display name
    pub nickname: String,
    /// The instance's own access token in the external subsystem
    pub access_token: AccessToken,
    /// Lifecycle state
    pub state: InstanceState,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last state-change time
    pub updated_at: DateTime<Utc>,
}

impl SurveyInstance {
    /// Create a fresh instance in the `New` state
    #[must_use]
    pub fn new(
        survey: SurveyId,
        email: impl Into<String>,
        nickname: impl Into<String>,
        access_token: AccessToken,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InstanceId::new(),
            survey,
            participant: None,
            email: email.into(),
            nickname: nickname.into(),
            access_token,
            state: InstanceState::New,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bind the instance to its participant
    #[must_use]
    pub fn for_participant(mut self, participant: ParticipantId) -> Self {
        self.participant = Some(participant);
        self
    }

    /// Apply a state observation; returns whether the state advanced
    ///
    /// Regressions (a late or duplicate lower-ranked observation) are
    /// ignored, which makes repeated application idempotent and
    /// order-independent.
    pub fn advance_to(&mut self, state: InstanceState, now: DateTime<Utc>) -> bool {
        if state.rank() <= self.state.rank() {
            return false;
        }
        self.state = state;
        self.updated_at = now;
        true
    }
}
