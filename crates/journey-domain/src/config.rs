//! Survey configuration
//!
//! One `SessionConfig` maps a survey slot (a session type, or the
//! journey-completion survey) to a survey template and the interval
//! until the next session. At most one config per slot may be active;
//! duplicates are a data error the lookup layer resolves
//! deterministically and reports.

use crate::ids::{ConfigId, SurveyId};
use crate::session_type::SessionType;
use serde::{Deserialize, Serialize};

/// Which survey a configuration row is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveySlot {
    /// The per-stage participant survey
    Session(SessionType),
    /// The facilitator-facing journey-completion survey
    Completion,
}

impl std::fmt::Display for SurveySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session(t) => f.write_str(t.as_str()),
            Self::Completion => f.write_str("completion"),
        }
    }
}

/// Default interval between sessions, in days
pub const DEFAULT_DAYS_UNTIL_NEXT: u32 = 180;

/// One survey configuration row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Row identifier
    pub id: ConfigId,
    /// Slot this row configures
    pub slot: SurveySlot,
    /// Survey template in the external subsystem
    pub survey: SurveyId,
    /// Ordering key; lowest `(sequence, id)` wins among duplicates
    pub sequence: u32,
    /// Days to wait before the next session becomes due
    pub days_until_next: u32,
    /// Whether this row is in effect
    pub active: bool,
}

impl SessionConfig {
    /// Create an active config row with default sequencing/interval
    #[must_use]
    pub fn new(slot: SurveySlot, survey: SurveyId) -> Self {
        Self {
            id: ConfigId::new(),
            slot,
            survey,
            sequence: 10,
            days_until_next: DEFAULT_DAYS_UNTIL_NEXT,
            active: true,
        }
    }

    /// Override the inter-session interval
    #[must_use]
    pub fn with_days_until_next(mut self, days: u32) -> Self {
        self.days_until_next = days;
        self
    }

    /// Override the ordering key
    #[must_use]
    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    /// Deactivate the row
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Display name, e.g. `KickOff Session survey config`
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.slot {
            SurveySlot::Session(t) => format!("{} survey config", t.label()),
            SurveySlot::Completion => "Journey Completion survey config".to_string(),
        }
    }
}
