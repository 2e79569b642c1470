//! Journey sessions
//!
//! A `JourneySession` is one scheduled occurrence of a session type
//! for one facilitator/cohort. Follow-ups reference their parent
//! kickoff and share its cohort label and profile metadata.

use crate::ids::{FacilitatorId, InstanceId, SessionId};
use crate::session_type::SessionType;
use crate::token::AccessToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engagement metadata carried by every session of a cohort
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProfile {
    /// Company hosting the engagement
    pub company_name: Option<String>,
    /// Contact person for the engagement
    pub contact_person: Option<String>,
    /// Contact email, the recipient of the journey-completion survey
    pub contact_email: Option<String>,
    /// Team leader of the cohort
    pub team_leader: Option<String>,
    /// Division within the company
    pub division: Option<String>,
    /// Country the session is held in
    pub country: Option<String>,
    /// Preferred language of the cohort
    pub language: Option<String>,
    /// Commitment text captured at kickoff
    pub team_commitment: Option<String>,
    /// Desired differences captured at kickoff
    pub desired_differences: Option<String>,
    /// Company-support notes captured at kickoff
    pub company_support: Option<String>,
}

/// Journey-completion bookkeeping, tracked on the kickoff session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionState {
    /// Completion survey has been created for the facilitator
    pub triggered: bool,
    /// When the completion survey was triggered
    pub triggered_at: Option<DateTime<Utc>>,
    /// The journey has been officially completed
    pub completed: bool,
    /// When the journey was completed
    pub completed_at: Option<DateTime<Utc>>,
    /// The completion survey instance, once triggered
    pub instance: Option<InstanceId>,
    /// Fill-in URL of the completion survey
    pub url: Option<String>,
}

/// One scheduled occurrence of a session type for a cohort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneySession {
    /// Session identifier
    pub id: SessionId,
    /// Display name
    pub name: String,
    /// Stage this session represents
    pub session_type: SessionType,
    /// Owning facilitator
    pub facilitator: FacilitatorId,
    /// Cohort label (e.g. `Acme_CohortA`); assigned at kickoff
    pub cohort: Option<String>,
    /// Public session-level token, the first URL segment
    pub survey_token: AccessToken,
    /// Parent kickoff session for follow-ups
    pub parent_kickoff: Option<SessionId>,
    /// Scheduled start, when known
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Cohort engagement metadata
    pub profile: SessionProfile,
    /// Journey-completion bookkeeping (meaningful on kickoffs)
    pub completion: CompletionState,
}

impl JourneySession {
    /// Create a new session
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        session_type: SessionType,
        facilitator: FacilitatorId,
        survey_token: AccessToken,
    ) -> Self {
        Self {
            id: SessionId::new(),
            name: name.into(),
            session_type,
            facilitator,
            cohort: None,
            survey_token,
            parent_kickoff: None,
            scheduled_at: None,
            profile: SessionProfile::default(),
            completion: CompletionState::default(),
        }
    }

    /// Attach cohort engagement metadata
    #[must_use]
    pub fn with_profile(mut self, profile: SessionProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the cohort label
    #[must_use]
    pub fn with_cohort(mut self, cohort: impl Into<String>) -> Self {
        self.cohort = Some(cohort.into());
        self
    }

    /// Derive a follow-up session from this kickoff
    ///
    /// Copies cohort label and profile, links back via
    /// `parent_kickoff`. The caller supplies the follow-up's own
    /// session token.
    #[must_use]
    pub fn followup(
        &self,
        session_type: SessionType,
        survey_token: AccessToken,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut next = Self::new(
            format!("{} - {}", self.name, session_type.label()),
            session_type,
            self.facilitator,
            survey_token,
        );
        next.cohort.clone_from(&self.cohort);
        next.profile = self.profile.clone();
        next.parent_kickoff = Some(self.id);
        next.scheduled_at = scheduled_at;
        next
    }
}

/// Derive a cohort label like `Acme_CohortA`
///
/// `existing` is the number of kickoff cohorts this facilitator
/// already owns; the 27th cohort onward falls back to a numeric
/// suffix.
#[must_use]
pub fn derive_cohort_label(base: &str, existing: usize) -> String {
    let base: String = base.chars().filter(|c| !c.is_whitespace()).take(10).collect();
    let base = if base.is_empty() { "Unknown".to_string() } else { base };
    if existing < 26 {
        let suffix = char::from(b'A' + u8::try_from(existing).unwrap_or(0));
        format!("{base}_Cohort{suffix}")
    } else {
        format!("{base}_Cohort{existing}")
    }
}
