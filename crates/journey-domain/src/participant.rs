//! Participant records
//!
//! One `Participant` is one person's engagement with one session's
//! survey. A person moving through the journey accumulates a chain of
//! records linked by `previous`; exactly one of them carries
//! `is_latest`. Records are never deleted.

use crate::ids::{FacilitatorId, InstanceId, ParticipantId, SessionId};
use crate::session_type::SessionType;
use crate::token::AccessToken;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A per-session, per-email participation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Record identifier
    pub id: ParticipantId,
    /// Participant email; `(email, session_id)` is unique
    pub email: String,
    /// Display name shown on the survey
    pub display_name: String,
    /// Team lead name, when captured at sign-up
    pub team_lead: Option<String>,
    /// Company name, when captured at sign-up
    pub company: Option<String>,
    /// Owning journey session
    pub session_id: SessionId,
    /// Stage of the owning session (denormalized for progression)
    pub session_type: SessionType,
    /// Facilitator of the owning session
    pub facilitator: FacilitatorId,
    /// Opaque access credential, minted once, immutable
    pub access_token: AccessToken,
    /// Whether this is the newest record in the email's chain
    pub is_latest: bool,
    /// Survey invitation went out
    pub sent: bool,
    /// Survey was opened at least once
    pub started: bool,
    /// Survey reached its done state
    pub completed: bool,
    /// First-send timestamp
    pub sent_at: Option<DateTime<Utc>>,
    /// First-open timestamp
    pub started_at: Option<DateTime<Utc>>,
    /// Completion timestamp
    pub completed_at: Option<DateTime<Utc>>,
    /// Bound external survey instance, once first accessed
    pub instance: Option<InstanceId>,
    /// The record this one superseded (audit chain)
    pub previous: Option<ParticipantId>,
    /// Earliest date the next session becomes due, set on completion
    pub next_session_due: Option<NaiveDate>,
    /// Record creation time
    pub created_at: DateTime<Utc>,
}

impl Participant {
    /// Create a fresh record bound to a session
    ///
    /// Lifecycle flags start cleared; the token must already be issued
    /// (and checked for uniqueness) by the caller.
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        display_name: impl Into<String>,
        session_id: SessionId,
        session_type: SessionType,
        facilitator: FacilitatorId,
        access_token: AccessToken,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ParticipantId::new(),
            email: email.into(),
            display_name: display_name.into(),
            team_lead: None,
            company: None,
            session_id,
            session_type,
            facilitator,
            access_token,
            is_latest: true,
            sent: false,
            started: false,
            completed: false,
            sent_at: None,
            started_at: None,
            completed_at: None,
            instance: None,
            previous: None,
            next_session_due: None,
            created_at: now,
        }
    }

    /// Attach team/company metadata
    #[must_use]
    pub fn with_metadata(mut self, team_lead: Option<String>, company: Option<String>) -> Self {
        self.team_lead = team_lead;
        self.company = company;
        self
    }

    /// Mark the invitation as sent; returns whether anything changed
    ///
    /// Idempotent: repeated sends never move the first-send timestamp.
    pub fn mark_sent(&mut self, now: DateTime<Utc>) -> bool {
        if self.sent {
            return false;
        }
        self.sent = true;
        self.sent_at = Some(now);
        true
    }

    /// Mark the survey as started; returns whether anything changed
    pub fn mark_started(&mut self, now: DateTime<Utc>) -> bool {
        if self.started {
            return false;
        }
        self.started = true;
        self.started_at = Some(now);
        true
    }

    /// Mark the survey as completed; returns whether anything changed
    ///
    /// Completion implies started; a completion event arriving before
    /// any start event still leaves both flags set.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> bool {
        if self.completed {
            return false;
        }
        self.mark_started(now);
        self.completed = true;
        self.completed_at = Some(now);
        true
    }

    /// Build the successor record for the next session
    ///
    /// Copies identity and metadata, resets every lifecycle flag and
    /// timestamp, links back via `previous`. The caller is responsible
    /// for atomically clearing `is_latest` on `self`.
    #[must_use]
    pub fn successor(
        &self,
        session_id: SessionId,
        session_type: SessionType,
        access_token: AccessToken,
        now: DateTime<Utc>,
    ) -> Self {
        let mut next = Self::new(
            self.email.clone(),
            self.display_name.clone(),
            session_id,
            session_type,
            self.facilitator,
            access_token,
            now,
        );
        next.team_lead = self.team_lead.clone();
        next.company = self.company.clone();
        next.previous = Some(self.id);
        next
    }
}
