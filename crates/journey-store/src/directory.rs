//! Session directory
//!
//! Sessions indexed by id, public token and `(facilitator, stage)`.
//! Also owns the cohort bookkeeping: cohort label assignment at
//! kickoff and materialization of the six follow-up sessions.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use journey_domain::{
    derive_cohort_label, AccessToken, FacilitatorId, InstanceId, JourneySession, SessionId,
    SessionType, SESSION_ORDER,
};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Errors surfaced by directory operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    /// No session for the requested facilitator/stage
    #[error("no {session_type} session for facilitator {facilitator}")]
    NotFound {
        /// The facilitator the lookup ran for
        facilitator: FacilitatorId,
        /// The stage that is missing
        session_type: SessionType,
    },

    /// No session with the given id
    #[error("unknown session: {0}")]
    UnknownSession(SessionId),

    /// Follow-ups can only be derived from a kickoff
    #[error("session {0} is not a kickoff")]
    NotAKickoff(SessionId),

    /// A session for this facilitator/stage already exists
    #[error("{session_type} session already exists for facilitator")]
    AlreadyExists {
        /// The session that already holds the slot
        session_type: SessionType,
    },
}

/// In-memory session directory
#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: DashMap<SessionId, JourneySession>,
    by_token: DashMap<String, SessionId>,
    // (facilitator, stage) -> session; guarded as one unit so cohort
    // materialization is atomic
    by_slot: Mutex<HashMap<(FacilitatorId, SessionType), SessionId>>,
}

impl SessionDirectory {
    /// Create an empty directory
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session
    ///
    /// Kickoffs without a cohort label get one derived from the
    /// profile's company name (or facilitator id as fallback).
    ///
    /// # Errors
    /// - [`DirectoryError::AlreadyExists`] when the facilitator
    ///   already has a session for this stage
    pub fn insert(&self, mut session: JourneySession) -> Result<JourneySession, DirectoryError> {
        let mut by_slot = self.by_slot.lock();
        let slot = (session.facilitator, session.session_type);
        if by_slot.contains_key(&slot) {
            return Err(DirectoryError::AlreadyExists {
                session_type: session.session_type,
            });
        }

        if session.session_type == SessionType::Kickoff && session.cohort.is_none() {
            // Cohort letters count per company, not per facilitator
            let existing = self
                .sessions
                .iter()
                .filter(|s| {
                    s.session_type == SessionType::Kickoff
                        && s.profile.company_name == session.profile.company_name
                })
                .count();
            let base = session
                .profile
                .company_name
                .clone()
                .unwrap_or_else(|| session.facilitator.to_string());
            session.cohort = Some(derive_cohort_label(&base, existing));
            tracing::info!(session = %session.id, cohort = ?session.cohort, "assigned cohort label");
        }

        by_slot.insert(slot, session.id);
        self.by_token
            .insert(session.survey_token.as_str().to_string(), session.id);
        self.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    /// Fetch a session by id
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<JourneySession> {
        self.sessions.get(&id).map(|s| s.clone())
    }

    /// Fetch a session by its public token
    #[must_use]
    pub fn find_by_token(&self, token: &AccessToken) -> Option<JourneySession> {
        let id = *self.by_token.get(token.as_str())?;
        self.get(id)
    }

    /// Resolve the session for a facilitator and stage
    ///
    /// # Errors
    /// - [`DirectoryError::NotFound`] when the stage has no session;
    ///   progression treats this as a hard stop, never a silent skip
    pub fn resolve_session(
        &self,
        facilitator: FacilitatorId,
        session_type: SessionType,
    ) -> Result<JourneySession, DirectoryError> {
        let id = {
            let by_slot = self.by_slot.lock();
            by_slot.get(&(facilitator, session_type)).copied()
        };
        id.and_then(|id| self.get(id)).ok_or(DirectoryError::NotFound {
            facilitator,
            session_type,
        })
    }

    /// Materialize follow-up sessions for a kickoff cohort
    ///
    /// Creates one session per entry in `dates` (missing stages are
    /// skipped), copying the kickoff's cohort label and profile. Each
    /// follow-up needs its own pre-issued session token.
    ///
    /// # Errors
    /// - [`DirectoryError::NotAKickoff`] when `kickoff_id` is not a
    ///   kickoff session
    /// - [`DirectoryError::NotFound`] when `kickoff_id` is unknown
    /// - [`DirectoryError::AlreadyExists`] when a stage is already
    ///   materialized for this facilitator
    pub fn create_followups(
        &self,
        kickoff_id: SessionId,
        dates: &[(SessionType, DateTime<Utc>)],
        mut token_source: impl FnMut() -> AccessToken,
    ) -> Result<Vec<JourneySession>, DirectoryError> {
        let kickoff = self
            .get(kickoff_id)
            .ok_or(DirectoryError::UnknownSession(kickoff_id))?;
        if kickoff.session_type != SessionType::Kickoff {
            return Err(DirectoryError::NotAKickoff(kickoff_id));
        }

        let mut created = Vec::new();
        for stage in SESSION_ORDER.iter().skip(1) {
            let Some((_, date)) = dates.iter().find(|(t, _)| t == stage) else {
                continue;
            };
            let followup = kickoff.followup(*stage, token_source(), Some(*date));
            let followup = self.insert(followup)?;
            tracing::info!(
                session = %followup.id,
                stage = %stage,
                cohort = ?followup.cohort,
                "created follow-up session"
            );
            created.push(followup);
        }
        Ok(created)
    }

    /// Find the session whose completion survey is this instance
    #[must_use]
    pub fn find_by_completion_instance(&self, instance: InstanceId) -> Option<JourneySession> {
        self.sessions
            .iter()
            .find(|s| s.completion.instance == Some(instance))
            .map(|s| s.clone())
    }

    /// Update a session's journey-completion bookkeeping
    pub fn update_completion(
        &self,
        id: SessionId,
        f: impl FnOnce(&mut JourneySession),
    ) -> Option<JourneySession> {
        let mut entry = self.sessions.get_mut(&id)?;
        f(entry.value_mut());
        Some(entry.value().clone())
    }

    /// Number of registered sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the directory is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journey_domain::SessionProfile;

    fn kickoff(facilitator: FacilitatorId) -> JourneySession {
        JourneySession::new(
            "Acme Journey",
            SessionType::Kickoff,
            facilitator,
            AccessToken::generate(),
        )
        .with_profile(SessionProfile {
            company_name: Some("Acme".into()),
            ..SessionProfile::default()
        })
    }

    #[test]
    fn insert_assigns_cohort_to_kickoffs() {
        let directory = SessionDirectory::new();
        let session = directory.insert(kickoff(FacilitatorId::new())).unwrap();
        assert_eq!(session.cohort.as_deref(), Some("Acme_CohortA"));
    }

    #[test]
    fn explicit_cohort_is_kept() {
        let directory = SessionDirectory::new();
        let session = directory
            .insert(kickoff(FacilitatorId::new()).with_cohort("Custom"))
            .unwrap();
        assert_eq!(session.cohort.as_deref(), Some("Custom"));
    }

    #[test]
    fn resolve_finds_by_facilitator_and_stage() {
        let directory = SessionDirectory::new();
        let facilitator = FacilitatorId::new();
        let session = directory.insert(kickoff(facilitator)).unwrap();

        let found = directory
            .resolve_session(facilitator, SessionType::Kickoff)
            .unwrap();
        assert_eq!(found.id, session.id);

        assert!(matches!(
            directory.resolve_session(facilitator, SessionType::Followup1),
            Err(DirectoryError::NotFound { .. })
        ));
    }

    #[test]
    fn find_by_token_round_trips() {
        let directory = SessionDirectory::new();
        let session = directory.insert(kickoff(FacilitatorId::new())).unwrap();
        let found = directory.find_by_token(&session.survey_token).unwrap();
        assert_eq!(found.id, session.id);
    }

    #[test]
    fn duplicate_slot_is_rejected() {
        let directory = SessionDirectory::new();
        let facilitator = FacilitatorId::new();
        directory.insert(kickoff(facilitator)).unwrap();
        assert!(matches!(
            directory.insert(kickoff(facilitator)),
            Err(DirectoryError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn followups_copy_cohort_and_link_parent() {
        let directory = SessionDirectory::new();
        let session = directory.insert(kickoff(FacilitatorId::new())).unwrap();

        let dates: Vec<_> = SESSION_ORDER
            .iter()
            .skip(1)
            .map(|t| (*t, Utc::now()))
            .collect();
        let created = directory
            .create_followups(session.id, &dates, AccessToken::generate)
            .unwrap();

        assert_eq!(created.len(), 6);
        for followup in &created {
            assert_eq!(followup.cohort, session.cohort);
            assert_eq!(followup.parent_kickoff, Some(session.id));
        }
        assert_eq!(directory.len(), 7);
    }

    #[test]
    fn partial_followup_dates_create_partial_sessions() {
        let directory = SessionDirectory::new();
        let session = directory.insert(kickoff(FacilitatorId::new())).unwrap();

        let dates = vec![(SessionType::Followup1, Utc::now())];
        let created = directory
            .create_followups(session.id, &dates, AccessToken::generate)
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].session_type, SessionType::Followup1);
    }

    #[test]
    fn followups_from_non_kickoff_are_rejected() {
        let directory = SessionDirectory::new();
        let facilitator = FacilitatorId::new();
        let kick = directory.insert(kickoff(facilitator)).unwrap();
        let followup = directory
            .create_followups(kick.id, &[(SessionType::Followup1, Utc::now())], AccessToken::generate)
            .unwrap()
            .remove(0);

        assert_eq!(
            directory
                .create_followups(
                    followup.id,
                    &[(SessionType::Followup2, Utc::now())],
                    AccessToken::generate
                )
                .unwrap_err(),
            DirectoryError::NotAKickoff(followup.id)
        );
    }
}
