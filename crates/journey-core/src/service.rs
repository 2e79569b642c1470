//! Journey service
//!
//! The facade over the whole orchestration layer:
//! - creates kickoff sessions and materializes their follow-ups
//! - enrolls participants and sends out survey invitations
//! - resolves public access URLs
//! - projects survey state back onto participants and, at the end of
//!   the journey, triggers the completion survey for the company
//!   contact
//!
//! Owns the shared stores and wires the engine components over them;
//! embedders construct one service and hand it their survey backend
//! and notifier.

use crate::binder::SurveyInstanceBinder;
use crate::config::JourneyConfig;
use crate::error::JourneyError;
use crate::issuer::TokenIssuer;
use crate::progression::{ProgressionEngine, ProgressionOutcome};
use crate::resolver::{Resolution, TokenResolver};
use crate::sync::{SurveyStateSync, SyncOutcome};
use crate::traits::{InstanceIdentity, Notifier, SurveyBackend};
use crate::RequestContext;
use chrono::{DateTime, Utc};
use journey_domain::{
    AccessToken, FacilitatorId, InstanceId, InstanceState, JourneySession, Participant,
    SessionId, SessionProfile, SessionType, SurveySlot,
};
use journey_store::{ParticipantRegistry, SessionConfigStore, SessionDirectory};
use std::sync::Arc;

/// The journey orchestration service
pub struct JourneyService {
    config: JourneyConfig,
    registry: Arc<ParticipantRegistry>,
    directory: Arc<SessionDirectory>,
    configs: Arc<SessionConfigStore>,
    backend: Arc<dyn SurveyBackend>,
    notifier: Arc<dyn Notifier>,
    issuer: TokenIssuer,
    binder: Arc<SurveyInstanceBinder>,
    sync: SurveyStateSync,
    progression: ProgressionEngine,
    resolver: TokenResolver,
}

impl JourneyService {
    /// Wire a service over fresh stores
    #[must_use]
    pub fn new(
        config: JourneyConfig,
        backend: Arc<dyn SurveyBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let registry = Arc::new(ParticipantRegistry::new());
        let directory = Arc::new(SessionDirectory::new());
        let configs = Arc::new(SessionConfigStore::new());
        let issuer = TokenIssuer::new(&config);

        let binder = Arc::new(SurveyInstanceBinder::new(
            Arc::clone(&registry),
            Arc::clone(&configs),
            Arc::clone(&backend),
            issuer.clone(),
        ));
        let sync = SurveyStateSync::new(Arc::clone(&registry), Arc::clone(&configs));
        let progression = ProgressionEngine::new(
            Arc::clone(&registry),
            Arc::clone(&directory),
            issuer.clone(),
        );
        let resolver = TokenResolver::new(
            Arc::clone(&registry),
            Arc::clone(&directory),
            Arc::clone(&binder),
            config.clone(),
        );

        Self {
            config,
            registry,
            directory,
            configs,
            backend,
            notifier,
            issuer,
            binder,
            sync,
            progression,
            resolver,
        }
    }

    /// The participant registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<ParticipantRegistry> {
        &self.registry
    }

    /// The session directory
    #[inline]
    #[must_use]
    pub fn directory(&self) -> &Arc<SessionDirectory> {
        &self.directory
    }

    /// The survey config store
    #[inline]
    #[must_use]
    pub fn configs(&self) -> &Arc<SessionConfigStore> {
        &self.configs
    }

    /// Create a kickoff session for a facilitator's new cohort
    ///
    /// Reserves the session-level survey token and assigns the
    /// cohort label from the profile's company name.
    ///
    /// # Errors
    /// - [`JourneyError::Exhausted`] when token issuance fails
    /// - [`JourneyError::Storage`] when the facilitator already has a
    ///   kickoff
    pub fn create_kickoff(
        &self,
        ctx: &RequestContext,
        name: impl Into<String>,
        facilitator: FacilitatorId,
        profile: SessionProfile,
    ) -> Result<JourneySession, JourneyError> {
        let token = self.issuer.issue_reserved(&self.registry)?;
        let session = self.directory.insert(
            JourneySession::new(name, SessionType::Kickoff, facilitator, token)
                .with_profile(profile),
        )?;
        tracing::info!(
            request = %ctx.request_id,
            session = %session.id,
            cohort = ?session.cohort,
            "created kickoff session"
        );
        Ok(session)
    }

    /// Materialize the follow-up sessions for a kickoff cohort
    ///
    /// Each entry in `dates` becomes one follow-up session with its
    /// own reserved token, inheriting the kickoff's cohort label and
    /// profile.
    ///
    /// # Errors
    /// - [`JourneyError::NotFound`] for an unknown kickoff
    /// - [`JourneyError::Storage`] when `kickoff_id` is not a kickoff
    ///   or a stage is already materialized
    pub fn schedule_followups(
        &self,
        ctx: &RequestContext,
        kickoff_id: SessionId,
        dates: &[(SessionType, DateTime<Utc>)],
    ) -> Result<Vec<JourneySession>, JourneyError> {
        let mut tokens = dates
            .iter()
            .map(|_| self.issuer.issue_reserved(&self.registry))
            .collect::<Result<Vec<_>, _>>()?;
        let created = self.directory.create_followups(kickoff_id, dates, || {
            tokens.pop().unwrap_or_else(AccessToken::generate)
        })?;
        tracing::info!(
            request = %ctx.request_id,
            kickoff = %kickoff_id,
            count = created.len(),
            "scheduled follow-up sessions"
        );
        Ok(created)
    }

    /// Enroll an email under a session
    ///
    /// Idempotent: re-enrolling the same email under the same session
    /// returns the existing row with its original token.
    ///
    /// # Errors
    /// - [`JourneyError::NotFound`] for an unknown session
    /// - [`JourneyError::Exhausted`] when token issuance fails
    pub fn enroll(
        &self,
        ctx: &RequestContext,
        email: &str,
        display_name: &str,
        session_id: SessionId,
    ) -> Result<Participant, JourneyError> {
        let session = self
            .directory
            .get(session_id)
            .ok_or_else(|| JourneyError::NotFound(format!("session {session_id}")))?;
        let token = self.issuer.issue(&self.registry)?;
        let participant = Participant::new(
            email,
            display_name,
            session.id,
            session.session_type,
            session.facilitator,
            token,
            ctx.now(),
        );
        let (row, inserted) = self.registry.insert_or_current(participant)?;
        if inserted {
            tracing::info!(
                request = %ctx.request_id,
                participant = %row.id,
                session = %session.id,
                "enrolled participant"
            );
        }
        Ok(row)
    }

    /// Resolve a public survey URL's token pair
    ///
    /// # Errors
    /// See [`TokenResolver::resolve`].
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        session_token: &AccessToken,
        participant_token: &AccessToken,
    ) -> Result<Resolution, JourneyError> {
        self.resolver
            .resolve(ctx, session_token, participant_token)
            .await
    }

    /// Create a kickoff participant for an unknown email, or advance
    /// a completed one; the periodic sweep's per-email entry point
    ///
    /// # Errors
    /// See [`ProgressionEngine::create_or_advance`].
    pub fn create_or_advance(
        &self,
        ctx: &RequestContext,
        email: &str,
        facilitator: FacilitatorId,
    ) -> Result<(Participant, ProgressionOutcome), JourneyError> {
        self.progression.create_or_advance(ctx, email, facilitator)
    }

    /// Send survey invitations to every participant of a session
    ///
    /// Binds each participant's instance and hands the fill-in URL to
    /// the notifier. Delivery failures are logged and skipped, never
    /// propagated; returns how many invitations went out.
    ///
    /// # Errors
    /// - [`JourneyError::NotFound`] for an unknown session
    pub async fn send_surveys(
        &self,
        ctx: &RequestContext,
        session_id: SessionId,
    ) -> Result<usize, JourneyError> {
        let session = self
            .directory
            .get(session_id)
            .ok_or_else(|| JourneyError::NotFound(format!("session {session_id}")))?;

        let mut sent = 0;
        for participant in self.registry.for_session(session_id) {
            let instance = match self.binder.bind(ctx, participant.id).await {
                Ok(instance) => instance,
                Err(err) => {
                    tracing::warn!(
                        request = %ctx.request_id,
                        participant = %participant.id,
                        "skipping invitation, bind failed: {err}"
                    );
                    continue;
                }
            };

            let fill_url = self
                .config
                .fill_url(&session.survey_token, &participant.access_token);
            if self.config.notifications_enabled {
                if let Err(err) = self.notifier.send(&participant, &instance, &fill_url).await {
                    tracing::warn!(
                        request = %ctx.request_id,
                        participant = %participant.id,
                        "invitation delivery failed: {err}"
                    );
                    continue;
                }
            }
            self.registry.update(participant.id, |p| {
                p.mark_sent(ctx.now());
            })?;
            sent += 1;
        }

        tracing::info!(
            request = %ctx.request_id,
            session = %session_id,
            sent,
            "sent survey invitations"
        );
        Ok(sent)
    }

    /// Pull an instance's current state from the backend and project
    /// it onto the bound participant (or the session's completion
    /// bookkeeping for the completion survey)
    ///
    /// With `auto_advance` enabled, a participant whose survey just
    /// completed is advanced inline; advance failures are logged, the
    /// projection itself already succeeded.
    ///
    /// # Errors
    /// - [`JourneyError::NotFound`] for an unknown instance
    /// - [`JourneyError::Backend`] on external subsystem failure
    pub async fn sync_instance(
        &self,
        ctx: &RequestContext,
        instance_id: InstanceId,
    ) -> Result<SyncOutcome, JourneyError> {
        let instance = self.backend.get_instance(instance_id).await?;
        let outcome = self.sync.observe(ctx, &instance)?;

        match &outcome.participant {
            Some(participant) => {
                if self.config.auto_advance
                    && outcome.newly_completed
                    && !participant.session_type.is_last()
                {
                    match self.progression.advance(ctx, participant.id) {
                        Ok(next) => tracing::info!(
                            request = %ctx.request_id,
                            participant = %next.id,
                            stage = %next.session_type,
                            "auto-advanced on completion"
                        ),
                        Err(err) => tracing::warn!(
                            request = %ctx.request_id,
                            participant = %participant.id,
                            "auto-advance failed: {err}"
                        ),
                    }
                }
            }
            None => self.project_completion(ctx, &instance.id, instance.state),
        }
        Ok(outcome)
    }

    /// Trigger the journey-completion survey for a kickoff's cohort
    ///
    /// Creates a standalone instance of the completion survey,
    /// addressed to the profile's contact email, and records it on
    /// the kickoff. Idempotent: once triggered, repeated calls return
    /// the kickoff unchanged.
    ///
    /// # Errors
    /// - [`JourneyError::NotFound`] for an unknown session
    /// - [`JourneyError::Configuration`] without an active completion
    ///   survey config or a contact email to address it to
    /// - [`JourneyError::Backend`] on external subsystem failure
    pub async fn trigger_completion(
        &self,
        ctx: &RequestContext,
        kickoff_id: SessionId,
    ) -> Result<JourneySession, JourneyError> {
        let session = self
            .directory
            .get(kickoff_id)
            .ok_or_else(|| JourneyError::NotFound(format!("session {kickoff_id}")))?;
        if session.session_type != SessionType::Kickoff {
            return Err(JourneyError::Configuration(format!(
                "completion is tracked on kickoffs, not {}",
                session.session_type
            )));
        }
        if session.completion.triggered {
            tracing::debug!(
                request = %ctx.request_id,
                session = %session.id,
                "completion already triggered"
            );
            return Ok(session);
        }

        let config = self.configs.active_config_for(SurveySlot::Completion)?;
        let contact_email = session.profile.contact_email.clone().ok_or_else(|| {
            JourneyError::Configuration(format!(
                "no contact email on kickoff {} for the completion survey",
                session.id
            ))
        })?;
        let nickname = session
            .profile
            .contact_person
            .clone()
            .or_else(|| session.profile.company_name.clone())
            .unwrap_or_else(|| contact_email.clone());

        let token = self.issuer.issue_reserved(&self.registry)?;
        let identity = InstanceIdentity::standalone(contact_email, nickname, token.clone());
        let instance = self.backend.create_instance(config.survey, identity).await?;
        let url = self.config.fill_url(&session.survey_token, &token);

        let now = ctx.now();
        let session = self
            .directory
            .update_completion(kickoff_id, |s| {
                s.completion.triggered = true;
                s.completion.triggered_at = Some(now);
                s.completion.instance = Some(instance.id);
                s.completion.url = Some(url.clone());
            })
            .ok_or_else(|| JourneyError::NotFound(format!("session {kickoff_id}")))?;

        tracing::info!(
            request = %ctx.request_id,
            session = %session.id,
            instance = %instance.id,
            cohort = ?session.cohort,
            "triggered journey-completion survey"
        );
        Ok(session)
    }

    /// Mark a cohort's journey completed when its completion survey
    /// reaches done
    fn project_completion(&self, ctx: &RequestContext, instance: &InstanceId, state: InstanceState) {
        if state != InstanceState::Done {
            return;
        }
        let Some(session) = self.directory.find_by_completion_instance(*instance) else {
            return;
        };
        if session.completion.completed {
            return;
        }
        let now = ctx.now();
        self.directory.update_completion(session.id, |s| {
            s.completion.completed = true;
            s.completion.completed_at = Some(now);
        });
        tracing::info!(
            request = %ctx.request_id,
            session = %session.id,
            cohort = ?session.cohort,
            "journey completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_harness::InMemorySurveyBackend;
    use crate::traits::{MockNotifier, TracingNotifier};
    use journey_domain::{SessionConfig, SurveyId, SESSION_ORDER};
    use pretty_assertions::assert_eq;

    fn service_with_backend() -> (JourneyService, Arc<InMemorySurveyBackend>) {
        let backend = Arc::new(InMemorySurveyBackend::new());
        let service = JourneyService::new(
            JourneyConfig::new().with_base_url("https://x.test"),
            Arc::clone(&backend) as Arc<dyn SurveyBackend>,
            Arc::new(TracingNotifier),
        );
        (service, backend)
    }

    fn seed_configs(service: &JourneyService) {
        for stage in SESSION_ORDER {
            service.configs().upsert(SessionConfig::new(
                SurveySlot::Session(stage),
                SurveyId::new(),
            ));
        }
        service
            .configs()
            .upsert(SessionConfig::new(SurveySlot::Completion, SurveyId::new()));
    }

    fn acme_profile() -> SessionProfile {
        SessionProfile {
            company_name: Some("Acme".into()),
            contact_person: Some("Jo".into()),
            contact_email: Some("jo@acme.com".into()),
            ..SessionProfile::default()
        }
    }

    #[tokio::test]
    async fn kickoff_reserves_its_token_and_gets_a_cohort() {
        let (service, _backend) = service_with_backend();
        let ctx = RequestContext::new("operator");

        let kickoff = service
            .create_kickoff(&ctx, "Acme Journey", FacilitatorId::new(), acme_profile())
            .unwrap();

        assert_eq!(kickoff.cohort.as_deref(), Some("Acme_CohortA"));
        assert!(service
            .registry()
            .contains_token(kickoff.survey_token.as_str()));
    }

    #[tokio::test]
    async fn followups_cover_every_remaining_stage() {
        let (service, _backend) = service_with_backend();
        let ctx = RequestContext::new("operator");
        let kickoff = service
            .create_kickoff(&ctx, "Acme Journey", FacilitatorId::new(), acme_profile())
            .unwrap();

        let dates: Vec<_> = SESSION_ORDER
            .iter()
            .skip(1)
            .map(|t| (*t, Utc::now()))
            .collect();
        let created = service
            .schedule_followups(&ctx, kickoff.id, &dates)
            .unwrap();

        assert_eq!(created.len(), 6);
        for followup in &created {
            assert_eq!(followup.parent_kickoff, Some(kickoff.id));
            assert_eq!(followup.cohort, kickoff.cohort);
            assert!(service
                .registry()
                .contains_token(followup.survey_token.as_str()));
        }
    }

    #[tokio::test]
    async fn send_surveys_binds_and_marks_sent() {
        let (service, backend) = service_with_backend();
        seed_configs(&service);
        let ctx = RequestContext::new("operator");
        let kickoff = service
            .create_kickoff(&ctx, "Acme Journey", FacilitatorId::new(), acme_profile())
            .unwrap();
        service.enroll(&ctx, "a@x.com", "A", kickoff.id).unwrap();
        service.enroll(&ctx, "b@x.com", "B", kickoff.id).unwrap();

        let sent = service.send_surveys(&ctx, kickoff.id).await.unwrap();

        assert_eq!(sent, 2);
        assert_eq!(backend.instance_count(), 2);
        for row in service.registry().for_session(kickoff.id) {
            assert!(row.sent);
            assert!(row.instance.is_some());
        }
    }

    #[tokio::test]
    async fn send_surveys_skips_failed_binds() {
        let (service, backend) = service_with_backend();
        seed_configs(&service);
        let ctx = RequestContext::new("operator");
        let kickoff = service
            .create_kickoff(&ctx, "Acme Journey", FacilitatorId::new(), acme_profile())
            .unwrap();
        service.enroll(&ctx, "a@x.com", "A", kickoff.id).unwrap();

        backend.fail_creates(true);
        let sent = service.send_surveys(&ctx, kickoff.id).await.unwrap();
        assert_eq!(sent, 0);

        // Backend back up; the sweep can retry
        backend.fail_creates(false);
        assert_eq!(service.send_surveys(&ctx, kickoff.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delivery_failure_skips_one_without_stopping_the_rest() {
        let mut notifier = MockNotifier::new();
        notifier.expect_send().returning(|participant, _, _| {
            if participant.email == "a@x.com" {
                Err(JourneyError::Notify("smtp down".to_string()))
            } else {
                Ok(())
            }
        });
        let backend = Arc::new(InMemorySurveyBackend::new());
        let service = JourneyService::new(
            JourneyConfig::new(),
            Arc::clone(&backend) as Arc<dyn SurveyBackend>,
            Arc::new(notifier),
        );
        seed_configs(&service);
        let ctx = RequestContext::new("operator");
        let kickoff = service
            .create_kickoff(&ctx, "Acme Journey", FacilitatorId::new(), acme_profile())
            .unwrap();
        let a = service.enroll(&ctx, "a@x.com", "A", kickoff.id).unwrap();
        let b = service.enroll(&ctx, "b@x.com", "B", kickoff.id).unwrap();

        let sent = service.send_surveys(&ctx, kickoff.id).await.unwrap();

        assert_eq!(sent, 1);
        assert!(!service.registry().get(a.id).unwrap().sent);
        assert!(service.registry().get(b.id).unwrap().sent);
    }

    #[tokio::test]
    async fn sync_projects_done_onto_the_participant() {
        let (service, backend) = service_with_backend();
        seed_configs(&service);
        let ctx = RequestContext::new("operator");
        let kickoff = service
            .create_kickoff(&ctx, "Acme Journey", FacilitatorId::new(), acme_profile())
            .unwrap();
        let participant = service.enroll(&ctx, "a@x.com", "A", kickoff.id).unwrap();
        service.send_surveys(&ctx, kickoff.id).await.unwrap();

        let instance_id = service
            .registry()
            .get(participant.id)
            .unwrap()
            .instance
            .unwrap();
        backend.set_state(instance_id, InstanceState::Done, Utc::now());

        let outcome = service.sync_instance(&ctx, instance_id).await.unwrap();
        assert!(outcome.newly_completed);
        let row = outcome.participant.unwrap();
        assert!(row.completed);
        assert!(row.next_session_due.is_some());
    }

    #[tokio::test]
    async fn auto_advance_moves_the_participant_inline() {
        let backend = Arc::new(InMemorySurveyBackend::new());
        let service = JourneyService::new(
            JourneyConfig::new().with_auto_advance(),
            Arc::clone(&backend) as Arc<dyn SurveyBackend>,
            Arc::new(TracingNotifier),
        );
        seed_configs(&service);
        let ctx = RequestContext::new("operator");
        let kickoff = service
            .create_kickoff(&ctx, "Acme Journey", FacilitatorId::new(), acme_profile())
            .unwrap();
        let dates: Vec<_> = SESSION_ORDER
            .iter()
            .skip(1)
            .map(|t| (*t, Utc::now()))
            .collect();
        service
            .schedule_followups(&ctx, kickoff.id, &dates)
            .unwrap();
        let participant = service.enroll(&ctx, "a@x.com", "A", kickoff.id).unwrap();
        service.send_surveys(&ctx, kickoff.id).await.unwrap();

        let instance_id = service
            .registry()
            .get(participant.id)
            .unwrap()
            .instance
            .unwrap();
        backend.set_state(instance_id, InstanceState::Done, Utc::now());
        service.sync_instance(&ctx, instance_id).await.unwrap();

        let latest = service
            .registry()
            .find_latest_by_email("a@x.com")
            .unwrap();
        assert_eq!(latest.session_type, SessionType::Followup1);
        assert!(!latest.completed);
    }

    #[tokio::test]
    async fn completion_survey_is_triggered_once() {
        let (service, backend) = service_with_backend();
        seed_configs(&service);
        let ctx = RequestContext::new("operator");
        let kickoff = service
            .create_kickoff(&ctx, "Acme Journey", FacilitatorId::new(), acme_profile())
            .unwrap();

        let first = service.trigger_completion(&ctx, kickoff.id).await.unwrap();
        assert!(first.completion.triggered);
        let instance_id = first.completion.instance.unwrap();
        assert!(first.completion.url.is_some());
        assert_eq!(backend.instance_count(), 1);

        // Standalone instance, not bound to any participant
        assert!(backend.get(instance_id).unwrap().participant.is_none());
        assert_eq!(backend.get(instance_id).unwrap().email, "jo@acme.com");

        let again = service.trigger_completion(&ctx, kickoff.id).await.unwrap();
        assert_eq!(again.completion.instance, Some(instance_id));
        assert_eq!(backend.instance_count(), 1);
    }

    #[tokio::test]
    async fn completion_without_contact_email_is_a_config_error() {
        let (service, backend) = service_with_backend();
        seed_configs(&service);
        let ctx = RequestContext::new("operator");
        let kickoff = service
            .create_kickoff(
                &ctx,
                "Acme Journey",
                FacilitatorId::new(),
                SessionProfile {
                    company_name: Some("Acme".into()),
                    ..SessionProfile::default()
                },
            )
            .unwrap();

        let err = service
            .trigger_completion(&ctx, kickoff.id)
            .await
            .unwrap_err();
        assert!(matches!(err, JourneyError::Configuration(_)));
        assert_eq!(backend.instance_count(), 0);
    }

    #[tokio::test]
    async fn completion_done_marks_the_journey_completed() {
        let (service, backend) = service_with_backend();
        seed_configs(&service);
        let ctx = RequestContext::new("operator");
        let kickoff = service
            .create_kickoff(&ctx, "Acme Journey", FacilitatorId::new(), acme_profile())
            .unwrap();
        let triggered = service.trigger_completion(&ctx, kickoff.id).await.unwrap();
        let instance_id = triggered.completion.instance.unwrap();

        backend.set_state(instance_id, InstanceState::Done, Utc::now());
        let outcome = service.sync_instance(&ctx, instance_id).await.unwrap();
        assert!(outcome.participant.is_none());

        let session = service.directory().get(kickoff.id).unwrap();
        assert!(session.completion.completed);
        assert!(session.completion.completed_at.is_some());
    }
}
