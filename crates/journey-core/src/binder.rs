//! Survey instance binder
//!
//! Creates (or fetches) the external survey instance bound to a
//! participant. Binding is idempotent and single-flight: a
//! per-participant lock makes two concurrent first accesses agree on
//! one instance instead of racing two `create_instance` calls.

use crate::error::JourneyError;
use crate::issuer::TokenIssuer;
use crate::traits::{InstanceIdentity, SurveyBackend};
use crate::RequestContext;
use dashmap::DashMap;
use journey_domain::{ParticipantId, SurveyInstance, SurveySlot};
use journey_store::{ParticipantRegistry, SessionConfigStore};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Binds participants to external survey instances
pub struct SurveyInstanceBinder {
    registry: Arc<ParticipantRegistry>,
    configs: Arc<SessionConfigStore>,
    backend: Arc<dyn SurveyBackend>,
    issuer: TokenIssuer,
    // One lock per participant currently being bound
    in_flight: DashMap<ParticipantId, Arc<Mutex<()>>>,
}

impl SurveyInstanceBinder {
    /// Create a binder over the shared stores and backend
    #[must_use]
    pub fn new(
        registry: Arc<ParticipantRegistry>,
        configs: Arc<SessionConfigStore>,
        backend: Arc<dyn SurveyBackend>,
        issuer: TokenIssuer,
    ) -> Self {
        Self {
            registry,
            configs,
            backend,
            issuer,
            in_flight: DashMap::new(),
        }
    }

    /// Return the participant's bound instance, creating it on first
    /// access
    ///
    /// # Errors
    /// - [`JourneyError::NotFound`] for an unknown participant
    /// - [`JourneyError::Configuration`] when no active survey config
    ///   exists for the participant's stage; the participant record
    ///   survives and the bind can be retried once configured
    /// - [`JourneyError::Backend`] on external subsystem failure
    pub async fn bind(
        &self,
        ctx: &RequestContext,
        participant_id: ParticipantId,
    ) -> Result<SurveyInstance, JourneyError> {
        // Fast path: already bound
        let participant = self
            .registry
            .get(participant_id)
            .ok_or_else(|| JourneyError::NotFound("participant".to_string()))?;
        if let Some(instance_id) = participant.instance {
            return self.backend.get_instance(instance_id).await;
        }

        let lock = self
            .in_flight
            .entry(participant_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Re-check under the bind lock; a concurrent bind may have won
        let participant = self
            .registry
            .get(participant_id)
            .ok_or_else(|| JourneyError::NotFound("participant".to_string()))?;
        if let Some(instance_id) = participant.instance {
            return self.backend.get_instance(instance_id).await;
        }

        let config = self
            .configs
            .active_config_for(SurveySlot::Session(participant.session_type))
            .map_err(|err| {
                tracing::warn!(
                    request = %ctx.request_id,
                    participant = %participant.id,
                    stage = %participant.session_type,
                    "survey binding left unconfigured: {err}"
                );
                JourneyError::from(err)
            })?;

        let instance_token = self.issuer.issue_reserved(&self.registry)?;
        let identity = InstanceIdentity::for_participant(&participant, instance_token);
        let instance = self.backend.create_instance(config.survey, identity).await?;

        self.registry.update(participant_id, |p| {
            p.instance = Some(instance.id);
        })?;
        self.in_flight.remove(&participant_id);

        tracing::info!(
            request = %ctx.request_id,
            participant = %participant.id,
            instance = %instance.id,
            survey = %config.survey,
            "bound survey instance"
        );
        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JourneyConfig;
    use crate::test_harness::InMemorySurveyBackend;
    use chrono::Utc;
    use journey_domain::{
        AccessToken, FacilitatorId, InstanceState, Participant, SessionConfig, SessionId,
        SessionType, SurveyId,
    };

    fn setup() -> (
        Arc<ParticipantRegistry>,
        Arc<SessionConfigStore>,
        Arc<InMemorySurveyBackend>,
        SurveyInstanceBinder,
    ) {
        let registry = Arc::new(ParticipantRegistry::new());
        let configs = Arc::new(SessionConfigStore::new());
        let backend = Arc::new(InMemorySurveyBackend::new());
        let binder = SurveyInstanceBinder::new(
            Arc::clone(&registry),
            Arc::clone(&configs),
            Arc::clone(&backend) as Arc<dyn SurveyBackend>,
            TokenIssuer::new(&JourneyConfig::new()),
        );
        (registry, configs, backend, binder)
    }

    fn seed_participant(registry: &ParticipantRegistry) -> Participant {
        let participant = Participant::new(
            "a@x.com",
            "A",
            SessionId::new(),
            SessionType::Kickoff,
            FacilitatorId::new(),
            AccessToken::generate(),
            Utc::now(),
        );
        registry.insert_or_current(participant).unwrap().0
    }

    #[tokio::test]
    async fn first_bind_creates_an_instance() {
        let (registry, configs, _backend, binder) = setup();
        configs.upsert(SessionConfig::new(
            SurveySlot::Session(SessionType::Kickoff),
            SurveyId::new(),
        ));
        let participant = seed_participant(&registry);

        let ctx = RequestContext::public();
        let instance = binder.bind(&ctx, participant.id).await.unwrap();

        assert_eq!(instance.state, InstanceState::New);
        assert_eq!(instance.participant, Some(participant.id));
        assert_eq!(
            registry.get(participant.id).unwrap().instance,
            Some(instance.id)
        );
    }

    #[tokio::test]
    async fn second_bind_returns_the_same_instance() {
        let (registry, configs, backend, binder) = setup();
        configs.upsert(SessionConfig::new(
            SurveySlot::Session(SessionType::Kickoff),
            SurveyId::new(),
        ));
        let participant = seed_participant(&registry);

        let ctx = RequestContext::public();
        let first = binder.bind(&ctx, participant.id).await.unwrap();
        let second = binder.bind(&ctx, participant.id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(backend.instance_count(), 1);
    }

    #[tokio::test]
    async fn missing_config_leaves_participant_usable() {
        let (registry, _configs, backend, binder) = setup();
        let participant = seed_participant(&registry);

        let ctx = RequestContext::public();
        let err = binder.bind(&ctx, participant.id).await.unwrap_err();
        assert!(matches!(err, JourneyError::Configuration(_)));
        assert!(err.is_retryable());
        assert_eq!(backend.instance_count(), 0);
        // Record still present, still unbound
        assert!(registry.get(participant.id).unwrap().instance.is_none());
    }

    #[tokio::test]
    async fn concurrent_binds_create_exactly_one_instance() {
        let (registry, configs, backend, binder) = setup();
        configs.upsert(SessionConfig::new(
            SurveySlot::Session(SessionType::Kickoff),
            SurveyId::new(),
        ));
        let participant = seed_participant(&registry);
        let binder = Arc::new(binder);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let binder = Arc::clone(&binder);
            let id = participant.id;
            handles.push(tokio::spawn(async move {
                binder.bind(&RequestContext::public(), id).await.unwrap()
            }));
        }

        let mut ids = std::collections::HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap().id);
        }
        assert_eq!(ids.len(), 1);
        assert_eq!(backend.instance_count(), 1);
    }
}
