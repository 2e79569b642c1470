//! Public access-token resolution
//!
//! Turns the two tokens from a public survey URL into a verified
//! participant plus their bound instance. Resolution is fail-closed:
//! any lookup miss or token disagreement rejects the request with no
//! fuzzy matching and no mutation.

use crate::binder::SurveyInstanceBinder;
use crate::config::JourneyConfig;
use crate::error::JourneyError;
use crate::RequestContext;
use journey_domain::{AccessToken, Participant, SurveyInstance};
use journey_store::{ParticipantRegistry, SessionDirectory};
use std::sync::Arc;

/// A successfully resolved public access
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The verified participant, post-resolution flags applied
    pub participant: Participant,
    /// The participant's bound survey instance
    pub instance: SurveyInstance,
    /// Canonical fill-in URL for this participant
    pub fill_url: String,
}

/// Resolves `(session_token, participant_token)` pairs from public
/// survey URLs
pub struct TokenResolver {
    registry: Arc<ParticipantRegistry>,
    directory: Arc<SessionDirectory>,
    binder: Arc<SurveyInstanceBinder>,
    config: JourneyConfig,
}

impl TokenResolver {
    /// Create a resolver over the shared stores
    #[must_use]
    pub fn new(
        registry: Arc<ParticipantRegistry>,
        directory: Arc<SessionDirectory>,
        binder: Arc<SurveyInstanceBinder>,
        config: JourneyConfig,
    ) -> Self {
        Self {
            registry,
            directory,
            binder,
            config,
        }
    }

    /// Resolve a public access, binding the survey instance on first
    /// use
    ///
    /// A participant token that exists under a session whose token
    /// disagrees with the URL is rejected, never silently re-pointed
    /// at the matching session; the mismatch is logged for operators.
    ///
    /// # Errors
    /// - [`JourneyError::NotFound`] for an unknown participant token
    ///   or a dangling session reference
    /// - [`JourneyError::TokenMismatch`] when the session token does
    ///   not match the participant's session
    /// - binding errors from [`SurveyInstanceBinder::bind`]
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        session_token: &AccessToken,
        participant_token: &AccessToken,
    ) -> Result<Resolution, JourneyError> {
        let participant = self
            .registry
            .find_by_token(participant_token)
            .ok_or_else(|| {
                tracing::warn!(
                    request = %ctx.request_id,
                    "public access with unknown participant token"
                );
                JourneyError::NotFound("participant token".to_string())
            })?;

        let session = self
            .directory
            .get(participant.session_id)
            .ok_or_else(|| JourneyError::NotFound("session".to_string()))?;

        if session.survey_token != *session_token {
            tracing::warn!(
                request = %ctx.request_id,
                participant = %participant.id,
                session = %session.id,
                "session token does not match the participant's session"
            );
            return Err(JourneyError::TokenMismatch);
        }

        let instance = self.binder.bind(ctx, participant.id).await?;

        // The link demonstrably reached the participant
        let participant = self.registry.update(participant.id, |p| {
            p.mark_sent(ctx.now());
        })?;

        let fill_url = self
            .config
            .fill_url(&session.survey_token, &participant.access_token);

        tracing::debug!(
            request = %ctx.request_id,
            participant = %participant.id,
            instance = %instance.id,
            "resolved public access"
        );
        Ok(Resolution {
            participant,
            instance,
            fill_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuer::TokenIssuer;
    use crate::test_harness::InMemorySurveyBackend;
    use crate::traits::SurveyBackend;
    use chrono::Utc;
    use journey_domain::{
        FacilitatorId, JourneySession, SessionConfig, SessionType, SurveyId, SurveySlot,
    };
    use journey_store::SessionConfigStore;

    struct Fixture {
        registry: Arc<ParticipantRegistry>,
        backend: Arc<InMemorySurveyBackend>,
        resolver: TokenResolver,
        session: JourneySession,
        participant: Participant,
    }

    fn setup() -> Fixture {
        let registry = Arc::new(ParticipantRegistry::new());
        let directory = Arc::new(SessionDirectory::new());
        let configs = Arc::new(SessionConfigStore::new());
        let backend = Arc::new(InMemorySurveyBackend::new());
        let config = JourneyConfig::new().with_base_url("https://x.test");

        configs.upsert(SessionConfig::new(
            SurveySlot::Session(SessionType::Kickoff),
            SurveyId::new(),
        ));
        let session = directory
            .insert(JourneySession::new(
                "Journey",
                SessionType::Kickoff,
                FacilitatorId::new(),
                AccessToken::generate(),
            ))
            .unwrap();
        let participant = registry
            .insert_or_current(Participant::new(
                "a@x.com",
                "A",
                session.id,
                SessionType::Kickoff,
                session.facilitator,
                AccessToken::generate(),
                Utc::now(),
            ))
            .unwrap()
            .0;

        let binder = Arc::new(SurveyInstanceBinder::new(
            Arc::clone(&registry),
            configs,
            Arc::clone(&backend) as Arc<dyn SurveyBackend>,
            TokenIssuer::new(&config),
        ));
        let resolver = TokenResolver::new(
            Arc::clone(&registry),
            directory,
            binder,
            config,
        );
        Fixture {
            registry,
            backend,
            resolver,
            session,
            participant,
        }
    }

    #[tokio::test]
    async fn valid_pair_resolves_and_binds() {
        let f = setup();
        let ctx = RequestContext::public();

        let resolution = f
            .resolver
            .resolve(&ctx, &f.session.survey_token, &f.participant.access_token)
            .await
            .unwrap();

        assert_eq!(resolution.participant.id, f.participant.id);
        assert!(resolution.participant.sent);
        assert_eq!(resolution.instance.participant, Some(f.participant.id));
        assert_eq!(
            resolution.fill_url,
            format!(
                "https://x.test/survey/start/{}/{}",
                f.session.survey_token, f.participant.access_token
            )
        );
    }

    #[tokio::test]
    async fn unknown_participant_token_fails_closed() {
        let f = setup();
        let ctx = RequestContext::public();

        let err = f
            .resolver
            .resolve(&ctx, &f.session.survey_token, &AccessToken::generate())
            .await
            .unwrap_err();
        assert!(matches!(err, JourneyError::NotFound(_)));
        assert_eq!(err.user_message(), "This link is invalid or has expired.");
        assert_eq!(f.backend.instance_count(), 0);
    }

    #[tokio::test]
    async fn mismatched_session_token_mutates_nothing() {
        let f = setup();
        let ctx = RequestContext::public();

        let err = f
            .resolver
            .resolve(&ctx, &AccessToken::generate(), &f.participant.access_token)
            .await
            .unwrap_err();
        assert_eq!(err, JourneyError::TokenMismatch);
        assert_eq!(err.user_message(), "This link is invalid or has expired.");

        let row = f.registry.get(f.participant.id).unwrap();
        assert!(row.instance.is_none());
        assert!(!row.sent);
        assert_eq!(f.backend.instance_count(), 0);
    }

    #[tokio::test]
    async fn repeated_resolution_reuses_the_instance() {
        let f = setup();
        let ctx = RequestContext::public();

        let first = f
            .resolver
            .resolve(&ctx, &f.session.survey_token, &f.participant.access_token)
            .await
            .unwrap();
        let second = f
            .resolver
            .resolve(&ctx, &f.session.survey_token, &f.participant.access_token)
            .await
            .unwrap();

        assert_eq!(first.instance.id, second.instance.id);
        assert_eq!(f.backend.instance_count(), 1);
        assert_eq!(first.fill_url, second.fill_url);
    }
}
