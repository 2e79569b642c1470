//! Collaborator interfaces
//!
//! The core consumes two external collaborators, specified only at
//! the boundary:
//! - [`SurveyBackend`] - the external survey subsystem that owns
//!   instances and their lifecycle state
//! - [`Notifier`] - outbound invitation delivery; rendering and
//!   transport live outside this core

use crate::error::JourneyError;
use async_trait::async_trait;
use journey_domain::{
    AccessToken, InstanceId, InstanceState, Participant, ParticipantId, SurveyId, SurveyInstance,
};

/// Identity handed to the backend when creating an instance
#[derive(Debug, Clone)]
pub struct InstanceIdentity {
    /// Respondent email
    pub email: String,
    /// Respondent display name
    pub nickname: String,
    /// Bound participant, when the instance belongs to one
    pub participant: Option<ParticipantId>,
    /// Pre-issued token for the instance
    pub access_token: AccessToken,
}

impl InstanceIdentity {
    /// Identity for a participant-bound instance
    #[must_use]
    pub fn for_participant(participant: &Participant, access_token: AccessToken) -> Self {
        Self {
            email: participant.email.clone(),
            nickname: participant.display_name.clone(),
            participant: Some(participant.id),
            access_token,
        }
    }

    /// Identity for an unbound instance (the journey-completion
    /// survey filled in by the facilitator)
    #[must_use]
    pub fn standalone(
        email: impl Into<String>,
        nickname: impl Into<String>,
        access_token: AccessToken,
    ) -> Self {
        Self {
            email: email.into(),
            nickname: nickname.into(),
            participant: None,
            access_token,
        }
    }
}

/// The external survey subsystem
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SurveyBackend: Send + Sync {
    /// Create a new instance of a survey template
    async fn create_instance(
        &self,
        survey: SurveyId,
        identity: InstanceIdentity,
    ) -> Result<SurveyInstance, JourneyError>;

    /// Fetch an instance
    async fn get_instance(&self, instance: InstanceId) -> Result<SurveyInstance, JourneyError>;

    /// Fetch an instance's lifecycle state
    async fn get_state(&self, instance: InstanceId) -> Result<InstanceState, JourneyError>;
}

/// Outbound invitation delivery
///
/// Failures are reported but never roll back participant or instance
/// creation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send the invitation for a participant's survey
    async fn send(
        &self,
        participant: &Participant,
        instance: &SurveyInstance,
        fill_url: &str,
    ) -> Result<(), JourneyError>;
}

/// Notifier that logs instead of delivering
///
/// The default wiring until an actual delivery collaborator is
/// plugged in; also what keeps tests quiet.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn send(
        &self,
        participant: &Participant,
        instance: &SurveyInstance,
        fill_url: &str,
    ) -> Result<(), JourneyError> {
        tracing::info!(
            participant = %participant.id,
            email = %participant.email,
            instance = %instance.id,
            stage = %participant.session_type,
            url = fill_url,
            "survey invitation (log-only notifier)"
        );
        Ok(())
    }
}
