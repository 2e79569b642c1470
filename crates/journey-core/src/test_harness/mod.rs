//! Test harness
//!
//! An in-memory [`SurveyBackend`] with scriptable state transitions
//! and fault injection. Used by the unit tests here and by the
//! scenario suites under `tests/`.

use crate::error::JourneyError;
use crate::traits::{InstanceIdentity, SurveyBackend};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use journey_domain::{InstanceId, InstanceState, SurveyId, SurveyInstance};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-memory survey subsystem double
///
/// Holds instances in a map and lets tests drive their lifecycle with
/// [`set_state`](Self::set_state), standing in for respondents opening
/// and submitting surveys.
#[derive(Debug, Default)]
pub struct InMemorySurveyBackend {
    instances: DashMap<InstanceId, SurveyInstance>,
    creates: AtomicUsize,
    fail_creates: AtomicBool,
}

impl InMemorySurveyBackend {
    /// Create an empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live instances
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Number of `create_instance` calls accepted
    #[must_use]
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::Relaxed)
    }

    /// Make subsequent `create_instance` calls fail
    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::Relaxed);
    }

    /// Drive an instance's lifecycle forward; regressions are ignored
    ///
    /// Returns whether the state advanced.
    pub fn set_state(&self, id: InstanceId, state: InstanceState, now: DateTime<Utc>) -> bool {
        match self.instances.get_mut(&id) {
            Some(mut entry) => entry.value_mut().advance_to(state, now),
            None => false,
        }
    }

    /// Fetch an instance without going through the trait
    #[must_use]
    pub fn get(&self, id: InstanceId) -> Option<SurveyInstance> {
        self.instances.get(&id).map(|entry| entry.clone())
    }
}

#[async_trait]
impl SurveyBackend for InMemorySurveyBackend {
    async fn create_instance(
        &self,
        survey: SurveyId,
        identity: InstanceIdentity,
    ) -> Result<SurveyInstance, JourneyError> {
        if self.fail_creates.load(Ordering::Relaxed) {
            return Err(JourneyError::Backend(
                "survey subsystem unavailable".to_string(),
            ));
        }
        let mut instance = SurveyInstance::new(
            survey,
            identity.email,
            identity.nickname,
            identity.access_token,
            Utc::now(),
        );
        if let Some(participant) = identity.participant {
            instance = instance.for_participant(participant);
        }
        self.creates.fetch_add(1, Ordering::Relaxed);
        self.instances.insert(instance.id, instance.clone());
        Ok(instance)
    }

    async fn get_instance(&self, instance: InstanceId) -> Result<SurveyInstance, JourneyError> {
        self.instances
            .get(&instance)
            .map(|entry| entry.clone())
            .ok_or_else(|| JourneyError::NotFound("survey instance".to_string()))
    }

    async fn get_state(&self, instance: InstanceId) -> Result<InstanceState, JourneyError> {
        Ok(self.get_instance(instance).await?.state)
    }
}
