//! Survey state projection
//!
//! Projects an external survey instance's lifecycle state onto the
//! bound participant's flags and timestamps. The projection is
//! idempotent and monotonic: repeated or out-of-order observations
//! never clear a flag or move a first-transition timestamp.
//!
//! | instance state | started | completed | timestamp set          |
//! |----------------|---------|-----------|------------------------|
//! | new            | -       | -         | -                      |
//! | in_progress    | true    | -         | `started_at` (first)   |
//! | done           | true    | true      | `completed_at` (first) |
//!
//! On the first transition to done the participant also gets its
//! `next_session_due` date from the active config's interval; that is
//! the readiness signal the progression sweep looks at.

use crate::error::JourneyError;
use crate::RequestContext;
use chrono::Duration;
use journey_domain::{InstanceState, Participant, SurveyInstance, SurveySlot};
use journey_store::{ParticipantRegistry, SessionConfigStore};
use std::sync::Arc;

/// Result of one observation
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// The participant after projection; `None` when the instance is
    /// not bound to one (completion surveys)
    pub participant: Option<Participant>,
    /// This observation set `started` for the first time
    pub newly_started: bool,
    /// This observation set `completed` for the first time
    pub newly_completed: bool,
}

/// Projects instance lifecycle state onto participant records
pub struct SurveyStateSync {
    registry: Arc<ParticipantRegistry>,
    configs: Arc<SessionConfigStore>,
}

impl SurveyStateSync {
    /// Create a sync layer over the shared stores
    #[must_use]
    pub fn new(registry: Arc<ParticipantRegistry>, configs: Arc<SessionConfigStore>) -> Self {
        Self { registry, configs }
    }

    /// Apply one state observation
    ///
    /// Safe to call any number of times, in any order of observed
    /// states; flags only ever tighten.
    ///
    /// # Errors
    /// - [`JourneyError::NotFound`] when the instance references a
    ///   participant that does not exist
    pub fn observe(
        &self,
        ctx: &RequestContext,
        instance: &SurveyInstance,
    ) -> Result<SyncOutcome, JourneyError> {
        let Some(participant_id) = instance.participant else {
            return Ok(SyncOutcome {
                participant: None,
                newly_started: false,
                newly_completed: false,
            });
        };

        let now = ctx.now();
        let mut newly_started = false;
        let mut newly_completed = false;
        let due_in_days = self.due_interval(instance);

        let participant = self.registry.update(participant_id, |p| {
            match instance.state {
                InstanceState::New => {}
                InstanceState::InProgress => {
                    newly_started = p.mark_started(now);
                }
                InstanceState::Done => {
                    newly_started = p.mark_started(now);
                    newly_completed = p.mark_completed(now);
                    if newly_completed && !p.session_type.is_last() {
                        p.next_session_due =
                            due_in_days.map(|days| now.date_naive() + Duration::days(days));
                    }
                }
            }
        })?;

        if newly_completed {
            tracing::info!(
                request = %ctx.request_id,
                participant = %participant.id,
                stage = %participant.session_type,
                due = ?participant.next_session_due,
                "survey completed"
            );
        } else if newly_started {
            tracing::debug!(
                request = %ctx.request_id,
                participant = %participant.id,
                "survey started"
            );
        }

        Ok(SyncOutcome {
            participant: Some(participant),
            newly_started,
            newly_completed,
        })
    }

    /// Days until the next session, from the active config of the
    /// instance's survey slot; `None` (with a log line) when
    /// unconfigured
    fn due_interval(&self, instance: &SurveyInstance) -> Option<i64> {
        let participant_id = instance.participant?;
        let participant = self.registry.get(participant_id)?;
        match self
            .configs
            .active_config_for(SurveySlot::Session(participant.session_type))
        {
            Ok(config) => Some(i64::from(config.days_until_next)),
            Err(err) => {
                tracing::warn!(participant = %participant_id, "no due interval: {err}");
                None
            }
        }
    }
}
