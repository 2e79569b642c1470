//! Progression engine
//!
//! Moves a completed participant to the next journey stage: resolves
//! the successor session, mints a fresh token, and atomically
//! supersedes the old record. Duplicate invocations (retried requests,
//! repeated cron sweeps) converge on the same successor row instead of
//! creating duplicates or moving a participant twice.

use crate::error::JourneyError;
use crate::issuer::TokenIssuer;
use crate::RequestContext;
use journey_domain::{FacilitatorId, Participant, ParticipantId, SessionType};
use journey_store::{ParticipantRegistry, RegistryError, SessionDirectory};
use std::sync::Arc;

/// What `create_or_advance` did for an email
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressionOutcome {
    /// A fresh kickoff participant was created
    Created,
    /// The existing latest record was returned unchanged
    Unchanged,
    /// The participant advanced to the next stage
    Advanced,
}

/// Drives participants forward through the journey stages
pub struct ProgressionEngine {
    registry: Arc<ParticipantRegistry>,
    directory: Arc<SessionDirectory>,
    issuer: TokenIssuer,
}

impl ProgressionEngine {
    /// Create an engine over the shared stores
    #[must_use]
    pub fn new(
        registry: Arc<ParticipantRegistry>,
        directory: Arc<SessionDirectory>,
        issuer: TokenIssuer,
    ) -> Self {
        Self {
            registry,
            directory,
            issuer,
        }
    }

    /// The stage after `current`, or `None` when terminal
    #[inline]
    #[must_use]
    pub fn next(current: SessionType) -> Option<SessionType> {
        current.next()
    }

    /// Advance a completed participant to the next stage
    ///
    /// Copies identity and metadata into a successor record with a
    /// fresh token and cleared lifecycle, atomically flipping the old
    /// record's latest flag. Losing a concurrent advance returns the
    /// winner's successor, so repeated invocations are idempotent.
    ///
    /// # Errors
    /// - [`JourneyError::NotReady`] when the survey is not completed
    /// - [`JourneyError::InvalidTransition`] at the last stage
    /// - [`JourneyError::NotFound`] when the successor session is not
    ///   configured for the facilitator (never silently skipped)
    pub fn advance(
        &self,
        ctx: &RequestContext,
        participant_id: ParticipantId,
    ) -> Result<Participant, JourneyError> {
        let participant = self
            .registry
            .get(participant_id)
            .ok_or_else(|| JourneyError::NotFound("participant".to_string()))?;

        if !participant.completed {
            return Err(JourneyError::NotReady {
                participant: participant.id,
            });
        }
        let next_type = participant
            .session_type
            .next()
            .ok_or(JourneyError::InvalidTransition {
                at: participant.session_type,
            })?;

        let next_session = self
            .directory
            .resolve_session(participant.facilitator, next_type)?;

        let token = self.issuer.issue(&self.registry)?;
        let successor = participant.successor(next_session.id, next_type, token, ctx.now());

        match self.registry.advance(participant.id, successor) {
            Ok(advanced) => {
                tracing::info!(
                    request = %ctx.request_id,
                    email = %advanced.email,
                    from = %participant.session_type,
                    to = %next_type,
                    participant = %advanced.id,
                    "participant advanced"
                );
                Ok(advanced)
            }
            // A concurrent advance already materialized the successor;
            // hand back the row that won
            Err(RegistryError::Conflict { existing }) => self
                .registry
                .get(existing)
                .ok_or_else(|| JourneyError::NotFound("participant".to_string())),
            Err(RegistryError::StaleAdvance) => self
                .registry
                .find_latest_by_email(&participant.email)
                .ok_or(JourneyError::StaleAdvance),
            Err(other) => Err(other.into()),
        }
    }

    /// Entry point for first contact and the periodic follow-up sweep
    ///
    /// - unknown email: creates a kickoff participant for the
    ///   facilitator
    /// - latest record incomplete: returns it unchanged
    /// - latest record completed: advances it
    ///
    /// # Errors
    /// - [`JourneyError::NotFound`] when the facilitator has no
    ///   kickoff session (first contact) or no successor session
    ///   (advance)
    /// - [`JourneyError::InvalidTransition`] when the completed
    ///   participant already sits at the last stage
    pub fn create_or_advance(
        &self,
        ctx: &RequestContext,
        email: &str,
        facilitator: FacilitatorId,
    ) -> Result<(Participant, ProgressionOutcome), JourneyError> {
        if let Some(latest) = self.registry.find_latest_by_email(email) {
            if !latest.completed {
                tracing::debug!(
                    request = %ctx.request_id,
                    participant = %latest.id,
                    "survey still open; nothing to advance"
                );
                return Ok((latest, ProgressionOutcome::Unchanged));
            }
            let advanced = self.advance(ctx, latest.id)?;
            return Ok((advanced, ProgressionOutcome::Advanced));
        }

        let kickoff = self
            .directory
            .resolve_session(facilitator, SessionType::Kickoff)?;
        let token = self.issuer.issue(&self.registry)?;
        let display_name = email.split('@').next().unwrap_or(email).to_string();
        let participant = Participant::new(
            email,
            display_name,
            kickoff.id,
            SessionType::Kickoff,
            facilitator,
            token,
            ctx.now(),
        );

        let (row, inserted) = self.registry.insert_or_current(participant)?;
        if inserted {
            tracing::info!(
                request = %ctx.request_id,
                participant = %row.id,
                email = %row.email,
                session = %kickoff.id,
                "created kickoff participant"
            );
            Ok((row, ProgressionOutcome::Created))
        } else {
            Ok((row, ProgressionOutcome::Unchanged))
        }
    }
}
