//! Journey Domain - typed core for the participant journey
//!
//! Value types shared by the storage and orchestration layers:
//! - Identifier newtypes (ULID-backed)
//! - The ordered session-type state machine
//! - Opaque access tokens
//! - Participant, session, config and survey-instance records
//!
//! This crate is deliberately free of async, storage and I/O concerns;
//! it only knows what the records *are* and which transitions are
//! legal.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod ids;
pub mod instance;
pub mod participant;
pub mod session;
pub mod session_type;
pub mod token;

// Re-exports for convenience
pub use config::{SessionConfig, SurveySlot, DEFAULT_DAYS_UNTIL_NEXT};
pub use ids::{ConfigId, FacilitatorId, InstanceId, ParticipantId, RequestId, SessionId, SurveyId};
pub use instance::{InstanceState, SurveyInstance};
pub use participant::Participant;
pub use session::{derive_cohort_label, CompletionState, JourneySession, SessionProfile};
pub use session_type::{ParseSessionTypeError, SessionType, SESSION_ORDER};
pub use token::AccessToken;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
