//! Journey Core - orchestration over the participant journey
//!
//! The engine behind the survey journey:
//! - resolves public access URLs (fail-closed two-token check)
//! - binds participants to external survey instances, exactly once
//! - projects instance lifecycle state onto participant flags
//! - advances completed participants through the seven-stage journey
//! - triggers the journey-completion survey for the company contact
//!
//! # Example
//!
//! ```rust,ignore
//! use journey_core::{JourneyConfig, JourneyService, RequestContext, TracingNotifier};
//! use std::sync::Arc;
//!
//! # async fn example(backend: Arc<dyn journey_core::SurveyBackend>) -> Result<(), journey_core::JourneyError> {
//! let service = JourneyService::new(JourneyConfig::new(), backend, Arc::new(TracingNotifier));
//!
//! let ctx = RequestContext::public();
//! let resolution = service.resolve(&ctx, &session_token, &participant_token).await?;
//! println!("fill in at {}", resolution.fill_url);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod binder;
pub mod config;
pub mod context;
pub mod error;
pub mod issuer;
pub mod progression;
pub mod resolver;
pub mod service;
pub mod sync;
pub mod test_harness;
pub mod traits;

// Re-exports for convenience
pub use binder::SurveyInstanceBinder;
pub use config::JourneyConfig;
pub use context::{Clock, ManualClock, RequestContext, SystemClock};
pub use error::JourneyError;
pub use issuer::TokenIssuer;
pub use progression::{ProgressionEngine, ProgressionOutcome};
pub use resolver::{Resolution, TokenResolver};
pub use service::JourneyService;
pub use sync::{SurveyStateSync, SyncOutcome};
pub use traits::{InstanceIdentity, Notifier, SurveyBackend, TracingNotifier};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the journey core
    pub use crate::{
        JourneyConfig, JourneyError, JourneyService, Notifier, ProgressionOutcome, RequestContext,
        Resolution, SurveyBackend, SyncOutcome, TracingNotifier,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
