//! Request context
//!
//! Every core operation takes an explicit [`RequestContext`] carrying
//! the acting principal, a correlation id for the operator log, and
//! the clock. There is no implicit ambient environment; tests inject
//! a [`ManualClock`] to control time.

use chrono::{DateTime, Duration, Utc};
use journey_domain::RequestId;
use parking_lot::Mutex;
use std::sync::Arc;

/// Source of the current time
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// The current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock with settable time
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    #[must_use]
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// Set the clock to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Per-request context passed to every core operation
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id, present in every log line for this request
    pub request_id: RequestId,
    /// Acting principal (an operator, the cron sweep, or `public`)
    pub actor: String,
    clock: Arc<dyn Clock>,
}

impl RequestContext {
    /// Context for an authenticated or system actor, on wall-clock
    /// time
    #[must_use]
    pub fn new(actor: impl Into<String>) -> Self {
        Self::with_clock(actor, Arc::new(SystemClock))
    }

    /// Context for the unauthenticated public access endpoint
    #[must_use]
    pub fn public() -> Self {
        Self::new("public")
    }

    /// Context with an injected clock
    #[must_use]
    pub fn with_clock(actor: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            request_id: RequestId::new(),
            actor: actor.into(),
            clock,
        }
    }

    /// The current instant per this request's clock
    #[inline]
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
