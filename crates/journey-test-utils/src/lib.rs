//! Testing utilities for the journey workspace
//!
//! Shared fixtures: a fully wired service over the in-memory survey
//! backend, seeded cohorts, and clock-controlled request contexts.

#![allow(missing_docs)]

use chrono::{DateTime, Duration, Utc};
use journey_core::test_harness::InMemorySurveyBackend;
use journey_core::{
    JourneyConfig, JourneyService, ManualClock, RequestContext, SurveyBackend, TracingNotifier,
};
use journey_domain::{
    FacilitatorId, JourneySession, SessionConfig, SessionProfile, SessionType, SurveyId,
    SurveySlot, SESSION_ORDER,
};
use std::sync::Arc;

/// A service plus handles to its collaborators
pub struct TestJourney {
    pub service: JourneyService,
    pub backend: Arc<InMemorySurveyBackend>,
    pub facilitator: FacilitatorId,
}

/// Install a subscriber reading `RUST_LOG`; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wire a service over the in-memory backend and log-only notifier
pub fn setup_service(config: JourneyConfig) -> TestJourney {
    init_tracing();
    let backend = Arc::new(InMemorySurveyBackend::new());
    let service = JourneyService::new(
        config,
        Arc::clone(&backend) as Arc<dyn SurveyBackend>,
        Arc::new(TracingNotifier),
    );
    TestJourney {
        service,
        backend,
        facilitator: FacilitatorId::new(),
    }
}

/// A service with an active survey config for every slot
pub fn setup_configured_service(config: JourneyConfig) -> TestJourney {
    let journey = setup_service(config);
    seed_configs(&journey.service);
    journey
}

/// One active config per session stage plus the completion slot
pub fn seed_configs(service: &JourneyService) {
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

/// A profile with company, contact and contact email filled in
pub fn acme_profile() -> SessionProfile {
    SessionProfile {
        company_name: Some("Acme".to_string()),
        contact_person: Some("Jo".to_string()),
        contact_email: Some("jo@acme.com".to_string()),
        ..SessionProfile::default()
    }
}

/// Follow-up dates spaced `gap` apart, starting at `first`
pub fn followup_dates(first: DateTime<Utc>, gap: Duration) -> Vec<(SessionType, DateTime<Utc>)> {
    SESSION_ORDER
        .iter()
        .skip(1)
        .enumerate()
        .map(|(i, stage)| (*stage, first + gap * i32::try_from(i).unwrap_or(0)))
        .collect()
}

/// Create a kickoff and materialize all six follow-ups
pub fn seed_journey(journey: &TestJourney, ctx: &RequestContext) -> JourneySession {
    let kickoff = journey
        .service
        .create_kickoff(ctx, "Acme Journey", journey.facilitator, acme_profile())
        .expect("create kickoff");
    journey
        .service
        .schedule_followups(
            ctx,
            kickoff.id,
            &followup_dates(ctx.now(), Duration::days(180)),
        )
        .expect("schedule follow-ups");
    kickoff
}

/// A request context on a manual clock frozen at `start`
pub fn manual_context(actor: &str, start: DateTime<Utc>) -> (RequestContext, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_at(start));
    let ctx = RequestContext::with_clock(actor, Arc::clone(&clock) as Arc<dyn journey_core::Clock>);
    (ctx, clock)
}
