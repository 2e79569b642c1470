//! Property tests for the survey-state projection: any sequence of
//! state observations, in any order and with any repetition, leaves
//! the participant flags monotonic and the first-transition
//! timestamps in place.

use chrono::Utc;
use journey_core::{RequestContext, SurveyStateSync};
use journey_domain::{
    AccessToken, FacilitatorId, InstanceState, Participant, SessionConfig, SessionId, SessionType,
    SurveyId, SurveyInstance, SurveySlot,
};
use journey_store::{ParticipantRegistry, SessionConfigStore};
use proptest::prelude::*;
use std::sync::Arc;

fn any_state() -> impl Strategy<Value = InstanceState> {
    prop_oneof![
        Just(InstanceState::New),
        Just(InstanceState::InProgress),
        Just(InstanceState::Done),
    ]
}

struct Fixture {
    registry: Arc<ParticipantRegistry>,
    sync: SurveyStateSync,
    instance: SurveyInstance,
    participant: Participant,
}

fn setup() -> Fixture {
    let registry = Arc::new(ParticipantRegistry::new());
    let configs = Arc::new(SessionConfigStore::new());
    configs.upsert(SessionConfig::new(
        SurveySlot::Session(SessionType::Kickoff),
        SurveyId::new(),
    ));

    let participant = registry
        .insert_or_current(Participant::new(
            "a@x.com",
            "A",
            SessionId::new(),
            SessionType::Kickoff,
            FacilitatorId::new(),
            AccessToken::generate(),
            Utc::now(),
        ))
        .unwrap()
        .0;
    let instance = SurveyInstance::new(
        SurveyId::new(),
        "a@x.com",
        "A",
        AccessToken::generate(),
        Utc::now(),
    )
    .for_participant(participant.id);

    let sync = SurveyStateSync::new(Arc::clone(&registry), configs);
    Fixture {
        registry,
        sync,
        instance,
        participant,
    }
}

proptest! {
    #[test]
    fn prop_flags_are_monotonic_under_any_observation_order(
        states in proptest::collection::vec(any_state(), 1..20)
    ) {
        let f = setup();
        let ctx = RequestContext::new("webhook");

        let mut was_started = false;
        let mut was_completed = false;
        for state in &states {
            let mut observed = f.instance.clone();
            observed.state = *state;
            let outcome = f.sync.observe(&ctx, &observed).unwrap();
            let row = outcome.participant.unwrap();

            // Never un-set
            prop_assert!(!(was_started && !row.started));
            prop_assert!(!(was_completed && !row.completed));
            // Completion always implies started
            prop_assert!(!row.completed || row.started);
            was_started = row.started;
            was_completed = row.completed;
        }

        let row = f.registry.get(f.participant.id).unwrap();
        let max_rank = states.iter().map(|s| s.rank()).max().unwrap();
        prop_assert_eq!(row.started, max_rank >= InstanceState::InProgress.rank());
        prop_assert_eq!(row.completed, max_rank >= InstanceState::Done.rank());
        prop_assert_eq!(row.started_at.is_some(), row.started);
        prop_assert_eq!(row.completed_at.is_some(), row.completed);
    }

    #[test]
    fn prop_first_completion_timestamp_never_moves(
        repeats in 1usize..10
    ) {
        let f = setup();
        let ctx = RequestContext::new("webhook");
        let mut observed = f.instance.clone();
        observed.state = InstanceState::Done;

        let first = f.sync.observe(&ctx, &observed).unwrap();
        prop_assert!(first.newly_completed);
        let stamp = first.participant.unwrap().completed_at;

        for _ in 0..repeats {
            let again = f.sync.observe(&ctx, &observed).unwrap();
            prop_assert!(!again.newly_completed);
            prop_assert_eq!(again.participant.unwrap().completed_at, stamp);
        }
    }
}
