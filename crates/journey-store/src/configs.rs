//! Survey configuration store
//!
//! Lookup of the single active configuration per survey slot. When
//! data drift leaves several rows active for one slot, the lookup is
//! still deterministic (lowest `(sequence, id)` wins) but the
//! violation is logged for operators rather than silently hidden.

use journey_domain::{ConfigId, SessionConfig, SurveySlot};
use parking_lot::RwLock;

/// Errors surfaced by config lookups
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigLookupError {
    /// No active configuration for the slot
    #[error("no active survey configuration for slot: {0}")]
    NotFound(SurveySlot),
}

/// In-memory survey configuration table
#[derive(Debug, Default)]
pub struct SessionConfigStore {
    rows: RwLock<Vec<SessionConfig>>,
}

impl SessionConfigStore {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration row
    pub fn upsert(&self, config: SessionConfig) {
        let mut rows = self.rows.write();
        if let Some(existing) = rows.iter_mut().find(|r| r.id == config.id) {
            *existing = config;
        } else {
            rows.push(config);
        }
    }

    /// Deactivate a row by id; returns whether it existed
    pub fn deactivate(&self, id: ConfigId) -> bool {
        let mut rows = self.rows.write();
        match rows.iter_mut().find(|r| r.id == id) {
            Some(row) => {
                row.active = false;
                true
            }
            None => false,
        }
    }

    /// Resolve the single active configuration for a slot
    ///
    /// Deterministic under duplicate actives: lowest `(sequence, id)`
    /// wins and the violation is logged as a warning.
    ///
    /// # Errors
    /// - [`ConfigLookupError::NotFound`] when no active row exists;
    ///   callers degrade the related binding to "unconfigured" rather
    ///   than failing the whole request
    pub fn active_config_for(&self, slot: SurveySlot) -> Result<SessionConfig, ConfigLookupError> {
        let rows = self.rows.read();
        let mut actives: Vec<&SessionConfig> = rows
            .iter()
            .filter(|r| r.active && r.slot == slot)
            .collect();

        if actives.len() > 1 {
            let ids: Vec<String> = actives.iter().map(|r| r.id.to_string()).collect();
            tracing::warn!(
                slot = %slot,
                config_ids = ?ids,
                "multiple active survey configs for one slot; picking lowest (sequence, id)"
            );
        }

        actives.sort_by_key(|r| (r.sequence, r.id));
        actives
            .first()
            .map(|r| (*r).clone())
            .ok_or(ConfigLookupError::NotFound(slot))
    }

    /// Snapshot of every row
    #[must_use]
    pub fn all(&self) -> Vec<SessionConfig> {
        self.rows.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use journey_domain::{SessionType, SurveyId};

    #[test]
    fn lookup_finds_the_active_row() {
        let store = SessionConfigStore::new();
        let config = SessionConfig::new(SurveySlot::Session(SessionType::Kickoff), SurveyId::new());
        store.upsert(config.clone());

        let found = store
            .active_config_for(SurveySlot::Session(SessionType::Kickoff))
            .unwrap();
        assert_eq!(found.id, config.id);
    }

    #[test]
    fn missing_slot_is_not_found() {
        let store = SessionConfigStore::new();
        assert_eq!(
            store.active_config_for(SurveySlot::Completion).unwrap_err(),
            ConfigLookupError::NotFound(SurveySlot::Completion)
        );
    }

    #[test]
    fn inactive_rows_are_ignored() {
        let store = SessionConfigStore::new();
        store.upsert(
            SessionConfig::new(SurveySlot::Session(SessionType::Kickoff), SurveyId::new())
                .inactive(),
        );
        assert!(store
            .active_config_for(SurveySlot::Session(SessionType::Kickoff))
            .is_err());
    }

    #[test]
    fn duplicate_actives_resolve_by_sequence_then_id() {
        let store = SessionConfigStore::new();
        let slot = SurveySlot::Session(SessionType::Followup1);

        let late = SessionConfig::new(slot, SurveyId::new()).with_sequence(20);
        let early = SessionConfig::new(slot, SurveyId::new()).with_sequence(5);
        store.upsert(late);
        store.upsert(early.clone());

        let found = store.active_config_for(slot).unwrap();
        assert_eq!(found.id, early.id);
    }

    #[test]
    fn equal_sequences_resolve_by_lowest_id() {
        let store = SessionConfigStore::new();
        let slot = SurveySlot::Session(SessionType::Followup2);

        let first = SessionConfig::new(slot, SurveyId::new());
        // ULID ordering needs a tick between creations
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = SessionConfig::new(slot, SurveyId::new());
        assert!(first.id < second.id);
        store.upsert(second);
        store.upsert(first.clone());

        assert_eq!(store.active_config_for(slot).unwrap().id, first.id);
    }

    #[test]
    fn deactivate_removes_from_lookup() {
        let store = SessionConfigStore::new();
        let config = SessionConfig::new(SurveySlot::Completion, SurveyId::new());
        store.upsert(config.clone());
        assert!(store.deactivate(config.id));
        assert!(store.active_config_for(SurveySlot::Completion).is_err());
    }
}
