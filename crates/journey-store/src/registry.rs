//! Participant registry
//!
//! The shared participant table with its secondary indexes. Every
//! mutating operation runs inside one critical section, which is what
//! gives the callers their atomicity guarantees:
//! - `(email, session)` is unique; a losing racer gets the winner's
//!   row back instead of a duplicate
//! - at most one `is_latest` row per email; advancing flips the old
//!   row and inserts the successor without an observable gap
//! - access tokens are globally unique, including session-level
//!   survey tokens registered via [`ParticipantRegistry::reserve_token`]

use journey_domain::{AccessToken, Participant, ParticipantId, SessionId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Errors surfaced by registry writes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// No row with the given id
    #[error("participant not found")]
    NotFound,

    /// A row for this `(email, session)` pair already exists
    #[error("participant already exists for this session: {existing}")]
    Conflict {
        /// The row that got there first
        existing: ParticipantId,
    },

    /// The row's access token is already bound elsewhere
    #[error("access token already in use")]
    TokenInUse,

    /// The row being advanced is no longer the latest for its email
    #[error("stale advance: participant is not the latest record")]
    StaleAdvance,
}

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<ParticipantId, Participant>,
    by_token: HashMap<String, ParticipantId>,
    by_email_session: HashMap<(String, SessionId), ParticipantId>,
    latest_by_email: HashMap<String, ParticipantId>,
    reserved_tokens: HashSet<String>,
}

impl Inner {
    fn token_taken(&self, token: &str) -> bool {
        self.by_token.contains_key(token) || self.reserved_tokens.contains(token)
    }

    fn index(&mut self, participant: &Participant) {
        self.by_token
            .insert(participant.access_token.as_str().to_string(), participant.id);
        self.by_email_session.insert(
            (participant.email.clone(), participant.session_id),
            participant.id,
        );
        if participant.is_latest {
            self.latest_by_email
                .insert(participant.email.clone(), participant.id);
        }
    }
}

/// In-memory participant table
///
/// Mutations take the single table lock; reads clone rows out so no
/// guard escapes.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    inner: Mutex<Inner>,
}

/// Canonical email form used for every identity comparison
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

impl ParticipantRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a first-contact row, or return the row that won the race
    ///
    /// The `(email, session)` check and the insert happen under one
    /// lock, so two concurrent first accesses cannot both create a
    /// row; the loser receives the winner's row and `false`.
    ///
    /// # Errors
    /// - [`RegistryError::TokenInUse`] when the row's token collides
    /// - [`RegistryError::Conflict`] when a latest row for this email
    ///   already exists in a *different* session (first contact must
    ///   go through progression instead)
    pub fn insert_or_current(
        &self,
        mut participant: Participant,
    ) -> Result<(Participant, bool), RegistryError> {
        participant.email = normalize_email(&participant.email);
        let mut inner = self.inner.lock();

        let key = (participant.email.clone(), participant.session_id);
        if let Some(existing) = inner.by_email_session.get(&key) {
            let current = inner.rows[existing].clone();
            tracing::debug!(
                participant = %current.id,
                email = %current.email,
                "duplicate first contact; returning existing row"
            );
            return Ok((current, false));
        }

        if let Some(latest) = inner.latest_by_email.get(&participant.email) {
            return Err(RegistryError::Conflict { existing: *latest });
        }

        if inner.token_taken(participant.access_token.as_str()) {
            return Err(RegistryError::TokenInUse);
        }

        participant.is_latest = true;
        inner.index(&participant);
        inner.rows.insert(participant.id, participant.clone());
        Ok((participant, true))
    }

    /// Atomically supersede `old_id` with its successor row
    ///
    /// One critical section re-checks that the old row is still the
    /// latest, flips its flag, and inserts the successor. A reader can
    /// never observe zero or two latest rows for the email.
    ///
    /// # Errors
    /// - [`RegistryError::NotFound`] when `old_id` does not exist
    /// - [`RegistryError::StaleAdvance`] when the old row already lost
    ///   its latest flag (a concurrent advance won)
    /// - [`RegistryError::Conflict`] when the successor's
    ///   `(email, session)` already exists
    /// - [`RegistryError::TokenInUse`] on token collision
    pub fn advance(
        &self,
        old_id: ParticipantId,
        mut successor: Participant,
    ) -> Result<Participant, RegistryError> {
        successor.email = normalize_email(&successor.email);
        let mut inner = self.inner.lock();

        let old = inner.rows.get(&old_id).ok_or(RegistryError::NotFound)?;
        if !old.is_latest {
            return Err(RegistryError::StaleAdvance);
        }

        let key = (successor.email.clone(), successor.session_id);
        if let Some(existing) = inner.by_email_session.get(&key) {
            return Err(RegistryError::Conflict {
                existing: *existing,
            });
        }
        if inner.token_taken(successor.access_token.as_str()) {
            return Err(RegistryError::TokenInUse);
        }

        successor.is_latest = true;
        successor.previous = Some(old_id);

        if let Some(old) = inner.rows.get_mut(&old_id) {
            old.is_latest = false;
        }
        inner.index(&successor);
        inner.rows.insert(successor.id, successor.clone());
        Ok(successor)
    }

    /// Mutate a row's lifecycle/binding fields in place
    ///
    /// The closure must not touch identity fields (`email`,
    /// `session_id`, `access_token`, `is_latest`); those are owned by
    /// the insert/advance paths that maintain the indexes.
    ///
    /// # Errors
    /// - [`RegistryError::NotFound`] when the row does not exist
    pub fn update(
        &self,
        id: ParticipantId,
        f: impl FnOnce(&mut Participant),
    ) -> Result<Participant, RegistryError> {
        let mut inner = self.inner.lock();
        let row = inner.rows.get_mut(&id).ok_or(RegistryError::NotFound)?;
        f(row);
        Ok(row.clone())
    }

    /// Fetch a row by id
    #[must_use]
    pub fn get(&self, id: ParticipantId) -> Option<Participant> {
        self.inner.lock().rows.get(&id).cloned()
    }

    /// Fetch a row by its access token (fail-closed: exact match only)
    #[must_use]
    pub fn find_by_token(&self, token: &AccessToken) -> Option<Participant> {
        let inner = self.inner.lock();
        let id = inner.by_token.get(token.as_str())?;
        inner.rows.get(id).cloned()
    }

    /// Fetch the latest row for an email
    #[must_use]
    pub fn find_latest_by_email(&self, email: &str) -> Option<Participant> {
        let inner = self.inner.lock();
        let id = inner.latest_by_email.get(&normalize_email(email))?;
        inner.rows.get(id).cloned()
    }

    /// Fetch the row for an `(email, session)` pair
    #[must_use]
    pub fn find_by_email_session(&self, email: &str, session: SessionId) -> Option<Participant> {
        let inner = self.inner.lock();
        let id = inner
            .by_email_session
            .get(&(normalize_email(email), session))?;
        inner.rows.get(id).cloned()
    }

    /// Walk the audit chain for an email, newest first
    #[must_use]
    pub fn chain(&self, email: &str) -> Vec<Participant> {
        let inner = self.inner.lock();
        let mut out = Vec::new();
        let mut cursor = inner.latest_by_email.get(&normalize_email(email)).copied();
        while let Some(id) = cursor {
            match inner.rows.get(&id) {
                Some(row) => {
                    cursor = row.previous;
                    out.push(row.clone());
                }
                None => break,
            }
        }
        out
    }

    /// All rows registered under a session
    #[must_use]
    pub fn for_session(&self, session: SessionId) -> Vec<Participant> {
        self.inner
            .lock()
            .rows
            .values()
            .filter(|p| p.session_id == session)
            .cloned()
            .collect()
    }

    /// Whether a token is already bound or reserved
    #[must_use]
    pub fn contains_token(&self, token: &str) -> bool {
        self.inner.lock().token_taken(token)
    }

    /// Reserve a token outside the participant table (session-level
    /// survey tokens share the uniqueness domain); returns `false`
    /// when already taken
    pub fn reserve_token(&self, token: &AccessToken) -> bool {
        let mut inner = self.inner.lock();
        if inner.token_taken(token.as_str()) {
            return false;
        }
        inner.reserved_tokens.insert(token.as_str().to_string());
        true
    }

    /// Snapshot of every row (test/inspection helper)
    #[must_use]
    pub fn all(&self) -> Vec<Participant> {
        self.inner.lock().rows.values().cloned().collect()
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().rows.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
