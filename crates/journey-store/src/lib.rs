//! Journey Store - in-memory repositories
//!
//! Explicit repository interfaces over the shared participant/config
//! tables:
//! - [`ParticipantRegistry`] - participant rows, uniqueness and
//!   "latest" bookkeeping, atomic advance
//! - [`SessionConfigStore`] - active survey configuration per slot
//! - [`SessionDirectory`] - sessions by facilitator/stage, cohort
//!   labels, follow-up materialization
//!
//! All mutation happens inside single critical sections so that the
//! table invariants (one latest row per email, one row per
//! `(email, session)`) hold under concurrent request handlers.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod configs;
pub mod directory;
pub mod registry;

pub use configs::{ConfigLookupError, SessionConfigStore};
pub use directory::{DirectoryError, SessionDirectory};
pub use registry::{ParticipantRegistry, RegistryError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
