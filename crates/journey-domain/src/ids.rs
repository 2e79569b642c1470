//! Identifier newtypes
//!
//! ULID-backed identifiers for every record kind. ULIDs keep creation
//! order sortable, which the audit chain and the deterministic
//! duplicate-config tie-break both rely on.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a fresh identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Unique participant record identifier
    ParticipantId
);

id_type!(
    /// Unique journey-session identifier
    SessionId
);

id_type!(
    /// Identifier of a survey template in the external survey subsystem
    SurveyId
);

id_type!(
    /// Identifier of one external survey instance (one answer set)
    InstanceId
);

id_type!(
    /// Identifier of a survey configuration row
    ConfigId
);

id_type!(
    /// Identifier of a facilitator (the cohort owner)
    FacilitatorId
);

id_type!(
    /// Per-request correlation identifier carried by the request context
    RequestId
);
