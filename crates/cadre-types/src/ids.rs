//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every entity in the simulation has a strongly-typed ID to prevent
//! accidental mixing of identifiers at compile time. All IDs use UUID v7
//! (time-ordered) for efficient database indexing.
//!
//! The `new()` constructors exist for app-side generation (workers created
//! at onboarding, scheduled communications parsed out of plan text, tests).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a worker in the simulated organization.
    WorkerId
}

define_id! {
    /// Unique identifier for a project.
    ProjectId
}

define_id! {
    /// Unique identifier for an event in the event log.
    EventId
}

define_id! {
    /// Unique identifier for a dispatched message, assigned by the
    /// delivery collaborator and used for reply threading.
    MessageId
}

define_id! {
    /// Unique identifier for a scheduled (not yet dispatched) communication.
    CommId
}

define_id! {
    /// Unique identifier for a project chat room.
    RoomId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let worker = WorkerId::new();
        let project = ProjectId::new();
        // These are different types -- the compiler enforces no mixing.
        assert_ne!(worker.into_inner(), Uuid::nil());
        assert_ne!(project.into_inner(), Uuid::nil());
    }

    #[test]
    fn id_roundtrip_serde() {
        let original = WorkerId::new();
        let json = serde_json::to_string(&original).ok();
        assert!(json.is_some());
        let restored: Result<WorkerId, _> =
            serde_json::from_str(json.as_deref().unwrap_or(""));
        assert!(restored.is_ok());
    }

    #[test]
    fn id_display_matches_uuid() {
        let id = MessageId::new();
        assert_eq!(id.to_string(), id.into_inner().to_string());
    }
}
