//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every record in the simulation core has a strongly-typed ID so that an
//! entity ID can never be passed where a zone or event ID is expected. All
//! IDs use UUID v7 (time-ordered) and are never reused, which is what lets
//! dirty sets and the spatial index hold on to an ID after its record is
//! gone without risk of aliasing a newer record.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
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
    /// Unique identifier for any spatially placed record: agent, animal,
    /// building, zone marker, or resource node.
    EntityId
}

define_id! {
    /// Unique identifier for a tagged spatial region (shelter, market, ...).
    ZoneId
}

define_id! {
    /// Unique identifier for an emitted domain event.
    EventId
}

define_id! {
    /// Unique identifier for a household that agents are housed in.
    HouseholdId
}
