//! Type-safe entity identifiers.
//!
//! Every entity is keyed by a UUID. Each kind gets its own newtype so a
//! venue id can never be passed where a device id is expected.

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Wraps an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
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

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of an [`super::Organizer`].
    OrganizerId
);
entity_id!(
    /// Identifier of a [`super::Venue`].
    VenueId
);
entity_id!(
    /// Identifier of a [`super::Device`].
    DeviceId
);
entity_id!(
    /// Identifier of a [`super::Player`].
    PlayerId
);
entity_id!(
    /// Identifier of a [`super::DeviceAssignment`].
    AssignmentId
);
entity_id!(
    /// Identifier of a [`super::StatusQuery`].
    StatusQueryId
);
