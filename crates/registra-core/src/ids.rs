//! Typed identifiers.
//!
//! UUID newtypes so a grant id can never be passed where an officer id is
//! expected. All are v4, serde-transparent, and display as the bare UUID.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The inner UUID.
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// A registered user (requester, reviewer, or administrator).
    UserId
);
uuid_id!(
    /// An access request in the approval pipeline.
    RequestId
);
uuid_id!(
    /// A derived access grant.
    GrantId
);
uuid_id!(
    /// A confidential document grant; also the blob-store key for the
    /// rendered artifact.
    DocumentId
);
uuid_id!(
    /// An officer-credentialing request.
    OfficerRequestId
);
uuid_id!(
    /// The stable identity of an officer (`officer_uuid`). Survives
    /// reactivation and relocation; the target of CODE D merges.
    OfficerId
);
uuid_id!(
    /// An optional sub-scope (e.g. a group) narrowing an access request.
    GroupId
);
