//! Actor context and the role set.
//!
//! An [`Actor`] is resolved once per call at the API boundary (from the
//! session) and passed explicitly into every workflow operation. Core logic
//! never consults ambient session state.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;
use crate::scope::TenantScope;

/// The role set.
///
/// One unrestricted administrative role plus scope-limited roles. Scoped
/// roles only carry weight inside their own tenant scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Unrestricted administrator. Reviews and reads anywhere.
    Admin,
    /// Reviewer for a single local congregation. May approve or reject
    /// requests whose requester scope matches their own.
    LocalReviewer,
    /// Clerk for a single local congregation. Reads home-scope registries
    /// without a grant but cannot review requests.
    LocalClerk,
    /// Ordinary member. Needs an approved grant for any registry access.
    Member,
}

impl Role {
    /// Stable string form, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::LocalReviewer => "local_reviewer",
            Self::LocalClerk => "local_clerk",
            Self::Member => "member",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated caller: identity, role, and home tenant scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The calling user.
    pub user_id: UserId,
    /// The caller's role.
    pub role: Role,
    /// The caller's home scope.
    pub scope: TenantScope,
}

impl Actor {
    /// Build an actor context.
    pub fn new(user_id: UserId, role: Role, scope: TenantScope) -> Self {
        Self {
            user_id,
            role,
            scope,
        }
    }

    /// Whether this actor holds the unrestricted administrative role.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this actor may review (approve/reject) a request submitted
    /// from `requester_scope`.
    ///
    /// Admins review anywhere; the scoped reviewer role only where its own
    /// scope matches the requester's. Clerks and members never review.
    pub fn can_review(&self, requester_scope: &TenantScope) -> bool {
        match self.role {
            Role::Admin => true,
            Role::LocalReviewer => self.scope == *requester_scope,
            Role::LocalClerk | Role::Member => false,
        }
    }

    /// Whether this actor's role bypasses the grant requirement for reading
    /// registries in `scope`.
    ///
    /// Admins bypass everywhere; local reviewers and clerks only in their
    /// home scope. Members never bypass.
    pub fn has_scope_bypass(&self, scope: &TenantScope) -> bool {
        match self.role {
            Role::Admin => true,
            Role::LocalReviewer | Role::LocalClerk => self.scope == *scope,
            Role::Member => false,
        }
    }
}
