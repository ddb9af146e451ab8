//! Derived access grants.
//!
//! A grant is the capability record an approval produces: three monotonic
//! booleans plus a fixed seven-day window. It is derived state — the request
//! remains the source of truth for who decided what — but it is what the
//! read path consults on every registry access.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use registra_core::{GrantId, GroupId, RequestId, TenantScope, UserId};

use crate::request::{AccessRequest, Capability, RegistryKind};

/// Access window length in days. Fixed, not configurable per request.
pub const GRANT_TTL_DAYS: i64 = 7;

/// A time-boxed capability over one registry in one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Unique identifier.
    pub id: GrantId,
    /// The approved request this grant derives from.
    pub request_id: RequestId,
    /// The grant holder.
    pub user_id: UserId,
    /// The scope the capability applies in.
    pub scope: TenantScope,
    /// The registry the capability applies to.
    pub registry: RegistryKind,
    /// Optional sub-scope carried over from the request.
    pub group_id: Option<GroupId>,
    /// May read rows.
    pub can_view: bool,
    /// May submit new rows. Implies `can_view`.
    pub can_add: bool,
    /// May modify rows. Implies `can_add`.
    pub can_edit: bool,
    /// False once revoked; grants are never hard-deleted.
    pub is_active: bool,
    /// The reviewer whose approval produced this grant.
    pub granted_by: Option<UserId>,
    /// When the grant was (last) issued.
    pub granted_at: DateTime<Utc>,
    /// End of the access window: `granted_at + 7 days`.
    pub expires_at: DateTime<Utc>,
}

impl AccessGrant {
    /// Issue a grant from an approved request.
    ///
    /// The capability flags follow the monotonic rule: edit implies add
    /// implies view.
    pub fn issue(request: &AccessRequest, now: DateTime<Utc>) -> Self {
        let (can_view, can_add, can_edit) = request.capability.flags();
        Self {
            id: GrantId::new(),
            request_id: request.id,
            user_id: request.requester,
            scope: request.scope.clone(),
            registry: request.registry,
            group_id: request.group_id,
            can_view,
            can_add,
            can_edit,
            is_active: true,
            granted_by: request.decided_by,
            granted_at: now,
            expires_at: now + Duration::days(GRANT_TTL_DAYS),
        }
    }

    /// Re-approval of an equivalent request refreshes the window in place
    /// rather than stacking a second grant.
    pub fn refresh(&mut self, request: &AccessRequest, now: DateTime<Utc>) {
        let (can_view, can_add, can_edit) = request.capability.flags();
        self.request_id = request.id;
        self.can_view = can_view;
        self.can_add = can_add;
        self.can_edit = can_edit;
        self.is_active = true;
        self.granted_by = request.decided_by;
        self.granted_at = now;
        self.expires_at = now + Duration::days(GRANT_TTL_DAYS);
    }

    /// Revoke the grant ahead of its natural expiry. No hard delete.
    pub fn revoke(&mut self) {
        self.is_active = false;
    }

    /// Whether the grant is live at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && now < self.expires_at
    }

    /// Whether this grant satisfies a read/write of `needed` level against
    /// `registry` in `scope` at `now`.
    pub fn satisfies(
        &self,
        registry: RegistryKind,
        scope: &TenantScope,
        needed: Capability,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.is_live(now) || self.registry != registry || self.scope != *scope {
            return false;
        }
        match needed {
            Capability::View => self.can_view,
            Capability::Add => self.can_add,
            Capability::Edit => self.can_edit,
        }
    }
}
