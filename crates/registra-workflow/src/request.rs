//! # Access Request Workflow
//!
//! The generic request/approval pipeline for registry access.
//!
//! ## States
//!
//! ```text
//! Pending ──▶ Approved   (terminal)
//!    │
//!    └─────▶ Rejected   (terminal)
//! ```
//!
//! Status is mutated exactly once, by a reviewer whose scope covers the
//! requester's. Alongside the primary status a secondary verification
//! status tracks content verification: a view-only approval is final
//! (`Verified`) immediately, while add/edit approvals grant *access* but
//! leave the submitted changes `PendingContent` for a separate verification
//! step — granting the ability to submit changes is decoupled from
//! verifying the changes themselves.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use registra_core::{Actor, GroupId, LocalId, RequestId, TenantScope, UserId};

use crate::grant::GRANT_TTL_DAYS;

/// The registries, differentiated by membership life-stage.
///
/// A closed enum: the variant is resolved once at the API boundary and
/// dispatch never goes back through a string tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryKind {
    /// Pre-credential members.
    Precredential,
    /// Candidates.
    Candidate,
    /// Confirmed members.
    Confirmed,
}

impl RegistryKind {
    /// Stable string form, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Precredential => "precredential",
            Self::Candidate => "candidate",
            Self::Confirmed => "confirmed",
        }
    }

    /// Parse the serde string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "precredential" => Some(Self::Precredential),
            "candidate" => Some(Self::Candidate),
            "confirmed" => Some(Self::Confirmed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability level, used both as the requested type and the granted level.
///
/// Ordered: `Edit` implies `Add` implies `View`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read registry rows.
    View,
    /// Submit new rows.
    Add,
    /// Modify existing rows.
    Edit,
}

impl Capability {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Add => "add",
            Self::Edit => "edit",
        }
    }

    /// Parse the serde string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "view" => Some(Self::View),
            "add" => Some(Self::Add),
            "edit" => Some(Self::Edit),
            _ => None,
        }
    }

    /// The three grant booleans this level implies, per the monotonic rule.
    pub fn flags(&self) -> (bool, bool, bool) {
        match self {
            Self::View => (true, false, false),
            Self::Add => (true, true, false),
            Self::Edit => (true, true, true),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primary request status. Transitions out of `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting review.
    Pending,
    /// Approved (terminal).
    Approved,
    /// Rejected (terminal).
    Rejected,
}

impl RequestStatus {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secondary content-verification status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Not yet decided.
    Unverified,
    /// Access approved; submitted content awaits a separate verification
    /// step (add/edit requests).
    PendingContent,
    /// Fully verified (view-only requests resolve here immediately).
    Verified,
}

impl VerificationStatus {
    /// Stable string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::PendingContent => "pending_content",
            Self::Verified => "verified",
        }
    }
}

/// Errors from the request workflow.
#[derive(Error, Debug, PartialEq)]
pub enum RequestError {
    /// The request has already been decided; status moves out of pending
    /// exactly once.
    #[error("request already {status}; a pending request is required")]
    AlreadyDecided {
        /// The current (terminal) status.
        status: RequestStatus,
    },

    /// The reviewer's scope does not cover the requester's.
    #[error("reviewer scope {reviewer_local} does not cover requester scope {requester_local}")]
    ScopeMismatch {
        /// The reviewer's local congregation.
        reviewer_local: LocalId,
        /// The requester's local congregation.
        requester_local: LocalId,
    },

    /// Rejection requires a non-empty reason.
    #[error("rejection reason must be non-empty")]
    EmptyReason,

    /// An identical (requester, registry, capability, scope, group) request
    /// is already pending.
    #[error("an identical request is already pending")]
    DuplicatePending,

    /// The request is soft-deleted and excluded from every operation.
    #[error("request has been deleted")]
    Tombstoned,
}

/// The key a second concurrent submission must not collide with.
///
/// Mirrors the partial unique index the storage layer enforces on pending,
/// non-tombstoned rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DuplicateKey {
    pub requester: UserId,
    pub registry: RegistryKind,
    pub capability: Capability,
    pub scope: TenantScope,
    pub group_id: Option<GroupId>,
}

/// A registry access request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    /// Unique identifier.
    pub id: RequestId,
    /// The requesting user.
    pub requester: UserId,
    /// The requester's tenant scope.
    pub scope: TenantScope,
    /// Which registry is requested.
    pub registry: RegistryKind,
    /// The requested capability level.
    pub capability: Capability,
    /// Optional sub-scope narrowing the request to one group.
    pub group_id: Option<GroupId>,
    /// Primary status.
    pub status: RequestStatus,
    /// Secondary content-verification status.
    pub verification: VerificationStatus,
    /// Rejection reason, set on rejection only.
    pub rejection_reason: Option<String>,
    /// When the resulting access window closes; set on approval.
    pub expires_at: Option<DateTime<Utc>>,
    /// The reviewer who decided the request.
    pub decided_by: Option<UserId>,
    /// When the request was decided.
    pub decided_at: Option<DateTime<Utc>>,
    /// Soft-delete marker; tombstoned requests are excluded everywhere.
    pub deleted_at: Option<DateTime<Utc>>,
    /// When the request was submitted.
    pub created_at: DateTime<Utc>,
}

impl AccessRequest {
    /// Submit a new request in the `Pending` state.
    ///
    /// The duplicate-pending check happens at the store (and is backed by a
    /// unique index in SQL); this constructor only builds the record.
    pub fn submit(
        requester: &Actor,
        registry: RegistryKind,
        capability: Capability,
        group_id: Option<GroupId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RequestId::new(),
            requester: requester.user_id,
            scope: requester.scope.clone(),
            registry,
            capability,
            group_id,
            status: RequestStatus::Pending,
            verification: VerificationStatus::Unverified,
            rejection_reason: None,
            expires_at: None,
            decided_by: None,
            decided_at: None,
            deleted_at: None,
            created_at: now,
        }
    }

    /// The duplicate-detection key for this request.
    pub fn duplicate_key(&self) -> DuplicateKey {
        DuplicateKey {
            requester: self.requester,
            registry: self.registry,
            capability: self.capability,
            scope: self.scope.clone(),
            group_id: self.group_id,
        }
    }

    /// Whether this request has been soft-deleted.
    pub fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Soft-delete the request.
    pub fn tombstone(&mut self, now: DateTime<Utc>) {
        self.deleted_at = Some(now);
    }

    /// Approve the request.
    ///
    /// Requires a pending, non-tombstoned request and a reviewer whose
    /// scope covers the requester's. View-only requests resolve to
    /// `Verified`; add/edit requests are approved for access but flagged
    /// `PendingContent`.
    pub fn approve(&mut self, reviewer: &Actor, now: DateTime<Utc>) -> Result<(), RequestError> {
        self.require_pending()?;
        self.require_reviewer(reviewer)?;

        self.status = RequestStatus::Approved;
        self.verification = match self.capability {
            Capability::View => VerificationStatus::Verified,
            Capability::Add | Capability::Edit => VerificationStatus::PendingContent,
        };
        self.expires_at = Some(now + Duration::days(GRANT_TTL_DAYS));
        self.decided_by = Some(reviewer.user_id);
        self.decided_at = Some(now);
        Ok(())
    }

    /// Reject the request with a mandatory reason.
    pub fn reject(
        &mut self,
        reviewer: &Actor,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RequestError> {
        if reason.trim().is_empty() {
            return Err(RequestError::EmptyReason);
        }
        self.require_pending()?;
        self.require_reviewer(reviewer)?;

        self.status = RequestStatus::Rejected;
        self.rejection_reason = Some(reason.trim().to_string());
        self.decided_by = Some(reviewer.user_id);
        self.decided_at = Some(now);
        Ok(())
    }

    fn require_pending(&self) -> Result<(), RequestError> {
        if self.is_tombstoned() {
            return Err(RequestError::Tombstoned);
        }
        if self.status.is_terminal() {
            return Err(RequestError::AlreadyDecided {
                status: self.status,
            });
        }
        Ok(())
    }

    fn require_reviewer(&self, reviewer: &Actor) -> Result<(), RequestError> {
        if !reviewer.can_review(&self.scope) {
            return Err(RequestError::ScopeMismatch {
                reviewer_local: reviewer.scope.local.clone(),
                requester_local: self.scope.local.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registra_core::Role;

    fn member(scope: TenantScope) -> Actor {
        Actor::new(UserId::new(), Role::Member, scope)
    }

    fn reviewer(scope: TenantScope) -> Actor {
        Actor::new(UserId::new(), Role::LocalReviewer, scope)
    }

    fn pending_view_request() -> AccessRequest {
        let requester = member(TenantScope::new("D1", "L1"));
        AccessRequest::submit(
            &requester,
            RegistryKind::Confirmed,
            Capability::View,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn submit_starts_pending_unverified() {
        let r = pending_view_request();
        assert_eq!(r.status, RequestStatus::Pending);
        assert_eq!(r.verification, VerificationStatus::Unverified);
        assert!(r.expires_at.is_none());
        assert!(!r.is_tombstoned());
    }

    #[test]
    fn same_scope_reviewer_approves_view_to_verified() {
        let mut r = pending_view_request();
        let rev = reviewer(TenantScope::new("D1", "L1"));
        let now = Utc::now();
        r.approve(&rev, now).unwrap();

        assert_eq!(r.status, RequestStatus::Approved);
        assert_eq!(r.verification, VerificationStatus::Verified);
        assert_eq!(r.expires_at, Some(now + Duration::days(7)));
        assert_eq!(r.decided_by, Some(rev.user_id));
    }

    #[test]
    fn edit_approval_is_pending_content() {
        let requester = member(TenantScope::new("D1", "L1"));
        let mut r = AccessRequest::submit(
            &requester,
            RegistryKind::Candidate,
            Capability::Edit,
            None,
            Utc::now(),
        );
        r.approve(&reviewer(TenantScope::new("D1", "L1")), Utc::now())
            .unwrap();
        assert_eq!(r.verification, VerificationStatus::PendingContent);
    }

    #[test]
    fn add_approval_is_pending_content() {
        let requester = member(TenantScope::new("D1", "L1"));
        let mut r = AccessRequest::submit(
            &requester,
            RegistryKind::Precredential,
            Capability::Add,
            None,
            Utc::now(),
        );
        r.approve(&reviewer(TenantScope::new("D1", "L1")), Utc::now())
            .unwrap();
        assert_eq!(r.verification, VerificationStatus::PendingContent);
    }

    #[test]
    fn cross_scope_reviewer_is_rejected() {
        let mut r = pending_view_request();
        let rev = reviewer(TenantScope::new("D1", "L2"));
        let err = r.approve(&rev, Utc::now()).unwrap_err();
        assert!(matches!(err, RequestError::ScopeMismatch { .. }));
        assert_eq!(r.status, RequestStatus::Pending);
    }

    #[test]
    fn admin_reviews_across_scopes() {
        let mut r = pending_view_request();
        let admin = Actor::new(UserId::new(), Role::Admin, TenantScope::new("D9", "L9"));
        r.approve(&admin, Utc::now()).unwrap();
        assert_eq!(r.status, RequestStatus::Approved);
    }

    #[test]
    fn member_cannot_review() {
        let mut r = pending_view_request();
        let m = member(TenantScope::new("D1", "L1"));
        assert!(r.approve(&m, Utc::now()).is_err());
    }

    #[test]
    fn status_transitions_exactly_once() {
        let mut r = pending_view_request();
        let rev = reviewer(TenantScope::new("D1", "L1"));
        r.approve(&rev, Utc::now()).unwrap();

        let err = r.approve(&rev, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            RequestError::AlreadyDecided {
                status: RequestStatus::Approved
            }
        );
        let err = r.reject(&rev, "late", Utc::now()).unwrap_err();
        assert!(matches!(err, RequestError::AlreadyDecided { .. }));
    }

    #[test]
    fn reject_requires_reason() {
        let mut r = pending_view_request();
        let rev = reviewer(TenantScope::new("D1", "L1"));
        assert_eq!(
            r.reject(&rev, "   ", Utc::now()).unwrap_err(),
            RequestError::EmptyReason
        );
        assert_eq!(r.status, RequestStatus::Pending);

        r.reject(&rev, "insufficient justification", Utc::now())
            .unwrap();
        assert_eq!(r.status, RequestStatus::Rejected);
        assert_eq!(
            r.rejection_reason.as_deref(),
            Some("insufficient justification")
        );
    }

    #[test]
    fn tombstoned_request_is_inert() {
        let mut r = pending_view_request();
        r.tombstone(Utc::now());
        let rev = reviewer(TenantScope::new("D1", "L1"));
        assert_eq!(r.approve(&rev, Utc::now()).unwrap_err(), RequestError::Tombstoned);
    }

    #[test]
    fn duplicate_key_covers_group_subscope() {
        let requester = member(TenantScope::new("D1", "L1"));
        let g = GroupId::new();
        let now = Utc::now();
        let a = AccessRequest::submit(&requester, RegistryKind::Confirmed, Capability::View, Some(g), now);
        let b = AccessRequest::submit(&requester, RegistryKind::Confirmed, Capability::View, Some(g), now);
        let c = AccessRequest::submit(&requester, RegistryKind::Confirmed, Capability::View, None, now);
        assert_eq!(a.duplicate_key(), b.duplicate_key());
        assert_ne!(a.duplicate_key(), c.duplicate_key());
    }

    #[test]
    fn capability_flags_are_monotonic() {
        assert_eq!(Capability::View.flags(), (true, false, false));
        assert_eq!(Capability::Add.flags(), (true, true, false));
        assert_eq!(Capability::Edit.flags(), (true, true, true));
    }

    #[test]
    fn enum_parse_roundtrip() {
        for c in [Capability::View, Capability::Add, Capability::Edit] {
            assert_eq!(Capability::parse(c.as_str()), Some(c));
        }
        for k in [
            RegistryKind::Precredential,
            RegistryKind::Candidate,
            RegistryKind::Confirmed,
        ] {
            assert_eq!(RegistryKind::parse(k.as_str()), Some(k));
        }
        assert_eq!(Capability::parse("owner"), None);
        assert_eq!(RegistryKind::parse("members"), None);
    }
}
