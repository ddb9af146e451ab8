//! # Grant API
//!
//! Read access to derived grants plus early revocation.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use registra_core::AuditEvent;
use registra_workflow::{AccessGrant, Capability, RegistryKind};

use crate::auth::CurrentActor;
use crate::error::AppError;
use crate::state::AppState;

/// API view of an access grant.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GrantView {
    pub id: Uuid,
    pub request_id: Uuid,
    pub user_id: Uuid,
    /// `district/local` scope string.
    pub scope: String,
    pub registry: String,
    pub group_id: Option<Uuid>,
    pub can_view: bool,
    pub can_add: bool,
    pub can_edit: bool,
    pub is_active: bool,
    pub granted_by: Option<Uuid>,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl From<&AccessGrant> for GrantView {
    fn from(g: &AccessGrant) -> Self {
        Self {
            id: g.id.as_uuid(),
            request_id: g.request_id.as_uuid(),
            user_id: g.user_id.as_uuid(),
            scope: g.scope.to_string(),
            registry: g.registry.as_str().to_string(),
            group_id: g.group_id.map(|x| x.as_uuid()),
            can_view: g.can_view,
            can_add: g.can_add,
            can_edit: g.can_edit,
            is_active: g.is_active,
            granted_by: g.granted_by.map(|x| x.as_uuid()),
            granted_at: g.granted_at,
            expires_at: g.expires_at,
        }
    }
}

/// Response wrapping a single grant.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GrantResponse {
    pub success: bool,
    pub grant: GrantView,
    /// Whether the grant is usable right now (active and inside its
    /// seven-day window).
    pub live: bool,
}

/// Response for the grants listing.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GrantListResponse {
    pub success: bool,
    pub grants: Vec<GrantView>,
}

/// Query for an authorization check.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuthorizedQuery {
    /// Registry to check: `precredential`, `candidate`, or `confirmed`.
    pub registry: String,
    /// Capability to check: `view`, `add`, or `edit`.
    pub capability: String,
}

/// Response for an authorization check.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizedResponse {
    pub success: bool,
    /// Whether the caller may perform the capability right now.
    pub authorized: bool,
    /// What authorized the access: `role` or `grant`. Absent when denied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
}

/// Build the grants router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/grants", get(list_grants))
        .route("/v1/grants/authorized", get(check_authorized))
        .route("/v1/grants/:id", get(get_grant))
        .route("/v1/grants/:id/revoke", post(revoke_grant))
}

/// GET /v1/grants — Grants visible to the caller.
///
/// Holders see their own grants; reviewers see their scope's; admins see
/// everything.
#[utoipa::path(
    get,
    path = "/v1/grants",
    responses((status = 200, description = "Visible grants", body = GrantListResponse)),
    tag = "grants"
)]
pub async fn list_grants(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<GrantListResponse>, AppError> {
    let mut grants: Vec<AccessGrant> = state
        .grants
        .list()
        .into_iter()
        .filter(|g| g.user_id == actor.user_id || actor.can_review(&g.scope))
        .collect();
    grants.sort_by_key(|g| g.granted_at);

    Ok(Json(GrantListResponse {
        success: true,
        grants: grants.iter().map(GrantView::from).collect(),
    }))
}

/// GET /v1/grants/authorized — Check the caller's effective access.
///
/// Combines the role bypass (admin anywhere; scoped reviewers and clerks in
/// their home local) with the live-grant check. The check runs against the
/// caller's home scope — the only scope a grant can have been issued for.
#[utoipa::path(
    get,
    path = "/v1/grants/authorized",
    params(AuthorizedQuery),
    responses(
        (status = 200, description = "Authorization verdict", body = AuthorizedResponse),
        (status = 400, description = "Unknown registry or capability", body = crate::error::ErrorBody),
    ),
    tag = "grants"
)]
pub async fn check_authorized(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Query(query): Query<AuthorizedQuery>,
) -> Result<Json<AuthorizedResponse>, AppError> {
    let registry = RegistryKind::parse(&query.registry)
        .ok_or_else(|| AppError::Validation(format!("unknown registry '{}'", query.registry)))?;
    let capability = Capability::parse(&query.capability).ok_or_else(|| {
        AppError::Validation(format!("unknown capability '{}'", query.capability))
    })?;

    let via = if actor.has_scope_bypass(&actor.scope) {
        Some("role")
    } else {
        let now = Utc::now();
        state
            .grants
            .find(|g| {
                g.user_id == actor.user_id && g.satisfies(registry, &actor.scope, capability, now)
            })
            .map(|_| "grant")
    };

    Ok(Json(AuthorizedResponse {
        success: true,
        authorized: via.is_some(),
        via: via.map(str::to_string),
    }))
}

/// GET /v1/grants/:id — Fetch one grant.
#[utoipa::path(
    get,
    path = "/v1/grants/{id}",
    params(("id" = Uuid, Path, description = "Grant ID")),
    responses(
        (status = 200, description = "The grant", body = GrantResponse),
        (status = 404, description = "No such grant", body = crate::error::ErrorBody),
    ),
    tag = "grants"
)]
pub async fn get_grant(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<GrantResponse>, AppError> {
    let id = registra_core::GrantId::from_uuid(id);
    let grant = state
        .grants
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("grant {id} not found")))?;

    if grant.user_id != actor.user_id && !actor.can_review(&grant.scope) {
        // Hide existence from actors outside holder/reviewer visibility.
        return Err(AppError::NotFound(format!("grant {id} not found")));
    }

    let live = grant.is_live(Utc::now());
    Ok(Json(GrantResponse {
        success: true,
        grant: GrantView::from(&grant),
        live,
    }))
}

/// POST /v1/grants/:id/revoke — Revoke a grant ahead of its expiry.
///
/// Reviewer-or-admin only; the row stays for audit, flagged inactive.
#[utoipa::path(
    post,
    path = "/v1/grants/{id}/revoke",
    params(("id" = Uuid, Path, description = "Grant ID")),
    responses(
        (status = 200, description = "Grant revoked", body = GrantResponse),
        (status = 403, description = "Caller cannot revoke this grant", body = crate::error::ErrorBody),
        (status = 404, description = "No such grant", body = crate::error::ErrorBody),
    ),
    tag = "grants"
)]
pub async fn revoke_grant(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<GrantResponse>, AppError> {
    let id = registra_core::GrantId::from_uuid(id);
    let existing = state
        .grants
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("grant {id} not found")))?;
    if !actor.can_review(&existing.scope) {
        return Err(AppError::Forbidden(format!(
            "role {} cannot revoke grants in scope {}",
            actor.role, existing.scope
        )));
    }

    let grant = state
        .grants
        .try_update(&id, |g| {
            g.revoke();
            Ok::<_, AppError>(g.clone())
        })
        .ok_or_else(|| AppError::NotFound(format!("grant {id} not found")))??;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::requests::update_grant(pool, &grant).await {
            tracing::error!(grant_id = %grant.id, error = %e, "failed to persist grant revocation");
            return Err(AppError::Internal(
                "revocation applied in-memory but database persist failed".to_string(),
            ));
        }
    }

    state
        .audit
        .record(
            AuditEvent::new(
                "grant.revoked",
                actor.user_id,
                format!("grant/{}", grant.id),
            ),
            state.db_pool.as_ref(),
        )
        .await;

    Ok(Json(GrantResponse {
        success: true,
        live: false,
        grant: GrantView::from(&grant),
    }))
}
