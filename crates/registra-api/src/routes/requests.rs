//! # Access Request API
//!
//! Submit, approve, reject, and list registry access requests. Approval
//! upserts the derived grant (refresh in place, never a second row) and,
//! for view access to the confirmed registry, issues a confidential
//! document grant over the rendered artifact.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use registra_core::{AuditEvent, GroupId, RequestId};
use registra_workflow::{
    AccessGrant, AccessRequest, Capability, DocumentGrant, RegistryKind, RequestError,
    RequestStatus,
};

use crate::auth::CurrentActor;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Request to submit a registry access request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitRequestBody {
    /// Registry to access: `precredential`, `candidate`, or `confirmed`.
    pub registry: String,
    /// Requested capability: `view`, `add`, or `edit`.
    pub capability: String,
    /// Optional sub-scope narrowing the request to one group.
    pub group_id: Option<Uuid>,
}

impl Validate for SubmitRequestBody {
    fn validate(&self) -> Result<(), String> {
        if RegistryKind::parse(&self.registry).is_none() {
            return Err(format!(
                "unknown registry '{}'. Valid registries: precredential, candidate, confirmed",
                self.registry
            ));
        }
        if Capability::parse(&self.capability).is_none() {
            return Err(format!(
                "unknown capability '{}'. Valid capabilities: view, add, edit",
                self.capability
            ));
        }
        Ok(())
    }
}

/// Request to reject an access request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectRequestBody {
    /// Mandatory rejection reason.
    pub reason: String,
}

impl Validate for RejectRequestBody {
    fn validate(&self) -> Result<(), String> {
        if self.reason.trim().is_empty() {
            return Err("rejection reason must be non-empty".to_string());
        }
        Ok(())
    }
}

/// API view of an access request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequestView {
    pub id: Uuid,
    pub requester: Uuid,
    /// `district/local` scope string.
    pub scope: String,
    pub registry: String,
    pub capability: String,
    pub group_id: Option<Uuid>,
    pub status: String,
    pub verification: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&AccessRequest> for RequestView {
    fn from(r: &AccessRequest) -> Self {
        Self {
            id: r.id.as_uuid(),
            requester: r.requester.as_uuid(),
            scope: r.scope.to_string(),
            registry: r.registry.as_str().to_string(),
            capability: r.capability.as_str().to_string(),
            group_id: r.group_id.map(|g| g.as_uuid()),
            status: r.status.as_str().to_string(),
            verification: r.verification.as_str().to_string(),
            rejection_reason: r.rejection_reason.clone(),
            expires_at: r.expires_at,
            created_at: r.created_at,
        }
    }
}

/// Response wrapping a single request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RequestResponse {
    pub success: bool,
    pub request: RequestView,
}

/// Response for an approval: the decided request, the upserted grant, and
/// the confidential document grant when one was issued.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApprovalResponse {
    pub success: bool,
    pub request: RequestView,
    pub grant: crate::routes::grants::GrantView,
    /// Set when the approval opened a confidential-document viewing
    /// session (view access to the confirmed registry).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<Uuid>,
}

/// Response for the pending-requests listing.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PendingResponse {
    pub success: bool,
    pub requests: Vec<RequestView>,
}

/// Build the requests router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/requests", post(submit_request))
        .route("/v1/requests/pending", get(list_pending))
        .route("/v1/requests/:id/approve", post(approve_request))
        .route("/v1/requests/:id/reject", post(reject_request))
}

/// POST /v1/requests — Submit an access request.
#[utoipa::path(
    post,
    path = "/v1/requests",
    request_body = SubmitRequestBody,
    responses(
        (status = 201, description = "Request submitted", body = RequestResponse),
        (status = 400, description = "Validation failure or duplicate pending request", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub async fn submit_request(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    body: Result<Json<SubmitRequestBody>, JsonRejection>,
) -> Result<(StatusCode, Json<RequestResponse>), AppError> {
    let body = extract_validated_json(body)?;
    // Validate guarantees both parses succeed.
    let registry = RegistryKind::parse(&body.registry)
        .ok_or_else(|| AppError::Validation(format!("unknown registry '{}'", body.registry)))?;
    let capability = Capability::parse(&body.capability)
        .ok_or_else(|| AppError::Validation(format!("unknown capability '{}'", body.capability)))?;

    let now = Utc::now();
    let request = AccessRequest::submit(
        &actor,
        registry,
        capability,
        body.group_id.map(GroupId::from),
        now,
    );
    let key = request.duplicate_key();

    let inserted = state.requests.insert_unless(request.id, request.clone(), |existing| {
        existing.status == RequestStatus::Pending
            && !existing.is_tombstoned()
            && existing.duplicate_key() == key
    });
    if !inserted {
        return Err(RequestError::DuplicatePending.into());
    }

    // Write-through. The partial unique index backs the in-memory check;
    // a violation means another instance won the race.
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::requests::insert(pool, &request).await {
            state.requests.remove(&request.id);
            if crate::db::is_unique_violation(&e) {
                // Another instance won the race; the partial unique index is
                // the arbiter.
                return Err(RequestError::DuplicatePending.into());
            }
            tracing::error!(request_id = %request.id, error = %e, "failed to persist access request");
            return Err(AppError::Internal(
                "request recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    state
        .audit
        .record(
            AuditEvent::new(
                "access_request.submitted",
                actor.user_id,
                format!("access_request/{}", request.id),
            )
            .with_metadata(serde_json::json!({
                "registry": registry.as_str(),
                "capability": capability.as_str(),
            })),
            state.db_pool.as_ref(),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(RequestResponse {
            success: true,
            request: RequestView::from(&request),
        }),
    ))
}

/// GET /v1/requests/pending — Pending requests the caller may review.
///
/// Admins see every pending request; scoped reviewers see their home
/// scope's. Other roles are denied.
#[utoipa::path(
    get,
    path = "/v1/requests/pending",
    responses(
        (status = 200, description = "Pending requests in the caller's review scope", body = PendingResponse),
        (status = 403, description = "Caller cannot review requests", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub async fn list_pending(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<PendingResponse>, AppError> {
    if !actor.is_admin() && !actor.can_review(&actor.scope) {
        return Err(AppError::Forbidden(format!(
            "role {} cannot review requests",
            actor.role
        )));
    }

    let mut pending: Vec<AccessRequest> = state
        .requests
        .list()
        .into_iter()
        .filter(|r| {
            r.status == RequestStatus::Pending && !r.is_tombstoned() && actor.can_review(&r.scope)
        })
        .collect();
    pending.sort_by_key(|r| r.created_at);

    Ok(Json(PendingResponse {
        success: true,
        requests: pending.iter().map(RequestView::from).collect(),
    }))
}

/// POST /v1/requests/:id/approve — Approve a pending request.
///
/// Upserts the derived grant: an existing grant for the same (holder,
/// registry, scope, group) is refreshed in place, never duplicated.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/approve",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request approved, grant upserted", body = ApprovalResponse),
        (status = 400, description = "Request already decided", body = crate::error::ErrorBody),
        (status = 403, description = "Reviewer scope does not cover the request", body = crate::error::ErrorBody),
        (status = 404, description = "No such request", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub async fn approve_request(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<ApprovalResponse>, AppError> {
    let id = RequestId::from_uuid(id);
    let now = Utc::now();

    let request = state
        .requests
        .try_update(&id, |r| {
            r.approve(&actor, now)?;
            Ok::<_, AppError>(r.clone())
        })
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))??;

    // Grant upsert: refresh the existing row for this (holder, registry,
    // scope, group) or issue a fresh one.
    let existing = state.grants.find(|g| {
        g.user_id == request.requester
            && g.registry == request.registry
            && g.scope == request.scope
            && g.group_id == request.group_id
    });
    let grant = match existing {
        Some(g) => state
            .grants
            .try_update(&g.id, |g| {
                g.refresh(&request, now);
                Ok::<_, AppError>(g.clone())
            })
            .ok_or_else(|| AppError::Internal("grant vanished during refresh".to_string()))??,
        None => {
            let g = AccessGrant::issue(&request, now);
            state.grants.insert(g.id, g.clone());
            g
        }
    };

    // View access to the confirmed registry opens a confidential-document
    // viewing session over the rendered artifact.
    let document = if request.registry == RegistryKind::Confirmed
        && request.capability == Capability::View
    {
        let doc = DocumentGrant::issue(request.id, request.requester, request.scope.clone(), now);
        let artifact = render_artifact(&request);
        state.blobs.insert(doc.id, artifact.clone());
        state.documents.insert(doc.id, doc.clone());
        Some((doc, artifact))
    } else {
        None
    };

    if let Some(pool) = &state.db_pool {
        let doc_ref = document.as_ref().map(|(d, a)| (d, a.as_str()));
        if let Err(e) =
            crate::db::requests::persist_approval(pool, &request, &grant, doc_ref).await
        {
            tracing::error!(request_id = %request.id, error = %e, "failed to persist approval");
            return Err(AppError::Internal(
                "approval applied in-memory but database persist failed".to_string(),
            ));
        }
    }

    state
        .audit
        .record(
            AuditEvent::new(
                "access_request.approved",
                actor.user_id,
                format!("access_request/{}", request.id),
            )
            .with_metadata(serde_json::json!({
                "grant_id": grant.id.to_string(),
                "expires_at": grant.expires_at,
            })),
            state.db_pool.as_ref(),
        )
        .await;

    Ok(Json(ApprovalResponse {
        success: true,
        request: RequestView::from(&request),
        grant: crate::routes::grants::GrantView::from(&grant),
        document_id: document.map(|(d, _)| d.id.as_uuid()),
    }))
}

/// POST /v1/requests/:id/reject — Reject a pending request with a reason.
#[utoipa::path(
    post,
    path = "/v1/requests/{id}/reject",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = RejectRequestBody,
    responses(
        (status = 200, description = "Request rejected", body = RequestResponse),
        (status = 400, description = "Empty reason or already decided", body = crate::error::ErrorBody),
        (status = 403, description = "Reviewer scope does not cover the request", body = crate::error::ErrorBody),
        (status = 404, description = "No such request", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
pub async fn reject_request(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Result<Json<RejectRequestBody>, JsonRejection>,
) -> Result<Json<RequestResponse>, AppError> {
    let body = extract_validated_json(body)?;
    let id = RequestId::from_uuid(id);
    let now = Utc::now();

    let request = state
        .requests
        .try_update(&id, |r| {
            r.reject(&actor, &body.reason, now)?;
            Ok::<_, AppError>(r.clone())
        })
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))??;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::requests::update_decision(pool, &request).await {
            tracing::error!(request_id = %request.id, error = %e, "failed to persist rejection");
            return Err(AppError::Internal(
                "rejection applied in-memory but database persist failed".to_string(),
            ));
        }
    }

    state
        .audit
        .record(
            AuditEvent::new(
                "access_request.rejected",
                actor.user_id,
                format!("access_request/{}", request.id),
            ),
            state.db_pool.as_ref(),
        )
        .await;

    Ok(Json(RequestResponse {
        success: true,
        request: RequestView::from(&request),
    }))
}

/// Render the confidential artifact for an approved viewing session.
///
/// Export formatting is an external collaborator; the blob store only sees
/// opaque content, so a marker document stands in for the real renderer.
fn render_artifact(request: &AccessRequest) -> String {
    format!(
        "confidential {} registry extract for {} (request {})",
        request.registry, request.scope, request.id
    )
}
