//! # Officer Credentialing API
//!
//! The multi-stage onboarding pipeline, the per-request transition history,
//! the officer listing (with tenant-field decryption), and the admin-only
//! identity merge.
//!
//! All pipeline actions go through one endpoint with a closed action enum;
//! an unknown action is a deserialization failure, not a dynamic dispatch
//! miss.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use registra_core::{Actor, AuditEvent, OfficerId, OfficerRequestId};
use registra_workflow::{
    DepartmentAssignment, OathDisposition, Officer, OfficerRequest, RecordCode, SeminarSession,
    TransitionRecord,
};

use crate::auth::CurrentActor;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Request to submit an officer-credentialing request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitOfficerRequestBody {
    /// Applicant display name; stored encrypted for the request's district.
    pub applicant_name: String,
    /// Requested department role.
    pub role: String,
    /// Requested duty within the role.
    pub duty: String,
    /// Attendance-day threshold shown to reviewers.
    pub required_seminar_days: u32,
}

impl Validate for SubmitOfficerRequestBody {
    fn validate(&self) -> Result<(), String> {
        if self.applicant_name.trim().is_empty() {
            return Err("applicant name must be non-empty".to_string());
        }
        if self.role.trim().is_empty() || self.duty.trim().is_empty() {
            return Err("role and duty must be non-empty".to_string());
        }
        Ok(())
    }
}

/// A pipeline action. The set is closed: anything else fails to parse.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OfficerAction {
    /// `pending → requested_to_seminar`.
    ApproveSeminar,
    /// `requested_to_seminar → in_seminar`.
    MarkInSeminar,
    /// `in_seminar → seminar_completed`.
    CompleteSeminar,
    /// `seminar_completed → requested_to_oath`.
    ApproveOath,
    /// `requested_to_oath → ready_to_oath`.
    MarkReadyOath,
    /// Record the new-vs-duplicate decision.
    SetCode {
        /// `"A"` (new identity) or `"D"` (duplicate).
        code: String,
        /// The identity to merge into; required iff the code is `"D"`.
        existing_officer: Option<Uuid>,
    },
    /// Append a seminar session to the attendance sequence.
    AddSeminarDate { date: NaiveDate, location: String },
    /// Mark attendance for the session at `index`.
    MarkAttendance { index: usize, attended: bool },
    /// `ready_to_oath → oath_taken`; materializes or merges the identity.
    CompleteOath,
    /// Reject with a mandatory reason. Any non-terminal stage.
    Reject { reason: String },
    /// Withdraw. Any non-terminal stage.
    Cancel,
}

/// API view of one seminar session.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SeminarSessionView {
    pub date: NaiveDate,
    pub location: String,
    pub attended: bool,
    pub marked_by: Option<Uuid>,
}

impl From<&SeminarSession> for SeminarSessionView {
    fn from(s: &SeminarSession) -> Self {
        Self {
            date: s.date,
            location: s.location.clone(),
            attended: s.attended,
            marked_by: s.marked_by.map(|u| u.as_uuid()),
        }
    }
}

/// API view of an officer-credentialing request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OfficerRequestView {
    pub id: Uuid,
    pub requester: Uuid,
    /// `district/local` scope string.
    pub scope: String,
    pub role: String,
    pub duty: String,
    pub status: String,
    pub record_code: Option<String>,
    pub existing_officer: Option<Uuid>,
    pub seminar_sessions: Vec<SeminarSessionView>,
    pub attended_days: usize,
    pub required_seminar_days: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub officer_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&OfficerRequest> for OfficerRequestView {
    fn from(r: &OfficerRequest) -> Self {
        Self {
            id: r.id.as_uuid(),
            requester: r.requester.as_uuid(),
            scope: r.scope.to_string(),
            role: r.requested_role.clone(),
            duty: r.requested_duty.clone(),
            status: r.status.as_str().to_string(),
            record_code: r.record_code.map(|c| c.as_str().to_string()),
            existing_officer: r.existing_officer.map(|o| o.as_uuid()),
            seminar_sessions: r.seminar_sessions.iter().map(SeminarSessionView::from).collect(),
            attended_days: r.attended_days(),
            required_seminar_days: r.required_seminar_days,
            officer_id: r.officer_id.map(|o| o.as_uuid()),
            rejection_reason: r.rejection_reason.clone(),
            created_at: r.created_at,
        }
    }
}

/// One transition-log entry.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransitionView {
    pub from: String,
    pub to: String,
    pub actor: Uuid,
    pub at: DateTime<Utc>,
}

impl From<&TransitionRecord> for TransitionView {
    fn from(t: &TransitionRecord) -> Self {
        Self {
            from: t.from.as_str().to_string(),
            to: t.to.as_str().to_string(),
            actor: t.actor.as_uuid(),
            at: t.at,
        }
    }
}

/// One department assignment.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignmentView {
    pub role: String,
    pub duty: String,
    pub oath_date: NaiveDate,
}

impl From<&DepartmentAssignment> for AssignmentView {
    fn from(a: &DepartmentAssignment) -> Self {
        Self {
            role: a.role.clone(),
            duty: a.duty.clone(),
            oath_date: a.oath_date,
        }
    }
}

/// API view of an officer identity. The name is decrypted for the response;
/// the store only ever holds ciphertext.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OfficerView {
    pub officer_uuid: Uuid,
    /// `district/local` scope string.
    pub scope: String,
    pub is_active: bool,
    pub name: String,
    pub assignments: Vec<AssignmentView>,
    pub created_at: DateTime<Utc>,
}

/// Response wrapping a single officer request.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OfficerRequestResponse {
    pub success: bool,
    pub request: OfficerRequestView,
}

/// Response for the transition history.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryResponse {
    pub success: bool,
    pub transitions: Vec<TransitionView>,
}

/// Response for the officer listing.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OfficerListResponse {
    pub success: bool,
    pub officers: Vec<OfficerView>,
    /// Officers skipped because their district's key material was
    /// unavailable or their ciphertext failed to decrypt. Partial results
    /// are served rather than failing the listing.
    pub undecryptable: usize,
    /// Current headcount for the caller's scope (admins: sum of all).
    pub headcount: i64,
}

/// Request to merge a duplicate identity into this one.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MergeBody {
    /// The duplicate identity to absorb and delete.
    pub duplicate_id: Uuid,
}

impl Validate for MergeBody {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Response for a completed merge.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MergeResponse {
    pub success: bool,
    pub officer: OfficerView,
    /// How many officer requests were re-pointed at the surviving identity.
    pub repointed_requests: usize,
}

/// Build the officers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/officers/requests", post(submit_officer_request))
        .route("/v1/officers/requests", get(list_officer_requests))
        .route("/v1/officers/requests/:id", get(get_officer_request))
        .route("/v1/officers/requests/:id/actions", post(apply_action))
        .route("/v1/officers/requests/:id/history", get(get_history))
        .route("/v1/officers", get(list_officers))
        .route("/v1/officers/:id/merge", post(merge_officer))
}

/// POST /v1/officers/requests — Submit a credentialing request.
///
/// The applicant name is encrypted for the requester's district before it
/// ever reaches a store.
#[utoipa::path(
    post,
    path = "/v1/officers/requests",
    request_body = SubmitOfficerRequestBody,
    responses(
        (status = 201, description = "Request submitted", body = OfficerRequestResponse),
        (status = 400, description = "Validation failure", body = crate::error::ErrorBody),
    ),
    tag = "officers"
)]
pub async fn submit_officer_request(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    body: Result<Json<SubmitOfficerRequestBody>, JsonRejection>,
) -> Result<(StatusCode, Json<OfficerRequestResponse>), AppError> {
    let body = extract_validated_json(body)?;

    let district = actor.scope.district.as_str().to_string();
    state.ensure_district(&district);
    let secret = state.keyring.secret_for(&district)?;
    if let Some(pool) = &state.db_pool {
        // A secret that exists only in memory would strand this request's
        // ciphertext after a restart.
        if let Err(e) = crate::db::secrets::ensure(pool, &district, &secret).await {
            tracing::error!(district, error = %e, "failed to persist tenant secret");
            return Err(AppError::Internal(
                "district key provisioning failed".to_string(),
            ));
        }
    }
    let name_enc = state
        .cipher
        .encrypt(body.applicant_name.trim(), &district, &secret)?;

    let request = OfficerRequest::submit(
        actor.user_id,
        actor.scope.clone(),
        body.role.trim(),
        body.duty.trim(),
        name_enc,
        body.required_seminar_days,
        Utc::now(),
    );
    state.officer_requests.insert(request.id, request.clone());

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::officers::insert_request(pool, &request).await {
            state.officer_requests.remove(&request.id);
            tracing::error!(request_id = %request.id, error = %e, "failed to persist officer request");
            return Err(AppError::Internal(
                "request recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    state
        .audit
        .record(
            AuditEvent::new(
                "officer_request.submitted",
                actor.user_id,
                format!("officer_request/{}", request.id),
            ),
            state.db_pool.as_ref(),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(OfficerRequestResponse {
            success: true,
            request: OfficerRequestView::from(&request),
        }),
    ))
}

/// Response for the officer-request listing.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OfficerRequestListResponse {
    pub success: bool,
    pub requests: Vec<OfficerRequestView>,
}

/// GET /v1/officers/requests — Requests visible to the caller.
#[utoipa::path(
    get,
    path = "/v1/officers/requests",
    responses((status = 200, description = "Visible requests", body = OfficerRequestListResponse)),
    tag = "officers"
)]
pub async fn list_officer_requests(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<OfficerRequestListResponse>, AppError> {
    let mut requests: Vec<OfficerRequest> = state
        .officer_requests
        .list()
        .into_iter()
        .filter(|r| r.requester == actor.user_id || actor.can_review(&r.scope))
        .collect();
    requests.sort_by_key(|r| r.created_at);

    Ok(Json(OfficerRequestListResponse {
        success: true,
        requests: requests.iter().map(OfficerRequestView::from).collect(),
    }))
}

fn visible_to(actor: &Actor, request: &OfficerRequest) -> bool {
    request.requester == actor.user_id || actor.can_review(&request.scope)
}

/// GET /v1/officers/requests/:id — Fetch one request.
#[utoipa::path(
    get,
    path = "/v1/officers/requests/{id}",
    params(("id" = Uuid, Path, description = "Officer request ID")),
    responses(
        (status = 200, description = "The request", body = OfficerRequestResponse),
        (status = 404, description = "No such request", body = crate::error::ErrorBody),
    ),
    tag = "officers"
)]
pub async fn get_officer_request(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<OfficerRequestResponse>, AppError> {
    let id = OfficerRequestId::from_uuid(id);
    let request = state
        .officer_requests
        .get(&id)
        .filter(|r| visible_to(&actor, r))
        .ok_or_else(|| AppError::NotFound(format!("officer request {id} not found")))?;

    Ok(Json(OfficerRequestResponse {
        success: true,
        request: OfficerRequestView::from(&request),
    }))
}

/// GET /v1/officers/requests/:id/history — The ordered transition log.
#[utoipa::path(
    get,
    path = "/v1/officers/requests/{id}/history",
    params(("id" = Uuid, Path, description = "Officer request ID")),
    responses(
        (status = 200, description = "Transition log in order", body = HistoryResponse),
        (status = 404, description = "No such request", body = crate::error::ErrorBody),
    ),
    tag = "officers"
)]
pub async fn get_history(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, AppError> {
    let id = OfficerRequestId::from_uuid(id);
    let request = state
        .officer_requests
        .get(&id)
        .filter(|r| visible_to(&actor, r))
        .ok_or_else(|| AppError::NotFound(format!("officer request {id} not found")))?;

    Ok(Json(HistoryResponse {
        success: true,
        transitions: request.transitions.iter().map(TransitionView::from).collect(),
    }))
}

/// POST /v1/officers/requests/:id/actions — Apply one pipeline action.
///
/// Reviewer actions require review scope over the request; `cancel` is also
/// open to the requester. Oath completion validates everything — stage,
/// record code, and for CODE D the merge target's existence — before any
/// store is touched, so a failed completion leaves no partial state.
#[utoipa::path(
    post,
    path = "/v1/officers/requests/{id}/actions",
    params(("id" = Uuid, Path, description = "Officer request ID")),
    request_body = OfficerAction,
    responses(
        (status = 200, description = "Action applied", body = OfficerRequestResponse),
        (status = 400, description = "Invalid transition or unmet precondition", body = crate::error::ErrorBody),
        (status = 403, description = "Caller may not act on this request", body = crate::error::ErrorBody),
        (status = 404, description = "No such request", body = crate::error::ErrorBody),
    ),
    tag = "officers"
)]
pub async fn apply_action(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Result<Json<OfficerAction>, JsonRejection>,
) -> Result<Json<OfficerRequestResponse>, AppError> {
    let Json(action) = body.map_err(|e| AppError::Validation(e.body_text()))?;
    let id = OfficerRequestId::from_uuid(id);

    let existing = state
        .officer_requests
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("officer request {id} not found")))?;

    let requester_may = matches!(action, OfficerAction::Cancel)
        && existing.requester == actor.user_id;
    if !requester_may && !actor.can_review(&existing.scope) {
        return Err(AppError::Forbidden(format!(
            "role {} cannot act on requests in scope {}",
            actor.role, existing.scope
        )));
    }

    if let OfficerAction::CompleteOath = action {
        return complete_oath(state, actor, id).await;
    }

    let audit_action = audit_label(&action);
    let request = state
        .officer_requests
        .try_update(&id, |r| {
            let now = Utc::now();
            match &action {
                OfficerAction::ApproveSeminar => r.approve_seminar(actor.user_id, now)?,
                OfficerAction::MarkInSeminar => r.mark_in_seminar(actor.user_id, now)?,
                OfficerAction::CompleteSeminar => r.complete_seminar(actor.user_id, now)?,
                OfficerAction::ApproveOath => r.approve_oath(actor.user_id, now)?,
                OfficerAction::MarkReadyOath => r.mark_ready_oath(actor.user_id, now)?,
                OfficerAction::SetCode {
                    code,
                    existing_officer,
                } => {
                    let code = RecordCode::parse(code).ok_or_else(|| {
                        AppError::Validation(format!(
                            "unknown record code '{code}'. Valid codes: A, D"
                        ))
                    })?;
                    r.set_code(code, existing_officer.map(OfficerId::from))?;
                }
                OfficerAction::AddSeminarDate { date, location } => {
                    if location.trim().is_empty() {
                        return Err(AppError::Validation(
                            "seminar location must be non-empty".to_string(),
                        ));
                    }
                    r.add_seminar_date(*date, location.trim())?;
                }
                OfficerAction::MarkAttendance { index, attended } => {
                    r.mark_attendance(*index, *attended, actor.user_id)?;
                }
                OfficerAction::Reject { reason } => r.reject(reason, actor.user_id, now)?,
                OfficerAction::Cancel => r.cancel(actor.user_id, now)?,
                OfficerAction::CompleteOath => unreachable!("handled above"),
            }
            Ok::<_, AppError>(r.clone())
        })
        .ok_or_else(|| AppError::NotFound(format!("officer request {id} not found")))??;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::officers::update_request(pool, &request).await {
            tracing::error!(request_id = %request.id, error = %e, "failed to persist officer request update");
            return Err(AppError::Internal(
                "action applied in-memory but database persist failed".to_string(),
            ));
        }
    }

    state
        .audit
        .record(
            AuditEvent::new(
                audit_action,
                actor.user_id,
                format!("officer_request/{}", request.id),
            ),
            state.db_pool.as_ref(),
        )
        .await;

    Ok(Json(OfficerRequestResponse {
        success: true,
        request: OfficerRequestView::from(&request),
    }))
}

fn audit_label(action: &OfficerAction) -> &'static str {
    match action {
        OfficerAction::ApproveSeminar => "officer_request.seminar_approved",
        OfficerAction::MarkInSeminar => "officer_request.in_seminar",
        OfficerAction::CompleteSeminar => "officer_request.seminar_completed",
        OfficerAction::ApproveOath => "officer_request.oath_approved",
        OfficerAction::MarkReadyOath => "officer_request.ready_to_oath",
        OfficerAction::SetCode { .. } => "officer_request.code_set",
        OfficerAction::AddSeminarDate { .. } => "officer_request.seminar_date_added",
        OfficerAction::MarkAttendance { .. } => "officer_request.attendance_marked",
        OfficerAction::CompleteOath => "officer_request.oath_taken",
        OfficerAction::Reject { .. } => "officer_request.rejected",
        OfficerAction::Cancel => "officer_request.cancelled",
    }
}

/// Oath completion. CODE A creates a new identity and bumps the headcount;
/// CODE D reactivates the named identity into the request's scope and
/// appends the assignment.
///
/// The identity mutation runs inside the request update closure: the
/// request commit and the officer write stand or fall together, so a merge
/// target that vanished since `set_code` rolls the transition back rather
/// than stranding an `oath_taken` request with no identity.
async fn complete_oath(
    state: AppState,
    actor: Actor,
    id: OfficerRequestId,
) -> Result<Json<OfficerRequestResponse>, AppError> {
    let now = Utc::now();

    let (request, officer, headcount_delta) = state
        .officer_requests
        .try_update(&id, |r| {
            let disposition = r.complete_oath(actor.user_id, now)?;
            let assignment = DepartmentAssignment {
                role: r.requested_role.clone(),
                duty: r.requested_duty.clone(),
                oath_date: now.date_naive(),
            };
            let (officer, delta) = match disposition {
                OathDisposition::NewIdentity => {
                    let officer = Officer::materialize(
                        r.scope.clone(),
                        r.applicant_name_enc.clone(),
                        assignment,
                        now,
                    );
                    state.officers.insert(officer.officer_uuid, officer.clone());
                    state.bump_headcount(&r.scope, 1);
                    (officer, 1)
                }
                OathDisposition::MergeInto(target) => {
                    let officer = state
                        .officers
                        .try_update(&target, |o| {
                            o.reactivate_into(r.scope.clone(), assignment.clone());
                            Ok::<_, AppError>(o.clone())
                        })
                        .ok_or_else(|| {
                            AppError::Validation(format!(
                                "record code D names officer {target}, which does not exist"
                            ))
                        })??;
                    (officer, 0)
                }
            };
            r.officer_id = Some(officer.officer_uuid);
            Ok::<_, AppError>((r.clone(), officer, delta))
        })
        .ok_or_else(|| AppError::NotFound(format!("officer request {id} not found")))??;

    if let Some(pool) = &state.db_pool {
        if let Err(e) =
            crate::db::officers::persist_completion(pool, &request, &officer, headcount_delta)
                .await
        {
            tracing::error!(request_id = %request.id, error = %e, "failed to persist oath completion");
            return Err(AppError::Internal(
                "completion applied in-memory but database persist failed".to_string(),
            ));
        }
    }

    state
        .audit
        .record(
            AuditEvent::new(
                "officer_request.oath_taken",
                actor.user_id,
                format!("officer_request/{}", request.id),
            )
            .with_metadata(serde_json::json!({
                "officer_uuid": officer.officer_uuid.to_string(),
                "record_code": request.record_code.map(|c| c.as_str()),
            })),
            state.db_pool.as_ref(),
        )
        .await;

    Ok(Json(OfficerRequestResponse {
        success: true,
        request: OfficerRequestView::from(&request),
    }))
}

/// GET /v1/officers — Officer identities visible to the caller.
///
/// Names are decrypted per district. An identity whose district key is
/// unavailable (or whose ciphertext fails) is skipped and counted, never a
/// listing failure.
#[utoipa::path(
    get,
    path = "/v1/officers",
    responses((status = 200, description = "Visible officers with decrypted names", body = OfficerListResponse)),
    tag = "officers"
)]
pub async fn list_officers(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
) -> Result<Json<OfficerListResponse>, AppError> {
    let mut visible: Vec<Officer> = state
        .officers
        .list()
        .into_iter()
        .filter(|o| actor.is_admin() || o.scope == actor.scope)
        .collect();
    visible.sort_by_key(|o| o.created_at);

    let mut officers = Vec::with_capacity(visible.len());
    let mut undecryptable = 0usize;
    for o in &visible {
        let district = o.scope.district.as_str();
        let name = state
            .keyring
            .secret_for(district)
            .and_then(|secret| state.cipher.decrypt(&o.name_enc, district, &secret));
        match name {
            Ok(name) => officers.push(OfficerView {
                officer_uuid: o.officer_uuid.as_uuid(),
                scope: o.scope.to_string(),
                is_active: o.is_active,
                name,
                assignments: o.assignments.iter().map(AssignmentView::from).collect(),
                created_at: o.created_at,
            }),
            Err(e) => {
                undecryptable += 1;
                tracing::warn!(
                    officer = %o.officer_uuid,
                    district,
                    error = %e,
                    "skipping officer with undecryptable name"
                );
            }
        }
    }

    let headcount = if actor.is_admin() {
        state.headcounts.list().into_iter().sum()
    } else {
        state.headcount(&actor.scope)
    };

    Ok(Json(OfficerListResponse {
        success: true,
        officers,
        undecryptable,
        headcount,
    }))
}

/// POST /v1/officers/:id/merge — Absorb a duplicate identity.
///
/// Admin-only. All-or-nothing: both identities are validated up front, the
/// surviving identity absorbs the duplicate's assignments (exact role+duty
/// duplicates skipped), every officer request pointing at the duplicate is
/// re-pointed, the duplicate is deleted, and its scope's headcount drops by
/// one.
#[utoipa::path(
    post,
    path = "/v1/officers/{id}/merge",
    params(("id" = Uuid, Path, description = "Surviving officer ID")),
    request_body = MergeBody,
    responses(
        (status = 200, description = "Merge complete", body = MergeResponse),
        (status = 400, description = "Self-merge or validation failure", body = crate::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
        (status = 404, description = "Either identity missing", body = crate::error::ErrorBody),
    ),
    tag = "officers"
)]
pub async fn merge_officer(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
    body: Result<Json<MergeBody>, JsonRejection>,
) -> Result<Json<MergeResponse>, AppError> {
    if !actor.is_admin() {
        return Err(AppError::Forbidden(
            "identity merge is an administrator operation".to_string(),
        ));
    }
    let body = extract_validated_json(body)?;
    let primary_id = OfficerId::from_uuid(id);
    let duplicate_id = OfficerId::from_uuid(body.duplicate_id);
    if primary_id == duplicate_id {
        return Err(AppError::Validation(
            "an identity cannot be merged into itself".to_string(),
        ));
    }

    // Validate both sides before mutating anything.
    let duplicate = state
        .officers
        .get(&duplicate_id)
        .ok_or_else(|| AppError::NotFound(format!("officer {duplicate_id} not found")))?;
    if state.officers.get(&primary_id).is_none() {
        return Err(AppError::NotFound(format!("officer {primary_id} not found")));
    }

    let officer = state
        .officers
        .try_update(&primary_id, |o| {
            o.merge_assignments_from(&duplicate);
            Ok::<_, AppError>(o.clone())
        })
        .ok_or_else(|| AppError::NotFound(format!("officer {primary_id} not found")))??;

    // Re-point foreign references at the survivor.
    let mut repointed_requests = Vec::new();
    for r in state.officer_requests.list() {
        let points_at_duplicate =
            r.officer_id == Some(duplicate_id) || r.existing_officer == Some(duplicate_id);
        if !points_at_duplicate {
            continue;
        }
        let updated = state.officer_requests.try_update(&r.id, |r| {
            if r.officer_id == Some(duplicate_id) {
                r.officer_id = Some(primary_id);
            }
            if r.existing_officer == Some(duplicate_id) {
                r.existing_officer = Some(primary_id);
            }
            Ok::<_, AppError>(r.clone())
        });
        if let Some(Ok(updated)) = updated {
            repointed_requests.push(updated);
        }
    }
    let repointed = repointed_requests.len();

    state.officers.remove(&duplicate_id);
    state.bump_headcount(&duplicate.scope, -1);

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::officers::persist_merge(
            pool,
            &officer,
            duplicate_id,
            &duplicate.scope,
            &repointed_requests,
        )
        .await
        {
            tracing::error!(primary = %primary_id, duplicate = %duplicate_id, error = %e, "failed to persist identity merge");
            return Err(AppError::Internal(
                "merge applied in-memory but database persist failed".to_string(),
            ));
        }
    }

    state
        .audit
        .record(
            AuditEvent::new(
                "officer.merged",
                actor.user_id,
                format!("officer/{primary_id}"),
            )
            .with_metadata(serde_json::json!({
                "duplicate": duplicate_id.to_string(),
                "repointed_requests": repointed,
            })),
            state.db_pool.as_ref(),
        )
        .await;

    let district = officer.scope.district.as_str();
    let name = state
        .keyring
        .secret_for(district)
        .and_then(|secret| state.cipher.decrypt(&officer.name_enc, district, &secret))
        .unwrap_or_else(|_| "(name unavailable)".to_string());

    Ok(Json(MergeResponse {
        success: true,
        officer: OfficerView {
            officer_uuid: officer.officer_uuid.as_uuid(),
            scope: officer.scope.to_string(),
            is_active: officer.is_active,
            name,
            assignments: officer.assignments.iter().map(AssignmentView::from).collect(),
            created_at: officer.created_at,
        },
        repointed_requests: repointed,
    }))
}
