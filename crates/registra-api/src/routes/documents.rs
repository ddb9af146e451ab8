//! # Confidential Document API
//!
//! Open and print endpoints over document grants. Every attempt — allowed
//! or denied — lands in the audit trail; the lifecycle itself advances
//! lazily inside the workflow type.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use registra_core::{Actor, AuditEvent, DocumentId};
use registra_workflow::{DocumentError, DocumentGrant, OpenOutcome, PrintOutcome};

use crate::auth::CurrentActor;
use crate::error::AppError;
use crate::state::AppState;

/// API view of a document grant.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DocumentView {
    pub id: Uuid,
    pub request_id: Uuid,
    pub user_id: Uuid,
    /// `district/local` scope string.
    pub scope: String,
    /// Lifecycle stage: `approved_unopened`, `opened`, `locked`, `deleted`.
    pub state: String,
    pub approved_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_opened_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub will_delete_at: Option<DateTime<Utc>>,
    pub has_printed: bool,
}

impl From<&DocumentGrant> for DocumentView {
    fn from(d: &DocumentGrant) -> Self {
        Self {
            id: d.id.as_uuid(),
            request_id: d.request_id.as_uuid(),
            user_id: d.user_id.as_uuid(),
            scope: d.scope.to_string(),
            state: d.state().as_str().to_string(),
            approved_at: d.approved_at,
            first_opened_at: d.first_opened_at,
            will_delete_at: d.will_delete_at,
            has_printed: d.has_printed,
        }
    }
}

/// Response for a successful open: grant state plus the artifact.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OpenResponse {
    pub success: bool,
    pub document: DocumentView,
    /// `first_open` or `reopened`.
    pub outcome: String,
    /// The rendered confidential artifact.
    pub content: String,
}

/// Response for a print attempt.
///
/// A repeat print succeeds but carries no artifact; the attempt is
/// access-log-only.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PrintResponse {
    pub success: bool,
    pub document: DocumentView,
    /// `first_print` or `already_printed`.
    pub outcome: String,
    /// The artifact, present on the first print only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Response wrapping a document grant's metadata.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DocumentResponse {
    pub success: bool,
    pub document: DocumentView,
}

/// Build the documents router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/documents/:id", get(get_document))
        .route("/v1/documents/:id/open", post(open_document))
        .route("/v1/documents/:id/print", post(print_document))
}

fn authorize_holder(actor: &Actor, doc: &DocumentGrant) -> Result<(), AppError> {
    // Only the holder (or an admin) may touch a viewing session; reviewers
    // approved it but do not get to read the artifact.
    if doc.user_id == actor.user_id || actor.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "document grants are usable by their holder only".to_string(),
        ))
    }
}

/// GET /v1/documents/:id — Document grant metadata, no artifact and no
/// lifecycle side effects.
#[utoipa::path(
    get,
    path = "/v1/documents/{id}",
    params(("id" = Uuid, Path, description = "Document grant ID")),
    responses(
        (status = 200, description = "Grant metadata", body = DocumentResponse),
        (status = 404, description = "No such document grant", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub async fn get_document(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentResponse>, AppError> {
    let id = DocumentId::from_uuid(id);
    let doc = state
        .documents
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("document {id} not found")))?;
    authorize_holder(&actor, &doc)?;

    Ok(Json(DocumentResponse {
        success: true,
        document: DocumentView::from(&doc),
    }))
}

/// POST /v1/documents/:id/open — Open the document.
///
/// The attempt drives the lazy lifecycle: it may be the first open (which
/// starts the seven-day viewing and thirty-day retention clocks), a
/// reopen, or the attempt that locks or tombstones the grant — in which
/// case the attempt itself is denied.
#[utoipa::path(
    post,
    path = "/v1/documents/{id}/open",
    params(("id" = Uuid, Path, description = "Document grant ID")),
    responses(
        (status = 200, description = "Document opened; artifact returned", body = OpenResponse),
        (status = 403, description = "Viewing window closed or retention lapsed", body = crate::error::ErrorBody),
        (status = 404, description = "No such document grant", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub async fn open_document(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<OpenResponse>, AppError> {
    let id = DocumentId::from_uuid(id);
    let existing = state
        .documents
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("document {id} not found")))?;
    authorize_holder(&actor, &existing)?;

    let now = Utc::now();
    let result = state
        .documents
        .try_update(&id, |d| {
            let outcome = d.on_open_attempt(now);
            // Denials still advance state (lock, tombstone); carry both the
            // new record and the outcome so the denial commits.
            Ok::<_, AppError>((d.clone(), outcome))
        })
        .ok_or_else(|| AppError::NotFound(format!("document {id} not found")))??;
    let (doc, outcome) = result;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::documents::update(pool, &doc).await {
            tracing::error!(document_id = %doc.id, error = %e, "failed to persist document lifecycle state");
            return Err(AppError::Internal(
                "lifecycle advanced in-memory but database persist failed".to_string(),
            ));
        }
    }

    match outcome {
        Ok(o) => {
            let content = state
                .blobs
                .get(&id)
                .ok_or_else(|| AppError::Internal("rendered artifact missing".to_string()))?;

            let action = match o {
                OpenOutcome::FirstOpen => "document.opened_first",
                OpenOutcome::Reopened => "document.reopened",
            };
            state
                .audit
                .record(
                    AuditEvent::new(action, actor.user_id, format!("document/{}", doc.id)),
                    state.db_pool.as_ref(),
                )
                .await;

            Ok(Json(OpenResponse {
                success: true,
                document: DocumentView::from(&doc),
                outcome: match o {
                    OpenOutcome::FirstOpen => "first_open".to_string(),
                    OpenOutcome::Reopened => "reopened".to_string(),
                },
                content,
            }))
        }
        Err(e) => {
            if matches!(e, DocumentError::Expired) {
                // The retention lapse that tombstoned the grant also purges
                // the artifact.
                state.blobs.remove(&id);
            }
            let action = match e {
                DocumentError::Locked { .. } => "document.open_denied_locked",
                DocumentError::Expired => "document.open_denied_expired",
            };
            state
                .audit
                .record(
                    AuditEvent::new(action, actor.user_id, format!("document/{}", doc.id)),
                    state.db_pool.as_ref(),
                )
                .await;
            Err(e.into())
        }
    }
}

/// POST /v1/documents/:id/print — Print the document.
///
/// Runs the open lifecycle gate first. The first print returns the
/// artifact and sets `printed_at`; later prints succeed but change nothing
/// and return no artifact — they exist only in the access log.
#[utoipa::path(
    post,
    path = "/v1/documents/{id}/print",
    params(("id" = Uuid, Path, description = "Document grant ID")),
    responses(
        (status = 200, description = "Print recorded", body = PrintResponse),
        (status = 403, description = "Viewing window closed or retention lapsed", body = crate::error::ErrorBody),
        (status = 404, description = "No such document grant", body = crate::error::ErrorBody),
    ),
    tag = "documents"
)]
pub async fn print_document(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<Uuid>,
) -> Result<Json<PrintResponse>, AppError> {
    let id = DocumentId::from_uuid(id);
    let existing = state
        .documents
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("document {id} not found")))?;
    authorize_holder(&actor, &existing)?;

    let now = Utc::now();
    let result = state
        .documents
        .try_update(&id, |d| {
            let outcome = d.on_print_attempt(now);
            Ok::<_, AppError>((d.clone(), outcome))
        })
        .ok_or_else(|| AppError::NotFound(format!("document {id} not found")))??;
    let (doc, outcome) = result;

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::documents::update(pool, &doc).await {
            tracing::error!(document_id = %doc.id, error = %e, "failed to persist document lifecycle state");
            return Err(AppError::Internal(
                "lifecycle advanced in-memory but database persist failed".to_string(),
            ));
        }
    }

    match outcome {
        Ok(o) => {
            let (action, content) = match o {
                PrintOutcome::FirstPrint => {
                    let content = state.blobs.get(&id).ok_or_else(|| {
                        AppError::Internal("rendered artifact missing".to_string())
                    })?;
                    ("document.printed", Some(content))
                }
                PrintOutcome::AlreadyPrinted => ("document.print_repeated", None),
            };
            state
                .audit
                .record(
                    AuditEvent::new(action, actor.user_id, format!("document/{}", doc.id)),
                    state.db_pool.as_ref(),
                )
                .await;

            Ok(Json(PrintResponse {
                success: true,
                document: DocumentView::from(&doc),
                outcome: match o {
                    PrintOutcome::FirstPrint => "first_print".to_string(),
                    PrintOutcome::AlreadyPrinted => "already_printed".to_string(),
                },
                content,
            }))
        }
        Err(e) => {
            if matches!(e, DocumentError::Expired) {
                state.blobs.remove(&id);
            }
            let action = match e {
                DocumentError::Locked { .. } => "document.print_denied_locked",
                DocumentError::Expired => "document.print_denied_expired",
            };
            state
                .audit
                .record(
                    AuditEvent::new(action, actor.user_id, format!("document/{}", doc.id)),
                    state.db_pool.as_ref(),
                )
                .await;
            Err(e.into())
        }
    }
}
