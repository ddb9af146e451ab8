//! OpenAPI document, served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::routes::{documents, grants, officers, requests};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Registra API",
        description = "Tenant-scoped membership registry: access-request \
                       approvals, time-boxed grants, confidential-document \
                       lifecycle, and officer credentialing."
    ),
    paths(
        requests::submit_request,
        requests::list_pending,
        requests::approve_request,
        requests::reject_request,
        grants::list_grants,
        grants::check_authorized,
        grants::get_grant,
        grants::revoke_grant,
        documents::get_document,
        documents::open_document,
        documents::print_document,
        officers::submit_officer_request,
        officers::list_officer_requests,
        officers::get_officer_request,
        officers::apply_action,
        officers::get_history,
        officers::list_officers,
        officers::merge_officer,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        requests::SubmitRequestBody,
        requests::RejectRequestBody,
        requests::RequestView,
        requests::RequestResponse,
        requests::ApprovalResponse,
        requests::PendingResponse,
        grants::GrantView,
        grants::GrantResponse,
        grants::GrantListResponse,
        grants::AuthorizedResponse,
        documents::DocumentView,
        documents::DocumentResponse,
        documents::OpenResponse,
        documents::PrintResponse,
        officers::SubmitOfficerRequestBody,
        officers::OfficerAction,
        officers::SeminarSessionView,
        officers::OfficerRequestView,
        officers::OfficerRequestResponse,
        officers::OfficerRequestListResponse,
        officers::TransitionView,
        officers::HistoryResponse,
        officers::AssignmentView,
        officers::OfficerView,
        officers::OfficerListResponse,
        officers::MergeBody,
        officers::MergeResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "requests", description = "Registry access requests"),
        (name = "grants", description = "Derived access grants"),
        (name = "documents", description = "Confidential document lifecycle"),
        (name = "officers", description = "Officer credentialing"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "session_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Session bearer token; mutating calls also need X-Csrf-Token",
                        ))
                        .build(),
                ),
            );
        }
    }
}

async fn serve_openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Router exposing the OpenAPI document. Unauthenticated.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(serve_openapi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_builds_and_lists_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/v1/requests"));
        assert!(paths.iter().any(|p| p.as_str() == "/v1/documents/{id}/open"));
        assert!(paths.iter().any(|p| p.as_str() == "/v1/officers/{id}/merge"));
    }

    #[test]
    fn security_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components present");
        assert!(components.security_schemes.contains_key("session_token"));
    }
}
