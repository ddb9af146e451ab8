//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`. Maps
//! domain errors from the workflow and crypto crates to HTTP status codes
//! and `{"success": false, "error": {...}}` JSON bodies. Internal detail is
//! logged server-side and never returned to clients.
//!
//! Status mapping: validation and conflicts are both 400 (the caller must
//! change the request either way); authorization, lock, and expiry denials
//! are 403; only infrastructure failures are 500.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use registra_crypto::CryptoError;
use registra_workflow::{DocumentError, OfficerError, RequestError};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "VALIDATION_ERROR", "LOCKED").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type implementing [`IntoResponse`].
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or malformed input (400). Not retryable without changes.
    #[error("validation error: {0}")]
    Validation(String),

    /// The request collides with current state, e.g. a duplicate pending
    /// request or an already-decided one (400). The caller must change
    /// parameters before retrying.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Missing or invalid session token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller's role or scope does not permit the operation (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The document's viewing window has closed (403). Terminal for that
    /// document.
    #[error("document locked: {0}")]
    Locked(String),

    /// The document's retention window has lapsed (403). Terminal.
    #[error("document expired: {0}")]
    Expired(String),

    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal failure (500). Detail is logged, never returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status and machine-readable code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            Self::Conflict(_) => (StatusCode::BAD_REQUEST, "CONFLICT"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Locked(_) => (StatusCode::FORBIDDEN, "LOCKED"),
            Self::Expired(_) => (StatusCode::FORBIDDEN, "EXPIRED"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal detail to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::Forbidden(_) => tracing::warn!(error = %self, "authorization denied"),
            _ => {}
        }

        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        match &err {
            RequestError::AlreadyDecided { .. } | RequestError::DuplicatePending => {
                Self::Conflict(err.to_string())
            }
            RequestError::ScopeMismatch { .. } => Self::Forbidden(err.to_string()),
            RequestError::EmptyReason => Self::Validation(err.to_string()),
            RequestError::Tombstoned => Self::NotFound("request not found".to_string()),
        }
    }
}

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match &err {
            DocumentError::Locked { .. } => Self::Locked(err.to_string()),
            DocumentError::Expired => Self::Expired(err.to_string()),
        }
    }
}

impl From<OfficerError> for AppError {
    fn from(err: OfficerError) -> Self {
        match &err {
            OfficerError::InvalidTransition { .. } | OfficerError::Terminal { .. } => {
                Self::Conflict(err.to_string())
            }
            OfficerError::CodeNotSet
            | OfficerError::MissingExistingOfficer
            | OfficerError::UnexpectedExistingOfficer
            | OfficerError::EmptyReason
            | OfficerError::AttendanceIndexOutOfRange { .. } => Self::Validation(err.to_string()),
        }
    }
}

impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        // Configuration-class failures (bad master key, unprovisioned
        // district) are operator errors; per-record decrypt failures are
        // handled field-level by callers and should not reach this impl.
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registra_core::LocalId;
    use registra_workflow::RequestStatus;

    #[test]
    fn validation_maps_to_400() {
        let (status, code) = AppError::Validation("bad".into()).status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn conflict_maps_to_400() {
        // Conflicts require changed parameters, so they share the 400
        // class with validation failures.
        let (status, code) = AppError::Conflict("duplicate".into()).status_and_code();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(code, "CONFLICT");
    }

    #[test]
    fn lock_and_expiry_map_to_403() {
        let (status, code) = AppError::Locked("window closed".into()).status_and_code();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(code, "LOCKED");

        let (status, code) = AppError::Expired("gone".into()).status_and_code();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(code, "EXPIRED");
    }

    #[test]
    fn request_errors_convert() {
        let err: AppError = RequestError::AlreadyDecided {
            status: RequestStatus::Approved,
        }
        .into();
        assert!(matches!(err, AppError::Conflict(_)));

        let err: AppError = RequestError::ScopeMismatch {
            reviewer_local: LocalId::new("L1"),
            requester_local: LocalId::new("L2"),
        }
        .into();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err: AppError = RequestError::EmptyReason.into();
        assert!(matches!(err, AppError::Validation(_)));

        let err: AppError = RequestError::DuplicatePending.into();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(err.to_string().contains("already pending"));
    }

    #[test]
    fn document_errors_convert() {
        let err: AppError = DocumentError::Expired.into();
        assert!(matches!(err, AppError::Expired(_)));
    }

    #[test]
    fn officer_gate_errors_are_validation() {
        let err: AppError = OfficerError::CodeNotSet.into();
        assert!(matches!(err, AppError::Validation(_)));
    }

    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn into_response_sets_success_false() {
        let (status, body) = response_parts(AppError::NotFound("grant 123".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.success);
        assert_eq!(body.error.code, "NOT_FOUND");
        assert!(body.error.message.contains("grant 123"));
    }

    #[tokio::test]
    async fn into_response_internal_hides_detail() {
        let (status, body) =
            response_parts(AppError::Internal("db connection refused".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.message, "An internal error occurred");
        assert!(
            !body.error.message.contains("db connection"),
            "internal detail must not leak"
        );
    }
}
