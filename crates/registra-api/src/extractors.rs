//! Request body validation.
//!
//! Handlers take `Result<Json<T>, JsonRejection>` and pass it through
//! [`extract_validated_json`], which folds deserialization failures and
//! [`Validate`] failures into the same 400 validation error.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Structural validation for request bodies, run after deserialization.
pub trait Validate {
    /// Return `Err` with a client-facing message when the body is invalid.
    fn validate(&self) -> Result<(), String>;
}

/// Unwrap a JSON extraction and run the body's [`Validate`] impl.
pub fn extract_validated_json<T: Validate>(
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let Json(value) = body.map_err(|e| AppError::Validation(format!("invalid JSON body: {e}")))?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Body {
        name: String,
    }

    impl Validate for Body {
        fn validate(&self) -> Result<(), String> {
            if self.name.is_empty() {
                return Err("name must be non-empty".to_string());
            }
            Ok(())
        }
    }

    #[test]
    fn valid_body_passes() {
        let body = Ok(Json(Body {
            name: "ok".to_string(),
        }));
        assert!(extract_validated_json(body).is_ok());
    }

    #[test]
    fn invalid_body_maps_to_validation() {
        let body = Ok(Json(Body {
            name: String::new(),
        }));
        let err = extract_validated_json(body).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
