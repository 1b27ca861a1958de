//! # Request Extraction & Validation
//!
//! Provides the [`Validate`] trait for request DTOs and helpers that turn
//! JSON rejections and field-level failures into [`AppError`]s.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Request types that check field rules beyond what serde enforces.
pub trait Validate {
    /// Validate field rules. Returns an error message on failure.
    fn validate(&self) -> Result<(), String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it using the [`Validate`] trait.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    value.validate().map_err(AppError::Validation)?;
    Ok(value)
}

/// Reject a blank required string field.
pub(crate) fn require_non_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named {
        name: String,
    }

    impl Validate for Named {
        fn validate(&self) -> Result<(), String> {
            require_non_blank("name", &self.name)
        }
    }

    #[test]
    fn validate_rejects_blank() {
        let err = Named { name: "  ".into() }.validate().unwrap_err();
        assert_eq!(err, "name must not be empty");
        assert!(Named { name: "Asha".into() }.validate().is_ok());
    }

    #[test]
    fn extract_validated_json_maps_failure_to_validation() {
        let result = extract_validated_json(Ok(Json(Named { name: String::new() })));
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
