//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from ce-core, ce-state and the service layer to HTTP
//! status codes with a JSON body of the form
//! `{ "error": { "code", "message", "details"? } }`.
//! Internal error details never reach the response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use ce_core::{PasswordError, TaskError, ValidationError};
use ce_state::{StatusError, SubmissionError, WizardError};

use crate::accounts::AccountError;
use crate::otp::OtpError;
use crate::repository::RepoError;
use crate::store::StoreError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for some client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Validation failed with structured details (422).
    #[error("validation error: {message}")]
    ValidationDetails {
        message: String,
        details: serde_json::Value,
    },

    /// Request body could not be parsed (422).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing, invalid or expired credentials (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned.
    #[error("internal error: {0}")]
    Internal(String),

    /// Service dependency not configured (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) | Self::ValidationDetails { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR")
            }
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }

    /// The generic 403 for resources outside the caller's scope.
    pub fn forbidden() -> Self {
        Self::Forbidden("not permitted for this account".to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let details = match self {
            Self::ValidationDetails { details, .. } => Some(details),
            _ => None,
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<StatusError> for AppError {
    fn from(err: StatusError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Steps out of order are conflicts with the wizard's state; bad field
/// values are validation errors. Missing uploads list the kinds.
impl From<WizardError> for AppError {
    fn from(err: WizardError) -> Self {
        match &err {
            WizardError::WrongStep { .. } | WizardError::NoPreviousStep(_) => {
                Self::Conflict(err.to_string())
            }
            WizardError::MissingDocuments(kinds) => Self::ValidationDetails {
                message: "required documents are missing".to_string(),
                details: serde_json::json!({ "missing_documents": kinds }),
            },
            _ => Self::Validation(err.to_string()),
        }
    }
}

impl From<SubmissionError> for AppError {
    fn from(err: SubmissionError) -> Self {
        match &err {
            SubmissionError::InvalidTransition { .. } | SubmissionError::Terminal { .. } => {
                Self::Conflict(err.to_string())
            }
            SubmissionError::MissingReason => Self::Validation(err.to_string()),
        }
    }
}

impl From<TaskError> for AppError {
    fn from(err: TaskError) -> Self {
        Self::Conflict(err.to_string())
    }
}

impl From<PasswordError> for AppError {
    fn from(err: PasswordError) -> Self {
        match &err {
            PasswordError::TooShort => Self::Validation(err.to_string()),
            PasswordError::Hash(_) => Self::Internal(err.to_string()),
        }
    }
}

/// Every OTP failure gets the same message so callers cannot probe
/// which mobile numbers have a pending challenge.
impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::Delivery(msg) => Self::ServiceUnavailable(format!("OTP delivery failed: {msg}")),
            _ => Self::Unauthorized("invalid or expired OTP".to_string()),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match &err {
            AccountError::Duplicate { .. } => Self::Conflict(err.to_string()),
            AccountError::CustomerAccount | AccountError::Validation(_) => {
                Self::Validation(err.to_string())
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::NotFound(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(format!("database error: {err}"))
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Store(e) => e.into(),
            RepoError::Submission(e) => e.into(),
            RepoError::Task(e) => e.into(),
            RepoError::Validation(e) => e.into(),
            RepoError::Account(e) => e.into(),
            RepoError::Database(e) => e.into(),
            e @ (RepoError::UnknownAgent(_) | RepoError::UnknownAssociate(_)) => {
                Self::Validation(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ce_core::{DocumentKind, SubmissionId};
    use ce_state::SubmissionStatus;

    #[test]
    fn not_found_status_code() {
        let (status, code) = AppError::NotFound("missing client".into()).status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn validation_and_bad_request_are_422() {
        let (status, code) = AppError::Validation("bad field".into()).status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_ERROR");

        let (status, code) = AppError::BadRequest("malformed JSON".into()).status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "BAD_REQUEST");
    }

    #[test]
    fn auth_status_codes() {
        assert_eq!(
            AppError::Unauthorized("no token".into()).status_and_code(),
            (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
        );
        assert_eq!(
            AppError::forbidden().status_and_code(),
            (StatusCode::FORBIDDEN, "FORBIDDEN")
        );
    }

    #[test]
    fn conflict_and_server_status_codes() {
        assert_eq!(
            AppError::Conflict("x".into()).status_and_code().0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Internal("x".into()).status_and_code().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::ServiceUnavailable("x".into()).status_and_code().0,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn validation_error_from_ce_core() {
        let app_err = AppError::from(ValidationError::InvalidMobile("12345".into()));
        match &app_err {
            AppError::Validation(msg) => assert!(msg.contains("12345"), "got: {msg}"),
            other => panic!("expected Validation, got: {other:?}"),
        }
    }

    #[test]
    fn wrong_wizard_step_is_conflict() {
        let err = AppError::from(WizardError::WrongStep {
            expected: "upload".into(),
            actual: "login".into(),
        });
        assert_eq!(err.status_and_code().0, StatusCode::CONFLICT);
    }

    #[test]
    fn terminal_submission_is_conflict() {
        let err = AppError::from(SubmissionError::Terminal {
            id: SubmissionId::new(),
            status: SubmissionStatus::Filed,
        });
        assert_eq!(err.status_and_code().0, StatusCode::CONFLICT);
        let err = AppError::from(SubmissionError::MissingReason);
        assert_eq!(err.status_and_code().0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn otp_failures_share_one_message() {
        let a = AppError::from(OtpError::Expired).to_string();
        let b = AppError::from(OtpError::NoChallenge).to_string();
        assert_eq!(a, b);
    }

    // ── into_response tests ──────────────────────────────────────

    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn into_response_not_found() {
        let (status, body) = response_parts(AppError::NotFound("client 123".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.code, "NOT_FOUND");
        assert!(body.error.message.contains("client 123"));
        assert!(body.error.details.is_none());
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let (status, body) =
            response_parts(AppError::Internal("db connection failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.message, "An internal error occurred");
        assert!(body.error.details.is_none());
    }

    #[tokio::test]
    async fn into_response_missing_documents_carries_details() {
        let err = AppError::from(WizardError::MissingDocuments(vec![
            DocumentKind::SalesRegister,
            DocumentKind::PurchaseRegister,
        ]));
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error.code, "VALIDATION_ERROR");
        let details = body.error.details.unwrap();
        assert_eq!(
            details["missing_documents"],
            serde_json::json!(["sales_register", "purchase_register"])
        );
    }
}
