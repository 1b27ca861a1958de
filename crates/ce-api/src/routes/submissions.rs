//! # Submission API
//!
//! Routes:
//! - GET /v1/submissions?status= — submissions visible to the caller
//! - GET /v1/submissions/{id} — one submission
//! - PUT /v1/submissions/{id}/status — move along the status lifecycle

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use ce_core::{Role, SubmissionId};
use ce_state::{Submission, SubmissionStatus};

use crate::access::{can_access, Resource};
use crate::auth::Authenticated;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubmissionQuery {
    /// Status label, e.g. "Processing".
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusChangeRequest {
    /// Target status label.
    pub status: String,
    pub reason: String,
}

impl Validate for StatusChangeRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("status", &self.status)?;
        require_non_blank("reason", &self.reason)?;
        if self.reason.len() > 1000 {
            return Err("reason must not exceed 1000 characters".to_string());
        }
        Ok(())
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/submissions", get(list_submissions))
        .route("/v1/submissions/{id}", get(get_submission))
        .route("/v1/submissions/{id}/status", put(change_status))
}

/// Load a submission and its client, checking the caller may see both.
fn visible_submission(
    state: &AppState,
    caller: &Authenticated,
    id: SubmissionId,
) -> Result<Submission, AppError> {
    let submission = state
        .repo
        .get_submission(id)
        .ok_or_else(|| AppError::NotFound(format!("submission {id} not found")))?;
    let client = state.repo.get_client(submission.client_id).ok_or_else(|| {
        AppError::Internal(format!("submission {id} references a missing client"))
    })?;
    if !can_access(
        caller.principal(),
        Resource::Submission {
            submission: &submission,
            client: &client,
        },
    ) {
        return Err(AppError::forbidden());
    }
    Ok(submission)
}

/// GET /v1/submissions — Submissions visible to the caller.
#[utoipa::path(
    get,
    path = "/v1/submissions",
    params(SubmissionQuery),
    responses(
        (status = 200, description = "Submissions", body = Vec<Submission>),
        (status = 422, description = "Unknown status", body = crate::error::ErrorBody),
    ),
    tag = "submissions"
)]
pub async fn list_submissions(
    State(state): State<AppState>,
    caller: Authenticated,
    Query(query): Query<SubmissionQuery>,
) -> Result<Json<Vec<Submission>>, AppError> {
    if caller.role() == Role::Associate {
        return Err(AppError::forbidden());
    }
    let status = query
        .status
        .as_deref()
        .map(str::parse::<SubmissionStatus>)
        .transpose()?;
    let submissions = state
        .repo
        .list_submissions(status)
        .into_iter()
        .filter(|s| {
            state.repo.get_client(s.client_id).is_some_and(|client| {
                can_access(
                    caller.principal(),
                    Resource::Submission {
                        submission: s,
                        client: &client,
                    },
                )
            })
        })
        .collect();
    Ok(Json(submissions))
}

/// GET /v1/submissions/{id} — One submission.
#[utoipa::path(
    get,
    path = "/v1/submissions/{id}",
    params(("id" = Uuid, Path, description = "Submission ID")),
    responses(
        (status = 200, description = "Submission found", body = Submission),
        (status = 404, description = "Submission not found", body = crate::error::ErrorBody),
    ),
    tag = "submissions"
)]
pub async fn get_submission(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<Submission>, AppError> {
    visible_submission(&state, &caller, SubmissionId::from_uuid(id)).map(Json)
}

/// PUT /v1/submissions/{id}/status — Change a submission's status.
///
/// Agents may move submissions of clients assigned to them; admins may move
/// any.
#[utoipa::path(
    put,
    path = "/v1/submissions/{id}/status",
    params(("id" = Uuid, Path, description = "Submission ID")),
    request_body = StatusChangeRequest,
    responses(
        (status = 200, description = "Status changed", body = Submission),
        (status = 403, description = "Not permitted", body = crate::error::ErrorBody),
        (status = 409, description = "Transition not allowed", body = crate::error::ErrorBody),
    ),
    tag = "submissions"
)]
pub async fn change_status(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<Uuid>,
    body: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> Result<Json<Submission>, AppError> {
    caller.require_role(&[Role::Agent, Role::Admin])?;
    let submission = visible_submission(&state, &caller, SubmissionId::from_uuid(id))?;
    let req = extract_validated_json(body)?;
    let to: SubmissionStatus = req.status.parse()?;
    let actor = format!("{}:{}", caller.role(), caller.principal().subject());
    let submission = state
        .repo
        .transition_submission(submission.id, to, req.reason.trim(), &actor)
        .await?;
    Ok(Json(submission))
}
