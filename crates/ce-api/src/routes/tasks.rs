//! # Associate Task API
//!
//! Routes:
//! - POST /v1/tasks — assign a task to an associate (admin)
//! - GET  /v1/tasks — the associate's own tasks, or all tasks for admins
//! - GET  /v1/tasks/{id} — one task with its client summary
//! - PUT  /v1/tasks/{id}/status — move a task along open → in_progress → done

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use ce_core::{AssociateTask, ClientId, Pan, Principal, Role, ServiceKind, TaskId, TaskStatus};

use crate::access::{can_access, Resource};
use crate::auth::Authenticated;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::routes::ClientSummary;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    pub associate_pan: String,
    pub client_id: Uuid,
    pub service: String,
    pub title: String,
    #[serde(default)]
    pub notes: String,
}

impl Validate for CreateTaskRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("associate_pan", &self.associate_pan)?;
        require_non_blank("service", &self.service)?;
        require_non_blank("title", &self.title)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskStatusRequest {
    pub status: TaskStatus,
}

impl Validate for TaskStatusRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TaskDetail {
    pub task: AssociateTask,
    pub client: Option<ClientSummary>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/tasks", post(create_task).get(list_tasks))
        .route("/v1/tasks/{id}", get(get_task))
        .route("/v1/tasks/{id}/status", put(set_task_status))
}

fn visible_task(state: &AppState, caller: &Authenticated, id: TaskId) -> Result<AssociateTask, AppError> {
    let task = state
        .repo
        .get_task(id)
        .ok_or_else(|| AppError::NotFound(format!("task {id} not found")))?;
    if !can_access(caller.principal(), Resource::Task(&task)) {
        return Err(AppError::forbidden());
    }
    Ok(task)
}

/// POST /v1/tasks — Assign a task to an associate. Admin only.
#[utoipa::path(
    post,
    path = "/v1/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = AssociateTask),
        (status = 403, description = "Not an admin", body = crate::error::ErrorBody),
        (status = 422, description = "Unknown associate or invalid input", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn create_task(
    State(state): State<AppState>,
    caller: Authenticated,
    body: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AssociateTask>), AppError> {
    caller.require_role(&[Role::Admin])?;
    let req = extract_validated_json(body)?;
    let pan = Pan::new(req.associate_pan)?;
    let service = ServiceKind::parse_lenient(&req.service)?;
    let task = state
        .repo
        .create_task(
            pan,
            ClientId::from_uuid(req.client_id),
            service,
            &req.title,
            &req.notes,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /v1/tasks — Tasks visible to the caller.
#[utoipa::path(
    get,
    path = "/v1/tasks",
    responses(
        (status = 200, description = "Tasks", body = Vec<AssociateTask>),
        (status = 403, description = "Not an associate or admin", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    caller: Authenticated,
) -> Result<Json<Vec<AssociateTask>>, AppError> {
    match caller.principal() {
        Principal::Associate { pan } => Ok(Json(state.repo.tasks_for_associate(pan))),
        Principal::Admin { .. } => Ok(Json(state.repo.list_tasks())),
        _ => Err(AppError::forbidden()),
    }
}

/// GET /v1/tasks/{id} — One task with its client.
#[utoipa::path(
    get,
    path = "/v1/tasks/{id}",
    params(("id" = Uuid, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task found", body = TaskDetail),
        (status = 403, description = "Not the caller's task", body = crate::error::ErrorBody),
        (status = 404, description = "Task not found", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn get_task(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<TaskDetail>, AppError> {
    let task = visible_task(&state, &caller, TaskId::from_uuid(id))?;
    let client = state
        .repo
        .get_client(task.client_id)
        .as_ref()
        .map(ClientSummary::from);
    Ok(Json(TaskDetail { task, client }))
}

/// PUT /v1/tasks/{id}/status — Change a task's status.
#[utoipa::path(
    put,
    path = "/v1/tasks/{id}/status",
    params(("id" = Uuid, Path, description = "Task ID")),
    request_body = TaskStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = AssociateTask),
        (status = 409, description = "Status change not allowed", body = crate::error::ErrorBody),
    ),
    tag = "tasks"
)]
pub async fn set_task_status(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<Uuid>,
    body: Result<Json<TaskStatusRequest>, JsonRejection>,
) -> Result<Json<AssociateTask>, AppError> {
    let task = visible_task(&state, &caller, TaskId::from_uuid(id))?;
    let req = extract_validated_json(body)?;
    let task = state
        .repo
        .set_task_status(task.id, req.status, caller.role())
        .await?;
    Ok(Json(task))
}
