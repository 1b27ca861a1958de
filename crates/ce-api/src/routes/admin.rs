//! # Admin API
//!
//! Routes:
//! - POST /v1/admin/accounts — create a staff account
//! - GET  /v1/admin/accounts?role= — list staff accounts

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use ce_core::{hash_password, Role};

use crate::accounts::Account;
use crate::auth::Authenticated;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateAccountRequest {
    pub role: Role,
    /// Username, or PAN for associates.
    pub login: String,
    #[serde(default)]
    pub display_name: String,
    pub password: String,
}

impl Validate for CreateAccountRequest {
    fn validate(&self) -> Result<(), String> {
        if self.role == Role::Customer {
            return Err("customers log in by OTP and have no account".to_string());
        }
        require_non_blank("login", &self.login)?;
        if self.display_name.len() > 200 {
            return Err("display_name must not exceed 200 characters".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccountQuery {
    pub role: Option<Role>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/admin/accounts", post(create_account).get(list_accounts))
}

/// POST /v1/admin/accounts — Create an agent, corporate, admin or associate
/// account.
#[utoipa::path(
    post,
    path = "/v1/admin/accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = Account),
        (status = 403, description = "Not an admin", body = crate::error::ErrorBody),
        (status = 409, description = "Account already exists", body = crate::error::ErrorBody),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub async fn create_account(
    State(state): State<AppState>,
    caller: Authenticated,
    body: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    caller.require_role(&[Role::Admin])?;
    let req = extract_validated_json(body)?;

    let password = req.password;
    let hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task failed: {e}")))??;
    let account = Account::new(req.role, &req.login, &req.display_name, hash)?;
    let account = state.repo.create_account(account).await?;
    tracing::info!(
        admin = caller.principal().subject(),
        role = account.role.as_str(),
        login = %account.login,
        "staff account created by admin"
    );
    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /v1/admin/accounts — Staff accounts, optionally by role.
#[utoipa::path(
    get,
    path = "/v1/admin/accounts",
    params(AccountQuery),
    responses(
        (status = 200, description = "Accounts", body = Vec<Account>),
        (status = 403, description = "Not an admin", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub async fn list_accounts(
    State(state): State<AppState>,
    caller: Authenticated,
    Query(query): Query<AccountQuery>,
) -> Result<Json<Vec<Account>>, AppError> {
    caller.require_role(&[Role::Admin])?;
    Ok(Json(state.repo.accounts().list(query.role)))
}
