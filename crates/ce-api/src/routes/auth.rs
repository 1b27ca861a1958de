//! # Authentication API
//!
//! Routes:
//! - POST /v1/auth/customer/otp — issue an OTP challenge to a mobile number
//! - POST /v1/auth/customer/verify — exchange the OTP for a customer session
//! - POST /v1/auth/{role}/login — password login for agent, corporate,
//!   admin and associate accounts
//! - POST /v1/auth/logout — revoke the bearer session
//! - GET  /v1/auth/session — the caller's session
//! - PUT  /v1/auth/session/active-client — customer entity switcher

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use ce_core::{ClientId, MobileNumber, Principal, Role, Timestamp};

use crate::access::{can_access, Resource};
use crate::auth::{Authenticated, Session};
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct OtpRequest {
    pub mobile_number: String,
}

impl Validate for OtpRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("mobile_number", &self.mobile_number)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OtpResponse {
    /// Masked mobile number the code was sent to.
    pub sent_to: String,
    pub expires_at: Timestamp,
    /// The code itself, only when OTP echo is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub mobile_number: String,
    pub otp: String,
}

impl Validate for VerifyOtpRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("mobile_number", &self.mobile_number)?;
        require_non_blank("otp", &self.otp)
    }
}

/// Password login. Associates send `pan`, everyone else `username`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub pan: Option<String>,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), String> {
        if self.username.is_none() && self.pan.is_none() {
            return Err("username or pan is required".to_string());
        }
        require_non_blank("password", &self.password)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token for the `Authorization` header.
    pub token: String,
    pub session: Session,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ActiveClientRequest {
    pub client_id: Uuid,
}

impl Validate for ActiveClientRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActiveClientResponse {
    pub session: Session,
    /// The customer dashboard returns to its list view after a switch.
    pub dashboard_view: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/customer/otp", post(request_otp))
        .route("/v1/auth/customer/verify", post(verify_otp))
        .route("/v1/auth/{role}/login", post(login))
        .route("/v1/auth/logout", post(logout))
        .route("/v1/auth/session", get(current_session))
        .route("/v1/auth/session/active-client", put(switch_active_client))
}

fn record_login(role: Role, outcome: &'static str) {
    metrics::counter!("ce_logins_total", "role" => role.as_str(), "outcome" => outcome)
        .increment(1);
}

/// POST /v1/auth/customer/otp — Send a one-time code.
#[utoipa::path(
    post,
    path = "/v1/auth/customer/otp",
    request_body = OtpRequest,
    responses(
        (status = 200, description = "Code issued", body = OtpResponse),
        (status = 422, description = "Invalid mobile number", body = crate::error::ErrorBody),
        (status = 503, description = "Delivery failed", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub async fn request_otp(
    State(state): State<AppState>,
    body: Result<Json<OtpRequest>, JsonRejection>,
) -> Result<Json<OtpResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let mobile = MobileNumber::new(&req.mobile_number)?;
    let issued = state.otp.issue(&mobile)?;
    tracing::info!(mobile = %mobile.masked(), "OTP issued");
    Ok(Json(OtpResponse {
        sent_to: mobile.masked(),
        expires_at: issued.expires_at,
        otp: state.config.otp_echo.then_some(issued.code),
    }))
}

/// POST /v1/auth/customer/verify — Log a customer in with their code.
#[utoipa::path(
    post,
    path = "/v1/auth/customer/verify",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid or expired OTP", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    body: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let mobile = MobileNumber::new(&req.mobile_number)?;
    if let Err(e) = state.otp.verify(&mobile, req.otp.trim()) {
        record_login(Role::Customer, "failure");
        tracing::warn!(mobile = %mobile.masked(), error = %e, "customer login failed");
        return Err(e.into());
    }

    let active_client_id = state
        .repo
        .find_clients_by_mobile(&mobile)
        .first()
        .map(|c| c.id);
    let (token, session) = state.sessions.issue(Principal::Customer {
        mobile_number: mobile.clone(),
        active_client_id,
    });
    record_login(Role::Customer, "success");
    tracing::info!(mobile = %mobile.masked(), "customer logged in");
    Ok(Json(LoginResponse { token, session }))
}

/// POST /v1/auth/{role}/login — Password login for staff roles.
#[utoipa::path(
    post,
    path = "/v1/auth/{role}/login",
    params(("role" = String, Path, description = "agent, corporate, admin or associate")),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown role", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Path(role): Path<String>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let role: Role = role
        .parse()
        .map_err(|_| AppError::NotFound(format!("no login for role {role:?}")))?;
    if role == Role::Customer {
        return Err(AppError::BadRequest(
            "customers log in with an OTP at /v1/auth/customer/otp".to_string(),
        ));
    }
    let req = extract_validated_json(body)?;
    let login = match role {
        Role::Associate => req.pan.as_deref(),
        _ => req.username.as_deref(),
    }
    .ok_or_else(|| {
        AppError::Validation(match role {
            Role::Associate => "pan is required".to_string(),
            _ => "username is required".to_string(),
        })
    })?;

    // argon2 verification is CPU-bound.
    let accounts = state.repo.accounts().clone();
    let login_owned = login.to_string();
    let password = req.password;
    let account = tokio::task::spawn_blocking(move || {
        accounts.authenticate(role, &login_owned, &password)
    })
    .await
    .map_err(|e| AppError::Internal(format!("login task failed: {e}")))?;

    let Some(account) = account else {
        record_login(role, "failure");
        tracing::warn!(role = role.as_str(), login, "staff login failed");
        return Err(AppError::Unauthorized("invalid credentials".to_string()));
    };

    let principal = account
        .principal()
        .map_err(|e| AppError::Internal(format!("stored account is malformed: {e}")))?;
    let (token, session) = state.sessions.issue(principal);
    record_login(role, "success");
    tracing::info!(role = role.as_str(), login = %account.login, "staff logged in");
    Ok(Json(LoginResponse { token, session }))
}

/// POST /v1/auth/logout — End the current session.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Logged out"),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>, caller: Authenticated) -> StatusCode {
    state.sessions.revoke(&caller.token);
    tracing::info!(
        role = caller.role().as_str(),
        subject = %caller.principal().log_subject(),
        "logged out"
    );
    StatusCode::NO_CONTENT
}

/// GET /v1/auth/session — The caller's session.
#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Current session", body = Session),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub async fn current_session(caller: Authenticated) -> Json<Session> {
    Json(caller.session)
}

/// PUT /v1/auth/session/active-client — Switch the customer's active entity.
#[utoipa::path(
    put,
    path = "/v1/auth/session/active-client",
    request_body = ActiveClientRequest,
    responses(
        (status = 200, description = "Active client switched", body = ActiveClientResponse),
        (status = 403, description = "Not a customer, or not their client", body = crate::error::ErrorBody),
        (status = 404, description = "Client not found", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
pub async fn switch_active_client(
    State(state): State<AppState>,
    caller: Authenticated,
    body: Result<Json<ActiveClientRequest>, JsonRejection>,
) -> Result<Json<ActiveClientResponse>, AppError> {
    let Principal::Customer { mobile_number, .. } = caller.principal() else {
        return Err(AppError::forbidden());
    };
    let req = extract_validated_json(body)?;
    let client_id = ClientId::from_uuid(req.client_id);
    let client = state
        .repo
        .get_client(client_id)
        .ok_or_else(|| AppError::NotFound(format!("client {client_id} not found")))?;
    if !can_access(caller.principal(), Resource::Client(&client)) {
        return Err(AppError::forbidden());
    }

    let session = state
        .sessions
        .update_principal(
            &caller.token,
            Principal::Customer {
                mobile_number: mobile_number.clone(),
                active_client_id: Some(client_id),
            },
        )
        .ok_or_else(|| AppError::Unauthorized("invalid or expired session".to_string()))?;
    tracing::info!(mobile = %mobile_number.masked(), %client_id, "active client switched");
    Ok(Json(ActiveClientResponse {
        session,
        dashboard_view: "list".to_string(),
    }))
}
