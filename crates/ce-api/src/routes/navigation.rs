//! # Navigation API
//!
//! Routes:
//! - POST /v1/navigation/resolve — decide what to show for a page
//!
//! A browser may be logged in as several roles at once, one token per role.
//! The bearer token (if any) and every token in `session_tokens` together
//! form the authentication snapshot. Unknown or expired tokens in the list
//! count as signed out.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::access::{dispatch, AuthSnapshot, Page, View};
use crate::auth::Authenticated;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::AppState;

/// Most extra tokens accepted per request; one per role.
const MAX_SESSION_TOKENS: usize = 5;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveRequest {
    /// Page name, e.g. "agent-dashboard" or "client-details/<uuid>".
    pub page: String,
    /// Tokens of other role sessions held by the same browser.
    #[serde(default)]
    pub session_tokens: Vec<String>,
    /// A role context is still restoring its session.
    #[serde(default)]
    pub loading: bool,
}

impl Validate for ResolveRequest {
    fn validate(&self) -> Result<(), String> {
        if self.session_tokens.len() > MAX_SESSION_TOKENS {
            return Err(format!(
                "session_tokens must not exceed {MAX_SESSION_TOKENS} entries"
            ));
        }
        if self.page.len() > 200 {
            return Err("page must not exceed 200 characters".to_string());
        }
        Ok(())
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/navigation/resolve", post(resolve))
}

/// POST /v1/navigation/resolve — The view for a page request.
#[utoipa::path(
    post,
    path = "/v1/navigation/resolve",
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "View to show", body = View),
    ),
    tag = "navigation"
)]
pub async fn resolve(
    State(state): State<AppState>,
    caller: Option<Authenticated>,
    body: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Json<View>, AppError> {
    let req = extract_validated_json(body)?;
    let mut principals: Vec<_> = caller.map(|c| c.session.principal).into_iter().collect();
    for token in &req.session_tokens {
        if let Some(session) = state.sessions.resolve(token.trim()) {
            if !principals.contains(&session.principal) {
                principals.push(session.principal);
            }
        }
    }
    let snapshot = AuthSnapshot {
        principals,
        loading: req.loading,
    };
    Ok(Json(dispatch(Page::parse(&req.page), &snapshot)))
}
