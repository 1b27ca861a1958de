//! # Sessions & Bearer Authentication
//!
//! Every login issues an opaque bearer token: 32 random bytes rendered as
//! hex. Only the SHA-256 digest of the token is kept, next to the
//! [`Principal`] and an expiry. A caller may hold one token per role at the
//! same time, which is how a browser that is logged in as both a customer
//! and a partner agent is represented.
//!
//! The middleware is permissive about *absent* credentials: routes such as
//! the OTP and login endpoints, or the navigation resolver, work without a
//! token. A token that is present but unknown, expired or malformed is
//! rejected with 401 before the handler runs. Handlers that need a caller
//! take the [`Authenticated`] extractor.

use axum::extract::{FromRequestParts, OptionalFromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::{Authorization, HeaderMapExt};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use ce_core::{Principal, Role, Timestamp};

use crate::error::AppError;
use crate::state::{AppState, Store};

/// One authenticated login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Session {
    pub principal: Principal,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Session {
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }
}

/// Live sessions keyed by token digest.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Store<[u8; 32], Session>,
    ttl_secs: u64,
}

impl SessionRegistry {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            sessions: Store::new(),
            ttl_secs,
        }
    }

    /// Start a session for `principal`. Returns the bearer token, which is
    /// not recoverable afterwards.
    pub fn issue(&self, principal: Principal) -> (String, Session) {
        let token = generate_token();
        let now = Timestamp::now();
        let session = Session {
            principal,
            created_at: now,
            expires_at: now.plus_secs(self.ttl_secs),
        };
        self.sessions.insert(token_digest(&token), session.clone());
        (token, session)
    }

    /// The live session for `token`. An expired session is dropped.
    pub fn resolve(&self, token: &str) -> Option<Session> {
        let key = token_digest(token);
        let session = self.sessions.get(&key)?;
        if session.is_expired_at(Timestamp::now()) {
            self.sessions.remove(&key);
            return None;
        }
        Some(session)
    }

    /// End the session for `token`. Returns whether one existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(&token_digest(token)).is_some()
    }

    /// Replace the principal on a live session, keeping its expiry.
    pub fn update_principal(&self, token: &str, principal: Principal) -> Option<Session> {
        let now = Timestamp::now();
        self.sessions
            .try_update(&token_digest(token), |session| {
                if session.is_expired_at(now) {
                    return Err(());
                }
                session.principal = principal;
                Ok(session.clone())
            })
            .and_then(Result::ok)
    }

    pub fn purge_expired(&self) -> usize {
        let now = Timestamp::now();
        self.sessions.retain(|s| !s.is_expired_at(now))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    to_hex(&bytes)
}

fn token_digest(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

/// Lowercase hex rendering.
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

// -- Middleware & Extractors --------------------------------------------------

/// The caller's session, inserted into request extensions by
/// [`auth_middleware`] when a valid bearer token is presented.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub token: String,
    pub session: Session,
}

impl Authenticated {
    pub fn principal(&self) -> &Principal {
        &self.session.principal
    }

    pub fn role(&self) -> Role {
        self.session.principal.role()
    }

    /// 403 unless the caller holds one of `roles`.
    pub fn require_role(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role()) {
            Ok(())
        } else {
            Err(AppError::forbidden())
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("authentication required".to_string()))
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for Authenticated {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<Authenticated>().cloned())
    }
}

/// Resolve an `Authorization: Bearer` header into an [`Authenticated`]
/// extension. Requests without the header pass through untouched.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if !request.headers().contains_key(AUTHORIZATION) {
        return next.run(request).await;
    }

    let Some(header) = request.headers().typed_get::<Authorization<Bearer>>() else {
        return AppError::Unauthorized("expected a Bearer token".to_string()).into_response();
    };
    let token = header.token().to_string();

    match state.sessions.resolve(&token) {
        Some(session) => {
            request
                .extensions_mut()
                .insert(Authenticated { token, session });
            next.run(request).await
        }
        None => AppError::Unauthorized("invalid or expired session".to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::Router;
    use ce_core::{MobileNumber, Username};
    use tower::ServiceExt;

    use crate::state::AppConfig;

    fn admin() -> Principal {
        Principal::Admin {
            username: Username::new("root").unwrap(),
        }
    }

    #[test]
    fn test_issue_and_resolve() {
        let registry = SessionRegistry::new(60);
        let (token, session) = registry.issue(admin());
        assert_eq!(token.len(), 64);
        assert_eq!(registry.resolve(&token), Some(session));
        assert!(registry.resolve("not-a-token").is_none());
    }

    #[test]
    fn test_tokens_are_unique() {
        let registry = SessionRegistry::new(60);
        let (a, _) = registry.issue(admin());
        let (b, _) = registry.issue(admin());
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_revoke() {
        let registry = SessionRegistry::new(60);
        let (token, _) = registry.issue(admin());
        assert!(registry.revoke(&token));
        assert!(!registry.revoke(&token));
        assert!(registry.resolve(&token).is_none());
    }

    #[test]
    fn test_expired_session_dropped() {
        let registry = SessionRegistry::new(0);
        let (token, _) = registry.issue(admin());
        assert!(registry.resolve(&token).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_update_principal_keeps_expiry() {
        let registry = SessionRegistry::new(60);
        let mobile = MobileNumber::new("9999999999").unwrap();
        let (token, before) = registry.issue(Principal::Customer {
            mobile_number: mobile.clone(),
            active_client_id: None,
        });
        let client_id = ce_core::ClientId::new();
        let after = registry
            .update_principal(
                &token,
                Principal::Customer {
                    mobile_number: mobile,
                    active_client_id: Some(client_id),
                },
            )
            .unwrap();
        assert_eq!(after.expires_at, before.expires_at);
        assert_eq!(after.principal.active_client_id(), Some(client_id));
    }

    #[test]
    fn test_hex() {
        assert_eq!(to_hex(&[0x00, 0xab, 0x0f]), "00ab0f");
    }

    // -- Middleware tests ---------------------------------------------------

    async fn whoami(caller: Option<Authenticated>) -> String {
        caller
            .map(|c| c.principal().subject().to_string())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn test_app(state: AppState) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(from_fn_with_state(state.clone(), auth_middleware))
            .with_state(state)
    }

    async fn call(app: Router, auth: Option<&str>) -> (StatusCode, String) {
        let mut req = axum::http::Request::builder().uri("/whoami");
        if let Some(value) = auth {
            req = req.header(AUTHORIZATION, value);
        }
        let resp = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = http_body_util::BodyExt::collect(resp.into_body())
            .await
            .unwrap()
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    #[tokio::test]
    async fn test_no_header_passes_through() {
        let app = test_app(AppState::new(AppConfig::default()));
        assert_eq!(call(app, None).await, (StatusCode::OK, "anonymous".into()));
    }

    #[tokio::test]
    async fn test_valid_token_attaches_principal() {
        let state = AppState::new(AppConfig::default());
        let (token, _) = state.sessions.issue(admin());
        let app = test_app(state);
        let bearer = format!("Bearer {token}");
        assert_eq!(call(app, Some(&bearer)).await, (StatusCode::OK, "root".into()));
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let app = test_app(AppState::new(AppConfig::default()));
        let (status, _) = call(app, Some("Bearer deadbeef")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_bearer_scheme_rejected() {
        let app = test_app(AppState::new(AppConfig::default()));
        let (status, _) = call(app, Some("Basic dXNlcjpwYXNz")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
