//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into one OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer session token scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Session token from one of the /v1/auth login endpoints.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Chartered Ease API",
        description = "Tax and compliance filing service: customer OTP login, staff accounts, clients and profiles, service applications, GST and income tax return wizards, submission status tracking, dashboards and associate tasks.\n\nAuthentication: `Authorization: Bearer <token>`. Health probes, `/metrics` and the login endpoints are unauthenticated.",
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Auth ─────────────────────────────────────────────────────────
        crate::routes::auth::request_otp,
        crate::routes::auth::verify_otp,
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::auth::current_session,
        crate::routes::auth::switch_active_client,
        // ── Navigation ───────────────────────────────────────────────────
        crate::routes::navigation::resolve,
        // ── Clients ──────────────────────────────────────────────────────
        crate::routes::clients::create_client,
        crate::routes::clients::list_clients,
        crate::routes::clients::get_client,
        crate::routes::clients::clients_by_mobile,
        crate::routes::clients::update_gst_credentials,
        crate::routes::clients::update_itr_credentials,
        crate::routes::clients::assign_agent,
        crate::routes::clients::submit_application,
        crate::routes::clients::client_submissions,
        // ── Submissions ──────────────────────────────────────────────────
        crate::routes::submissions::list_submissions,
        crate::routes::submissions::get_submission,
        crate::routes::submissions::change_status,
        // ── Filings ──────────────────────────────────────────────────────
        crate::routes::filings::start_gst_return,
        crate::routes::filings::start_income_tax,
        crate::routes::filings::get_filing,
        crate::routes::filings::apply_action,
        crate::routes::filings::step_back,
        // ── Dashboard, tasks, admin ──────────────────────────────────────
        crate::routes::dashboard::dashboard,
        crate::routes::tasks::create_task,
        crate::routes::tasks::list_tasks,
        crate::routes::tasks::get_task,
        crate::routes::tasks::set_task_status,
        crate::routes::admin::create_account,
        crate::routes::admin::list_accounts,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::auth::Session,
        crate::access::View,
        crate::accounts::Account,
        crate::routes::ClientSummary,
        crate::routes::auth::OtpRequest,
        crate::routes::auth::OtpResponse,
        crate::routes::auth::VerifyOtpRequest,
        crate::routes::auth::LoginRequest,
        crate::routes::auth::LoginResponse,
        crate::routes::auth::ActiveClientRequest,
        crate::routes::auth::ActiveClientResponse,
        crate::routes::navigation::ResolveRequest,
        crate::routes::clients::CreateClientRequest,
        crate::routes::clients::GstCredentialsRequest,
        crate::routes::clients::ItrCredentialsRequest,
        crate::routes::clients::AssignAgentRequest,
        crate::routes::clients::DocumentUpload,
        crate::routes::clients::ApplicationRequest,
        crate::routes::clients::ApplicationResponse,
        crate::routes::submissions::StatusChangeRequest,
        crate::routes::filings::StartFilingRequest,
        crate::routes::filings::FilingAction,
        crate::routes::filings::FilingResponse,
        crate::routes::dashboard::Dashboard,
        crate::routes::tasks::CreateTaskRequest,
        crate::routes::tasks::TaskStatusRequest,
        crate::routes::tasks::TaskDetail,
        crate::routes::admin::CreateAccountRequest,
        ce_core::Client,
        ce_core::Profile,
        ce_core::Document,
        ce_core::AssociateTask,
        ce_core::Principal,
        ce_core::Role,
        ce_core::ServiceKind,
        ce_state::Submission,
        ce_state::SubmissionStatus,
        ce_state::StatusTransition,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Logins, sessions and the entity switcher"),
        (name = "navigation", description = "Page access decisions"),
        (name = "clients", description = "Clients, profiles and service applications"),
        (name = "submissions", description = "Submission lookup and status lifecycle"),
        (name = "filings", description = "GST and income tax return wizards"),
        (name = "dashboard", description = "Role-specific summaries"),
        (name = "tasks", description = "Associate tasks"),
        (name = "admin", description = "Staff account management"),
    )
)]
pub struct ApiDoc;

/// Router serving the OpenAPI document.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_every_route_group() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&String> = spec.paths.paths.keys().collect();
        for expected in [
            "/v1/auth/customer/otp",
            "/v1/auth/{role}/login",
            "/v1/navigation/resolve",
            "/v1/clients/{id}/applications",
            "/v1/submissions/{id}/status",
            "/v1/filings/{id}/actions",
            "/v1/dashboard",
            "/v1/tasks/{id}",
            "/v1/admin/accounts",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing path {expected}"
            );
        }
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components present");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
