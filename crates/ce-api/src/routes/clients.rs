//! # Client API
//!
//! Routes:
//! - POST /v1/clients — register a client
//! - GET  /v1/clients — clients visible to the caller
//! - GET  /v1/clients/{id} — one client
//! - GET  /v1/clients/by-mobile/{mobile} — clients registered to a mobile
//! - PUT  /v1/clients/{id}/gst-credentials — GST portal credentials
//! - PUT  /v1/clients/{id}/itr-credentials — income tax portal credentials
//! - PUT  /v1/clients/{id}/agent — assign a partner agent (admin)
//! - POST /v1/clients/{id}/applications — process a service application
//! - GET  /v1/clients/{id}/submissions — the client's submissions

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use ce_core::{
    Client, ClientId, CreatedBy, Document, DocumentKind, Gstin, GstCredentials, ItrCredentials,
    MobileNumber, NewClient, Pan, Principal, Role, ServiceKind,
};
use ce_state::Submission;

use crate::access::{can_access, Resource};
use crate::auth::Authenticated;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_non_blank, Validate};
use crate::routes::visible_client;
use crate::state::AppState;

/// Most documents accepted in one application.
const MAX_DOCUMENTS_PER_APPLICATION: usize = 20;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateClientRequest {
    pub name: String,
    pub mobile_number: String,
    pub email: String,
    /// Entity type label, e.g. "Individual" or "Private Limited".
    pub entity_type: String,
    #[serde(default)]
    pub pan: Option<String>,
}

impl Validate for CreateClientRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("name", &self.name)?;
        require_non_blank("mobile_number", &self.mobile_number)?;
        require_non_blank("email", &self.email)?;
        require_non_blank("entity_type", &self.entity_type)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GstCredentialsRequest {
    pub gstin: String,
    pub portal_username: String,
}

impl Validate for GstCredentialsRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("gstin", &self.gstin)?;
        require_non_blank("portal_username", &self.portal_username)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ItrCredentialsRequest {
    pub pan: String,
    pub portal_user_id: String,
}

impl Validate for ItrCredentialsRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("pan", &self.pan)?;
        require_non_blank("portal_user_id", &self.portal_user_id)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignAgentRequest {
    pub username: String,
}

impl Validate for AssignAgentRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("username", &self.username)
    }
}

/// One uploaded file as sent by the browser.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DocumentUpload {
    pub kind: DocumentKind,
    pub file_name: String,
    /// `data:<mime>;base64,<payload>`
    pub file_data: String,
}

impl DocumentUpload {
    pub(crate) fn into_document(self, max_bytes: usize) -> Result<Document, AppError> {
        Ok(Document::new(self.kind, self.file_name, self.file_data, max_bytes)?)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplicationRequest {
    /// Service name, e.g. "gst_registration".
    pub service: String,
    #[serde(default)]
    pub extracted_data: serde_json::Value,
    #[serde(default)]
    pub documents: Vec<DocumentUpload>,
}

impl Validate for ApplicationRequest {
    fn validate(&self) -> Result<(), String> {
        require_non_blank("service", &self.service)?;
        if !(self.extracted_data.is_object() || self.extracted_data.is_null()) {
            return Err("extracted_data must be a JSON object".to_string());
        }
        if self.documents.len() > MAX_DOCUMENTS_PER_APPLICATION {
            return Err(format!(
                "documents must not exceed {MAX_DOCUMENTS_PER_APPLICATION} entries"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApplicationResponse {
    pub client: Client,
    pub submission: Submission,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/clients", post(create_client).get(list_clients))
        .route("/v1/clients/by-mobile/{mobile}", get(clients_by_mobile))
        .route("/v1/clients/{id}", get(get_client))
        .route("/v1/clients/{id}/gst-credentials", put(update_gst_credentials))
        .route("/v1/clients/{id}/itr-credentials", put(update_itr_credentials))
        .route("/v1/clients/{id}/agent", put(assign_agent))
        .route("/v1/clients/{id}/applications", post(submit_application))
        .route("/v1/clients/{id}/submissions", get(client_submissions))
}

/// POST /v1/clients — Register a client.
#[utoipa::path(
    post,
    path = "/v1/clients",
    request_body = CreateClientRequest,
    responses(
        (status = 201, description = "Client created", body = Client),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "clients"
)]
pub async fn create_client(
    State(state): State<AppState>,
    caller: Authenticated,
    body: Result<Json<CreateClientRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Client>), AppError> {
    caller.require_role(&[Role::Customer, Role::Agent, Role::Corporate, Role::Admin])?;
    let req = extract_validated_json(body)?;
    let new = NewClient::parse(
        &req.name,
        &req.mobile_number,
        &req.email,
        &req.entity_type,
        req.pan.as_deref(),
    )?;
    if let Principal::Customer { mobile_number, .. } = caller.principal() {
        if &new.mobile_number != mobile_number {
            return Err(AppError::Validation(
                "customers register clients under their own mobile number".to_string(),
            ));
        }
    }
    let client = state
        .repo
        .add_client(new, CreatedBy::from_principal(caller.principal()))
        .await?;
    Ok((StatusCode::CREATED, Json(client)))
}

/// GET /v1/clients — Clients visible to the caller.
#[utoipa::path(
    get,
    path = "/v1/clients",
    responses(
        (status = 200, description = "Visible clients", body = Vec<Client>),
    ),
    tag = "clients"
)]
pub async fn list_clients(
    State(state): State<AppState>,
    caller: Authenticated,
) -> Result<Json<Vec<Client>>, AppError> {
    let clients = match caller.principal() {
        Principal::Customer { mobile_number, .. } => state.repo.find_clients_by_mobile(mobile_number),
        Principal::Agent { username } => state.repo.clients_for_agent(username.as_str()),
        Principal::Corporate { username } => {
            state.repo.clients_created_by(Role::Corporate, username.as_str())
        }
        Principal::Admin { .. } => state.repo.list_clients(),
        Principal::Associate { .. } => return Err(AppError::forbidden()),
    };
    Ok(Json(clients))
}

/// GET /v1/clients/{id} — One client.
#[utoipa::path(
    get,
    path = "/v1/clients/{id}",
    params(("id" = Uuid, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Client found", body = Client),
        (status = 403, description = "Not the caller's client", body = crate::error::ErrorBody),
        (status = 404, description = "Client not found", body = crate::error::ErrorBody),
    ),
    tag = "clients"
)]
pub async fn get_client(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<Client>, AppError> {
    visible_client(&state, &caller, ClientId::from_uuid(id)).map(Json)
}

/// GET /v1/clients/by-mobile/{mobile} — All and only the clients registered
/// to a mobile number, limited to those the caller may see.
#[utoipa::path(
    get,
    path = "/v1/clients/by-mobile/{mobile}",
    params(("mobile" = String, Path, description = "10-digit mobile number")),
    responses(
        (status = 200, description = "Matching clients", body = Vec<Client>),
        (status = 403, description = "Another customer's mobile number", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid mobile number", body = crate::error::ErrorBody),
    ),
    tag = "clients"
)]
pub async fn clients_by_mobile(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(mobile): Path<String>,
) -> Result<Json<Vec<Client>>, AppError> {
    let mobile = MobileNumber::new(mobile)?;
    if let Principal::Customer { mobile_number, .. } = caller.principal() {
        if mobile_number != &mobile {
            return Err(AppError::forbidden());
        }
    }
    let clients = state
        .repo
        .find_clients_by_mobile(&mobile)
        .into_iter()
        .filter(|c| can_access(caller.principal(), Resource::Client(c)))
        .collect();
    Ok(Json(clients))
}

/// PUT /v1/clients/{id}/gst-credentials — Store GST portal credentials.
#[utoipa::path(
    put,
    path = "/v1/clients/{id}/gst-credentials",
    params(("id" = Uuid, Path, description = "Client ID")),
    request_body = GstCredentialsRequest,
    responses(
        (status = 200, description = "Credentials updated", body = Client),
        (status = 422, description = "Invalid GSTIN", body = crate::error::ErrorBody),
    ),
    tag = "clients"
)]
pub async fn update_gst_credentials(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<Uuid>,
    body: Result<Json<GstCredentialsRequest>, JsonRejection>,
) -> Result<Json<Client>, AppError> {
    let client = visible_client(&state, &caller, ClientId::from_uuid(id))?;
    let req = extract_validated_json(body)?;
    let credentials = GstCredentials {
        gstin: Gstin::new(req.gstin)?,
        portal_username: req.portal_username.trim().to_string(),
    };
    let client = state
        .repo
        .update_gst_credentials(client.id, credentials)
        .await?;
    Ok(Json(client))
}

/// PUT /v1/clients/{id}/itr-credentials — Store income tax portal credentials.
#[utoipa::path(
    put,
    path = "/v1/clients/{id}/itr-credentials",
    params(("id" = Uuid, Path, description = "Client ID")),
    request_body = ItrCredentialsRequest,
    responses(
        (status = 200, description = "Credentials updated", body = Client),
        (status = 422, description = "Invalid PAN", body = crate::error::ErrorBody),
    ),
    tag = "clients"
)]
pub async fn update_itr_credentials(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<Uuid>,
    body: Result<Json<ItrCredentialsRequest>, JsonRejection>,
) -> Result<Json<Client>, AppError> {
    let client = visible_client(&state, &caller, ClientId::from_uuid(id))?;
    let req = extract_validated_json(body)?;
    let credentials = ItrCredentials {
        pan: Pan::new(req.pan)?,
        portal_user_id: req.portal_user_id.trim().to_string(),
    };
    let client = state
        .repo
        .update_itr_credentials(client.id, credentials)
        .await?;
    Ok(Json(client))
}

/// PUT /v1/clients/{id}/agent — Assign a partner agent. Admin only.
#[utoipa::path(
    put,
    path = "/v1/clients/{id}/agent",
    params(("id" = Uuid, Path, description = "Client ID")),
    request_body = AssignAgentRequest,
    responses(
        (status = 200, description = "Agent assigned", body = Client),
        (status = 403, description = "Not an admin", body = crate::error::ErrorBody),
        (status = 422, description = "No such active agent", body = crate::error::ErrorBody),
    ),
    tag = "clients"
)]
pub async fn assign_agent(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<Uuid>,
    body: Result<Json<AssignAgentRequest>, JsonRejection>,
) -> Result<Json<Client>, AppError> {
    caller.require_role(&[Role::Admin])?;
    let req = extract_validated_json(body)?;
    let client = state
        .repo
        .assign_agent(ClientId::from_uuid(id), &req.username)
        .await?;
    Ok(Json(client))
}

/// POST /v1/clients/{id}/applications — Apply for a service.
///
/// Appends a profile to the client and creates the matching submission in
/// the service's initial status, in one commit.
#[utoipa::path(
    post,
    path = "/v1/clients/{id}/applications",
    params(("id" = Uuid, Path, description = "Client ID")),
    request_body = ApplicationRequest,
    responses(
        (status = 201, description = "Application recorded", body = ApplicationResponse),
        (status = 422, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "clients"
)]
pub async fn submit_application(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<Uuid>,
    body: Result<Json<ApplicationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApplicationResponse>), AppError> {
    let client = visible_client(&state, &caller, ClientId::from_uuid(id))?;
    let req = extract_validated_json(body)?;
    let service = ServiceKind::parse_lenient(&req.service)?;
    let max_bytes = state.config.max_document_bytes;
    let documents = req
        .documents
        .into_iter()
        .map(|d| d.into_document(max_bytes))
        .collect::<Result<Vec<_>, _>>()?;
    let extracted_data = match req.extracted_data {
        serde_json::Value::Null => serde_json::json!({}),
        data => data,
    };

    let (client, submission) = state
        .repo
        .process_service_application(client.id, service, extracted_data, documents)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApplicationResponse { client, submission }),
    ))
}

/// GET /v1/clients/{id}/submissions — The client's submissions.
#[utoipa::path(
    get,
    path = "/v1/clients/{id}/submissions",
    params(("id" = Uuid, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Submissions", body = Vec<Submission>),
    ),
    tag = "clients"
)]
pub async fn client_submissions(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Submission>>, AppError> {
    let client = visible_client(&state, &caller, ClientId::from_uuid(id))?;
    Ok(Json(state.repo.submissions_for_client(client.id)))
}
