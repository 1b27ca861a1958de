//! # Filing Wizard API
//!
//! Routes:
//! - POST /v1/filings/gst-return — start a GST return for a client
//! - POST /v1/filings/income-tax — start an income tax return for a client
//! - GET  /v1/filings/{id} — wizard state
//! - POST /v1/filings/{id}/actions — advance the wizard
//! - POST /v1/filings/{id}/back — return to the previous step
//!
//! Wizards live in memory only. The action that completes a wizard records
//! its outcome as a client profile plus submission and removes the wizard;
//! if that write fails the wizard is restored to the step before the
//! action. Only customers and agents file, as on the filing pages.

use std::collections::BTreeSet;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use ce_core::{ClientId, Document, DocumentKind, FilingId, Role};
use ce_state::{
    AssessmentYear, FilingOutcome, GstReturnWizard, IncomeSource, IncomeTaxWizard, ReturnPeriod,
    ReturnType, Submission,
};

use crate::access::SHARED;
use crate::auth::Authenticated;
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::routes::visible_client;
use crate::state::{AppState, Filing};

const FILING_ROLES: &[Role] = SHARED;

#[derive(Debug, Deserialize, ToSchema)]
pub struct StartFilingRequest {
    pub client_id: Uuid,
}

impl Validate for StartFilingRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// One wizard step. Which actions apply depends on the filing kind and its
/// current step.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FilingAction {
    /// Init → Login.
    Begin,
    /// GST: `gstin` and `portal_username`. Income tax: `pan`.
    PortalLogin {
        #[serde(default)]
        gstin: Option<String>,
        #[serde(default)]
        portal_username: Option<String>,
        #[serde(default)]
        pan: Option<String>,
    },
    /// GST return period.
    SelectPeriod { month: u8, year: u16 },
    /// GST nil or regular return.
    ChooseType { return_type: ReturnType },
    /// Income tax assessment year, e.g. "2024-25".
    SelectAssessmentYear { assessment_year: String },
    SelectIncomeSources { income_sources: BTreeSet<IncomeSource> },
    /// Upload one document.
    Attach {
        kind: DocumentKind,
        file_name: String,
        /// `data:<mime>;base64,<payload>`
        file_data: String,
    },
    /// Income tax: Upload → Review.
    Review,
    /// Finish a regular GST return or a reviewed income tax return.
    Submit,
    /// Finish a GST nil return.
    ConfirmNil,
}

impl FilingAction {
    fn name(&self) -> &'static str {
        match self {
            Self::Begin => "begin",
            Self::PortalLogin { .. } => "portal_login",
            Self::SelectPeriod { .. } => "select_period",
            Self::ChooseType { .. } => "choose_type",
            Self::SelectAssessmentYear { .. } => "select_assessment_year",
            Self::SelectIncomeSources { .. } => "select_income_sources",
            Self::Attach { .. } => "attach",
            Self::Review => "review",
            Self::Submit => "submit",
            Self::ConfirmNil => "confirm_nil",
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FilingResponse {
    #[schema(value_type = Object)]
    pub filing: Filing,
    pub step: String,
    pub complete: bool,
    /// Uploads still needed before the wizard can move on.
    pub missing_documents: Vec<DocumentKind>,
    /// The submission recorded when this response completed the wizard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<Submission>,
}

impl FilingResponse {
    fn new(filing: Filing, submission: Option<Submission>) -> Self {
        let missing_documents = match &filing {
            Filing::GstReturn(w) if w.return_type == Some(ReturnType::Regular) => {
                w.missing_documents()
            }
            Filing::GstReturn(_) => Vec::new(),
            Filing::IncomeTax(w) => w.missing_documents(),
        };
        Self {
            step: filing.step().to_string(),
            complete: filing.is_complete(),
            missing_documents,
            submission,
            filing,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/filings/gst-return", post(start_gst_return))
        .route("/v1/filings/income-tax", post(start_income_tax))
        .route("/v1/filings/{id}", get(get_filing))
        .route("/v1/filings/{id}/actions", post(apply_action))
        .route("/v1/filings/{id}/back", post(step_back))
}

fn start(
    state: &AppState,
    caller: &Authenticated,
    client_id: Uuid,
    build: impl FnOnce(ClientId) -> Filing,
) -> Result<(StatusCode, Json<FilingResponse>), AppError> {
    caller.require_role(FILING_ROLES)?;
    let client = visible_client(state, caller, ClientId::from_uuid(client_id))?;
    let filing = build(client.id);
    state.filings.insert(filing.id(), filing.clone());
    tracing::info!(filing_id = %filing.id(), client_id = %client.id, step = filing.step(), "filing started");
    Ok((StatusCode::CREATED, Json(FilingResponse::new(filing, None))))
}

/// Load a filing whose client the caller may see.
fn visible_filing(
    state: &AppState,
    caller: &Authenticated,
    id: FilingId,
) -> Result<Filing, AppError> {
    caller.require_role(FILING_ROLES)?;
    let filing = state
        .filings
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("filing {id} not found")))?;
    visible_client(state, caller, filing.client_id())?;
    Ok(filing)
}

/// POST /v1/filings/gst-return — Start a GST return wizard.
#[utoipa::path(
    post,
    path = "/v1/filings/gst-return",
    request_body = StartFilingRequest,
    responses(
        (status = 201, description = "Wizard started", body = FilingResponse),
        (status = 404, description = "Client not found", body = crate::error::ErrorBody),
    ),
    tag = "filings"
)]
pub async fn start_gst_return(
    State(state): State<AppState>,
    caller: Authenticated,
    body: Result<Json<StartFilingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FilingResponse>), AppError> {
    let req = extract_validated_json(body)?;
    start(&state, &caller, req.client_id, |id| {
        Filing::GstReturn(GstReturnWizard::new(id))
    })
}

/// POST /v1/filings/income-tax — Start an income tax return wizard.
#[utoipa::path(
    post,
    path = "/v1/filings/income-tax",
    request_body = StartFilingRequest,
    responses(
        (status = 201, description = "Wizard started", body = FilingResponse),
        (status = 404, description = "Client not found", body = crate::error::ErrorBody),
    ),
    tag = "filings"
)]
pub async fn start_income_tax(
    State(state): State<AppState>,
    caller: Authenticated,
    body: Result<Json<StartFilingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<FilingResponse>), AppError> {
    let req = extract_validated_json(body)?;
    start(&state, &caller, req.client_id, |id| {
        Filing::IncomeTax(IncomeTaxWizard::new(id))
    })
}

/// GET /v1/filings/{id} — Wizard state.
#[utoipa::path(
    get,
    path = "/v1/filings/{id}",
    params(("id" = Uuid, Path, description = "Filing ID")),
    responses(
        (status = 200, description = "Wizard state", body = FilingResponse),
        (status = 404, description = "Filing not found", body = crate::error::ErrorBody),
    ),
    tag = "filings"
)]
pub async fn get_filing(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<FilingResponse>, AppError> {
    let filing = visible_filing(&state, &caller, FilingId::from_uuid(id))?;
    Ok(Json(FilingResponse::new(filing, None)))
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{field} is required")))
}

/// Apply `action` to `filing`. Returns the outcome when the action
/// completes the wizard.
fn apply(
    filing: &mut Filing,
    action: FilingAction,
    max_document_bytes: usize,
) -> Result<Option<FilingOutcome>, AppError> {
    let action_name = action.name();
    match (filing, action) {
        (Filing::GstReturn(w), FilingAction::Begin) => w.begin()?,
        (
            Filing::GstReturn(w),
            FilingAction::PortalLogin {
                gstin,
                portal_username,
                ..
            },
        ) => w.portal_login(
            &required(gstin, "gstin")?,
            &required(portal_username, "portal_username")?,
        )?,
        (Filing::GstReturn(w), FilingAction::SelectPeriod { month, year }) => {
            w.select_period(ReturnPeriod::new(month, year)?)?
        }
        (Filing::GstReturn(w), FilingAction::ChooseType { return_type }) => {
            w.choose_type(return_type)?
        }
        (
            Filing::GstReturn(w),
            FilingAction::Attach {
                kind,
                file_name,
                file_data,
            },
        ) => w.attach(Document::new(kind, file_name, file_data, max_document_bytes)?)?,
        (Filing::GstReturn(w), FilingAction::Submit) => return Ok(Some(w.submit()?)),
        (Filing::GstReturn(w), FilingAction::ConfirmNil) => return Ok(Some(w.confirm_nil()?)),

        (Filing::IncomeTax(w), FilingAction::Begin) => w.begin()?,
        (Filing::IncomeTax(w), FilingAction::PortalLogin { pan, .. }) => {
            w.portal_login(&required(pan, "pan")?)?
        }
        (Filing::IncomeTax(w), FilingAction::SelectAssessmentYear { assessment_year }) => {
            w.select_assessment_year(AssessmentYear::new(&assessment_year)?)?
        }
        (Filing::IncomeTax(w), FilingAction::SelectIncomeSources { income_sources }) => {
            w.select_income_sources(income_sources)?
        }
        (
            Filing::IncomeTax(w),
            FilingAction::Attach {
                kind,
                file_name,
                file_data,
            },
        ) => w.attach(Document::new(kind, file_name, file_data, max_document_bytes)?)?,
        (Filing::IncomeTax(w), FilingAction::Review) => w.review()?,
        (Filing::IncomeTax(w), FilingAction::Submit) => return Ok(Some(w.submit()?)),

        (filing, _) => {
            let kind = match filing {
                Filing::GstReturn(_) => "GST return",
                Filing::IncomeTax(_) => "income tax",
            };
            return Err(AppError::Validation(format!(
                "action {action_name} does not apply to a {kind} filing"
            )));
        }
    }
    Ok(None)
}

/// POST /v1/filings/{id}/actions — Advance the wizard.
#[utoipa::path(
    post,
    path = "/v1/filings/{id}/actions",
    params(("id" = Uuid, Path, description = "Filing ID")),
    request_body = FilingAction,
    responses(
        (status = 200, description = "Action applied", body = FilingResponse),
        (status = 409, description = "Action not valid at the current step", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid input or missing documents", body = crate::error::ErrorBody),
    ),
    tag = "filings"
)]
pub async fn apply_action(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<Uuid>,
    body: Result<Json<FilingAction>, JsonRejection>,
) -> Result<Json<FilingResponse>, AppError> {
    let id = FilingId::from_uuid(id);
    visible_filing(&state, &caller, id)?;
    let action = extract_json(body)?;
    let max_bytes = state.config.max_document_bytes;

    let (before, outcome, after) = state
        .filings
        .try_update(&id, |filing| {
            let before = filing.clone();
            let outcome = apply(filing, action, max_bytes)?;
            Ok::<_, AppError>((before, outcome, filing.clone()))
        })
        .ok_or_else(|| AppError::NotFound(format!("filing {id} not found")))??;

    let Some(outcome) = outcome else {
        return Ok(Json(FilingResponse::new(after, None)));
    };
    match state.repo.record_filing(outcome).await {
        Ok((_, submission)) => {
            state.filings.remove(&id);
            Ok(Json(FilingResponse::new(after, Some(submission))))
        }
        Err(e) => {
            state.filings.insert(id, before);
            Err(e.into())
        }
    }
}

/// POST /v1/filings/{id}/back — Return to the previous step.
#[utoipa::path(
    post,
    path = "/v1/filings/{id}/back",
    params(("id" = Uuid, Path, description = "Filing ID")),
    responses(
        (status = 200, description = "Moved back", body = FilingResponse),
        (status = 409, description = "No previous step", body = crate::error::ErrorBody),
    ),
    tag = "filings"
)]
pub async fn step_back(
    State(state): State<AppState>,
    caller: Authenticated,
    Path(id): Path<Uuid>,
) -> Result<Json<FilingResponse>, AppError> {
    let id = FilingId::from_uuid(id);
    visible_filing(&state, &caller, id)?;
    let filing = state
        .filings
        .try_update(&id, |filing| {
            match filing {
                Filing::GstReturn(w) => w.back().map(|_| ())?,
                Filing::IncomeTax(w) => w.back().map(|_| ())?,
            }
            Ok::<_, AppError>(filing.clone())
        })
        .ok_or_else(|| AppError::NotFound(format!("filing {id} not found")))??;
    Ok(Json(FilingResponse::new(filing, None)))
}
