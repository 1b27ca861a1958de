//! # Dashboard API
//!
//! Routes:
//! - GET /v1/dashboard — summary for the caller's role

use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use ce_core::{AssociateTask, Client, ClientId, Principal, Role};
use ce_state::Submission;

use crate::auth::Authenticated;
use crate::error::AppError;
use crate::routes::{count_by_status, ClientSummary};
use crate::state::AppState;

/// Role-specific dashboard summary.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Dashboard {
    Customer {
        active_client_id: Option<ClientId>,
        clients: Vec<ClientSummary>,
        submissions_by_status: BTreeMap<String, usize>,
    },
    Agent {
        username: String,
        assigned_clients: Vec<ClientSummary>,
        submissions_by_status: BTreeMap<String, usize>,
    },
    Corporate {
        username: String,
        clients: Vec<ClientSummary>,
        submissions_by_status: BTreeMap<String, usize>,
    },
    Admin {
        clients: usize,
        submissions: usize,
        submissions_by_status: BTreeMap<String, usize>,
        accounts_by_role: BTreeMap<String, usize>,
        filings_in_progress: usize,
    },
    Associate {
        pan: String,
        tasks: Vec<AssociateTask>,
        tasks_by_status: BTreeMap<String, usize>,
    },
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/dashboard", get(dashboard))
}

fn summaries(clients: &[Client]) -> Vec<ClientSummary> {
    clients.iter().map(ClientSummary::from).collect()
}

fn submissions_of(state: &AppState, clients: &[Client]) -> Vec<Submission> {
    clients
        .iter()
        .flat_map(|c| state.repo.submissions_for_client(c.id))
        .collect()
}

/// GET /v1/dashboard — Summary for the caller's role.
#[utoipa::path(
    get,
    path = "/v1/dashboard",
    responses(
        (status = 200, description = "Dashboard summary", body = Dashboard),
        (status = 401, description = "Not logged in", body = crate::error::ErrorBody),
    ),
    tag = "dashboard"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    caller: Authenticated,
) -> Result<Json<Dashboard>, AppError> {
    let dashboard = match caller.principal() {
        Principal::Customer {
            mobile_number,
            active_client_id,
        } => {
            let clients = state.repo.find_clients_by_mobile(mobile_number);
            Dashboard::Customer {
                active_client_id: *active_client_id,
                submissions_by_status: count_by_status(&submissions_of(&state, &clients)),
                clients: summaries(&clients),
            }
        }
        Principal::Agent { username } => {
            let clients = state.repo.clients_for_agent(username.as_str());
            Dashboard::Agent {
                username: username.to_string(),
                submissions_by_status: count_by_status(&submissions_of(&state, &clients)),
                assigned_clients: summaries(&clients),
            }
        }
        Principal::Corporate { username } => {
            let clients = state
                .repo
                .clients_created_by(Role::Corporate, username.as_str());
            Dashboard::Corporate {
                username: username.to_string(),
                submissions_by_status: count_by_status(&submissions_of(&state, &clients)),
                clients: summaries(&clients),
            }
        }
        Principal::Admin { .. } => {
            let submissions = state.repo.list_submissions(None);
            Dashboard::Admin {
                clients: state.repo.list_clients().len(),
                submissions: submissions.len(),
                submissions_by_status: count_by_status(&submissions),
                accounts_by_role: state
                    .repo
                    .accounts()
                    .count_by_role()
                    .into_iter()
                    .map(|(role, n)| (role.as_str().to_string(), n))
                    .collect(),
                filings_in_progress: state
                    .filings
                    .list()
                    .iter()
                    .filter(|f| !f.is_complete())
                    .count(),
            }
        }
        Principal::Associate { pan } => {
            let tasks = state.repo.tasks_for_associate(pan);
            let mut tasks_by_status = BTreeMap::new();
            for task in &tasks {
                *tasks_by_status
                    .entry(task.status.as_str().to_string())
                    .or_insert(0) += 1;
            }
            Dashboard::Associate {
                pan: pan.to_string(),
                tasks,
                tasks_by_status,
            }
        }
    };
    Ok(Json(dashboard))
}
