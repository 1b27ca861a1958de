//! # API Route Modules
//!
//! - `auth` — customer OTP login, staff password login, logout, session
//!   lookup and the customer entity switcher.
//! - `navigation` — page dispatch for a set of role sessions.
//! - `clients` — client registration, lookup, credentials, agent
//!   assignment and service applications.
//! - `submissions` — submission lookup and status changes.
//! - `filings` — GST and income tax return wizards.
//! - `dashboard` — role-specific summaries.
//! - `tasks` — associate tasks.
//! - `admin` — staff account management.

pub mod admin;
pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod filings;
pub mod navigation;
pub mod submissions;
pub mod tasks;

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use ce_core::{Client, ClientId, EntityType};
use ce_state::Submission;

use crate::access::{can_access, Resource};
use crate::auth::Authenticated;
use crate::error::AppError;
use crate::state::AppState;

/// Compact client view used in dashboards and task details.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ClientSummary {
    pub id: ClientId,
    pub name: String,
    pub entity_type: EntityType,
    /// Masked mobile number.
    pub mobile_number: String,
    pub assigned_agent: Option<String>,
    pub profiles: usize,
}

impl From<&Client> for ClientSummary {
    fn from(client: &Client) -> Self {
        Self {
            id: client.id,
            name: client.name.clone(),
            entity_type: client.entity_type,
            mobile_number: client.mobile_number.masked(),
            assigned_agent: client.assigned_agent.clone(),
            profiles: client.profiles.len(),
        }
    }
}

/// Load a client the caller may see. 404 if it does not exist, 403 if it
/// belongs to someone else.
pub(crate) fn visible_client(
    state: &AppState,
    caller: &Authenticated,
    id: ClientId,
) -> Result<Client, AppError> {
    let client = state
        .repo
        .get_client(id)
        .ok_or_else(|| AppError::NotFound(format!("client {id} not found")))?;
    if !can_access(caller.principal(), Resource::Client(&client)) {
        return Err(AppError::forbidden());
    }
    Ok(client)
}

/// Submission counts keyed by status label.
pub(crate) fn count_by_status<'a>(
    submissions: impl IntoIterator<Item = &'a Submission>,
) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for submission in submissions {
        *counts
            .entry(submission.status.label().to_string())
            .or_insert(0) += 1;
    }
    counts
}
