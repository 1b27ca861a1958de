//! # Legacy Seed
//!
//! Loads a legacy browser-storage export named by `CE_SEED_FILE` into the
//! repository at startup. Rejected and orphaned records are logged and
//! skipped; the rest import in one commit.

use std::path::Path;

use thiserror::Error;

use ce_core::legacy::{self, LegacyExport};
use ce_state::Submission;

use crate::repository::{RepoError, Repository};

#[derive(Error, Debug)]
pub enum SeedError {
    #[error("cannot read seed file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("seed file {path} is not a legacy export: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// What a seed run stored and skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub clients: usize,
    pub submissions: usize,
    pub rejected: usize,
    pub orphaned: usize,
}

/// Read, validate and store the export at `path`.
pub async fn seed_from_file(
    repo: &Repository,
    path: &Path,
    max_document_bytes: usize,
) -> Result<SeedSummary, SeedError> {
    let display = path.display().to_string();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Read {
            path: display.clone(),
            source,
        })?;
    let export = LegacyExport::from_json(&text).map_err(|source| SeedError::Parse {
        path: display,
        source,
    })?;
    seed(repo, &export, max_document_bytes).await
}

/// Validate and store an already-parsed export.
pub async fn seed(
    repo: &Repository,
    export: &LegacyExport,
    max_document_bytes: usize,
) -> Result<SeedSummary, SeedError> {
    let report = legacy::import(export, max_document_bytes);

    for rejected in &report.rejected {
        tracing::warn!(
            collection = ?rejected.collection,
            index = rejected.index,
            legacy_id = ?rejected.legacy_id,
            reason = %rejected.reason,
            "legacy record rejected"
        );
    }
    for orphan in &report.orphaned {
        tracing::warn!(
            index = orphan.index,
            legacy_id = ?orphan.legacy_id,
            legacy_client_id = %orphan.legacy_client_id,
            "legacy submission references an unknown client"
        );
    }

    let summary = SeedSummary {
        clients: report.clients.len(),
        submissions: report.submissions.len(),
        rejected: report.rejected.len(),
        orphaned: report.orphaned.len(),
    };
    let submissions: Vec<Submission> = report
        .submissions
        .into_iter()
        .map(|imported| {
            let legacy_id = imported.legacy_id.clone();
            let (submission, error) = Submission::from_import(imported);
            if let Some(e) = error {
                tracing::warn!(
                    ?legacy_id,
                    error = %e,
                    fallback = %submission.status,
                    "legacy status label not recognised"
                );
            }
            submission
        })
        .collect();

    let mut clients = report.clients;
    for client in &mut clients {
        let unknown_agent = client
            .assigned_agent
            .as_deref()
            .filter(|agent| !repo.accounts().is_active_agent(agent))
            .map(str::to_string);
        if let Some(agent) = unknown_agent {
            tracing::warn!(client_id = %client.id, %agent, "legacy agent has no active account, assignment dropped");
            client.assigned_agent = None;
        }
    }

    repo.import(clients, submissions).await?;
    tracing::info!(
        clients = summary.clients,
        submissions = summary.submissions,
        rejected = summary.rejected,
        orphaned = summary.orphaned,
        "legacy seed loaded"
    );
    Ok(summary)
}
