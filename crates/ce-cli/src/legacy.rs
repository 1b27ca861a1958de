//! # Legacy Export CLI
//!
//! Works on the JSON export of the old browser build (`clients` and
//! `charteredease_submissions` arrays).
//!
//! ```bash
//! # Summarize what would import and what would be dropped:
//! ce legacy inspect export.json
//!
//! # Write validated domain records, failing if anything was dropped:
//! ce legacy convert export.json --output records.json --strict
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use ce_core::legacy::{self, ImportReport, LegacyExport, OrphanedSubmission, RejectedRecord};
use ce_core::Client;
use ce_state::Submission;

/// Decoded document size limit, matching the service default.
const DEFAULT_MAX_DOCUMENT_BYTES: usize = 5 * 1024 * 1024;

/// Exit code when `--strict` finds rejected or orphaned records.
const EXIT_UNCLEAN: u8 = 2;

/// Legacy subcommand arguments.
#[derive(Args, Debug)]
pub struct LegacyArgs {
    #[command(subcommand)]
    pub command: LegacyCommand,
}

/// Available legacy subcommands.
#[derive(Subcommand, Debug)]
pub enum LegacyCommand {
    /// Report counts, statuses, rejected records and orphaned submissions.
    Inspect {
        /// Path to the legacy export.
        input: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,

        /// Exit with code 2 if any record would be dropped.
        #[arg(long)]
        strict: bool,

        /// Largest decoded inline document accepted.
        #[arg(long, default_value_t = DEFAULT_MAX_DOCUMENT_BYTES)]
        max_document_bytes: usize,
    },

    /// Convert the export into validated client and submission records.
    Convert {
        /// Path to the legacy export.
        input: PathBuf,

        /// Where to write the converted records.
        #[arg(long, short)]
        output: PathBuf,

        /// Exit with code 2, writing nothing, if any record would be dropped.
        #[arg(long)]
        strict: bool,

        /// Largest decoded inline document accepted.
        #[arg(long, default_value_t = DEFAULT_MAX_DOCUMENT_BYTES)]
        max_document_bytes: usize,
    },
}

/// Summary printed by `inspect`.
#[derive(Debug, Serialize)]
pub struct Inspection {
    pub clients: usize,
    pub submissions: usize,
    /// Submission count per resolved status label.
    pub statuses: BTreeMap<String, usize>,
    /// Legacy labels that matched no status, with how often they occur.
    pub unknown_statuses: BTreeMap<String, usize>,
    pub rejected: Vec<RejectedRecord>,
    pub orphaned: Vec<OrphanedSubmission>,
}

/// Output of `convert`.
#[derive(Debug, Serialize)]
pub struct Converted {
    pub clients: Vec<Client>,
    pub submissions: Vec<Submission>,
    pub rejected: Vec<RejectedRecord>,
    pub orphaned: Vec<OrphanedSubmission>,
}

/// Execute the legacy subcommand.
pub fn run_legacy(args: &LegacyArgs) -> Result<u8> {
    match &args.command {
        LegacyCommand::Inspect {
            input,
            json,
            strict,
            max_document_bytes,
        } => {
            let inspection = inspect(&load(input, *max_document_bytes)?);
            if *json {
                let text = serde_json::to_string_pretty(&inspection)
                    .context("failed to serialize inspection report")?;
                println!("{text}");
            } else {
                print_inspection(&inspection);
            }
            let clean = inspection.rejected.is_empty() && inspection.orphaned.is_empty();
            Ok(if *strict && !clean { EXIT_UNCLEAN } else { 0 })
        }
        LegacyCommand::Convert {
            input,
            output,
            strict,
            max_document_bytes,
        } => {
            let report = load(input, *max_document_bytes)?;
            if *strict && !report.is_clean() {
                tracing::error!(
                    rejected = report.rejected.len(),
                    orphaned = report.orphaned.len(),
                    "export has records that would be dropped, nothing written"
                );
                return Ok(EXIT_UNCLEAN);
            }
            let converted = convert(report);
            write_converted(&converted, output)?;
            println!(
                "wrote {} clients and {} submissions to {}",
                converted.clients.len(),
                converted.submissions.len(),
                output.display()
            );
            Ok(0)
        }
    }
}

/// Read, parse and import the export at `path`.
pub fn load(path: &Path, max_document_bytes: usize) -> Result<ImportReport> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read legacy export: {}", path.display()))?;
    let export = LegacyExport::from_json(&text)
        .with_context(|| format!("not a legacy export: {}", path.display()))?;
    tracing::debug!(
        clients = export.clients.len(),
        submissions = export.submissions.len(),
        "legacy export parsed"
    );
    Ok(legacy::import(&export, max_document_bytes))
}

/// Summarize an import report.
pub fn inspect(report: &ImportReport) -> Inspection {
    let mut statuses = BTreeMap::new();
    let mut unknown_statuses = BTreeMap::new();
    for imported in &report.submissions {
        let (submission, error) = Submission::from_import(imported.clone());
        if error.is_some() {
            *unknown_statuses
                .entry(imported.status_label.clone())
                .or_insert(0) += 1;
        }
        *statuses.entry(submission.status.to_string()).or_insert(0) += 1;
    }
    Inspection {
        clients: report.clients.len(),
        submissions: report.submissions.len(),
        statuses,
        unknown_statuses,
        rejected: report.rejected.clone(),
        orphaned: report.orphaned.clone(),
    }
}

/// Turn an import report into domain records. Unknown status labels fall
/// back to the service's initial status.
pub fn convert(report: ImportReport) -> Converted {
    let submissions = report
        .submissions
        .into_iter()
        .map(|imported| {
            let legacy_id = imported.legacy_id.clone();
            let (submission, error) = Submission::from_import(imported);
            if let Some(e) = error {
                tracing::warn!(?legacy_id, error = %e, fallback = %submission.status, "status label not recognised");
            }
            submission
        })
        .collect();
    Converted {
        clients: report.clients,
        submissions,
        rejected: report.rejected,
        orphaned: report.orphaned,
    }
}

fn write_converted(converted: &Converted, output: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(converted).context("failed to serialize records")?;
    std::fs::write(output, json)
        .with_context(|| format!("failed to write output: {}", output.display()))
}

fn print_inspection(inspection: &Inspection) {
    println!("clients:     {}", inspection.clients);
    println!("submissions: {}", inspection.submissions);
    for (status, count) in &inspection.statuses {
        println!("  {status:<32} {count}");
    }
    if !inspection.unknown_statuses.is_empty() {
        println!();
        println!("unrecognised status labels:");
        for (label, count) in &inspection.unknown_statuses {
            println!("  {label:?} x{count}");
        }
    }
    if !inspection.rejected.is_empty() {
        println!();
        println!("rejected: {}", inspection.rejected.len());
        for r in &inspection.rejected {
            let id = r.legacy_id.as_deref().unwrap_or("-");
            println!("  {:?}[{}] id={id}: {}", r.collection, r.index, r.reason);
        }
    }
    if !inspection.orphaned.is_empty() {
        println!();
        println!("orphaned submissions: {}", inspection.orphaned.len());
        for o in &inspection.orphaned {
            let id = o.legacy_id.as_deref().unwrap_or("-");
            println!("  [{}] id={id} clientId={}", o.index, o.legacy_client_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXPORT: &str = r#"{
        "clients": [
            {"id": 1, "name": "Asha Traders", "mobileNumber": "9999999999",
             "email": "asha@example.in", "entityType": "Proprietorship"},
            {"id": 2, "name": "Bad Mobile", "mobileNumber": "99999",
             "email": "bad@example.in"}
        ],
        "charteredease_submissions": [
            {"id": 10, "clientId": 1, "service": "GST Return Filing",
             "status": "Nil Return – Under Processing", "extractedData": {}},
            {"id": 11, "clientId": 1, "service": "GST Registration",
             "status": "Awaiting Courier", "extractedData": {}},
            {"id": 12, "clientId": 99, "service": "GST Return Filing"}
        ]
    }"#;

    fn export_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn inspect_counts_and_flags() {
        let file = export_file(EXPORT);
        let inspection = inspect(&load(file.path(), 1024).unwrap());
        assert_eq!(inspection.clients, 1);
        assert_eq!(inspection.submissions, 2);
        assert_eq!(inspection.rejected.len(), 1);
        assert_eq!(inspection.orphaned.len(), 1);
        assert_eq!(inspection.unknown_statuses.get("Awaiting Courier"), Some(&1));
        assert_eq!(
            inspection.statuses.get("Nil Return – Under Processing"),
            Some(&1)
        );
    }

    #[test]
    fn convert_writes_domain_records() {
        let input = export_file(EXPORT);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("records.json");
        let args = LegacyArgs {
            command: LegacyCommand::Convert {
                input: input.path().to_path_buf(),
                output: output.clone(),
                strict: false,
                max_document_bytes: 1024,
            },
        };
        assert_eq!(run_legacy(&args).unwrap(), 0);

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["clients"].as_array().unwrap().len(), 1);
        assert_eq!(written["submissions"].as_array().unwrap().len(), 2);
        assert_eq!(written["submissions"][1]["status"], "Processing");
        assert_eq!(written["rejected"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn strict_convert_writes_nothing() {
        let input = export_file(EXPORT);
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("records.json");
        let args = LegacyArgs {
            command: LegacyCommand::Convert {
                input: input.path().to_path_buf(),
                output: output.clone(),
                strict: true,
                max_document_bytes: 1024,
            },
        };
        assert_eq!(run_legacy(&args).unwrap(), EXIT_UNCLEAN);
        assert!(!output.exists());
    }

    #[test]
    fn missing_file_has_context() {
        let err = load(Path::new("/nonexistent/export.json"), 1024).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read legacy export"));
    }

    #[test]
    fn malformed_json_has_context() {
        let file = export_file("not json");
        let err = load(file.path(), 1024).unwrap_err();
        assert!(err.to_string().contains("not a legacy export"));
    }
}
