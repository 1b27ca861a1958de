//! # Submission Record
//!
//! One submission per service application. The status moves only along the
//! edges in [`SubmissionStatus::successors`], and every move is appended to
//! the submission's transition log.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

use ce_core::legacy::ImportedSubmission;
use ce_core::{ClientId, Document, ProfileId, ServiceKind, SubmissionId, Timestamp};

use crate::status::{StatusError, SubmissionStatus};

/// Errors from submission status changes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    /// The requested edge is not in the lifecycle.
    #[error("invalid submission transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: SubmissionStatus,
        /// Requested status.
        to: SubmissionStatus,
    },

    /// The submission is already filed or completed.
    #[error("submission {id} is {status} and cannot change status")]
    Terminal {
        /// The submission identifier.
        id: SubmissionId,
        /// Its terminal status.
        status: SubmissionStatus,
    },

    /// A reason is required for every status change.
    #[error("a reason is required to change submission status")]
    MissingReason,
}

/// Record of one status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatusTransition {
    pub from: SubmissionStatus,
    pub to: SubmissionStatus,
    pub at: Timestamp,
    pub reason: String,
    /// Subject of the principal who made the change.
    pub actor: String,
}

/// A service application and its processing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Submission {
    pub id: SubmissionId,
    pub client_id: ClientId,
    /// The client profile created by the same application.
    pub profile_id: ProfileId,
    pub service: ServiceKind,
    #[schema(value_type = Object)]
    pub extracted_data: Value,
    #[serde(default)]
    pub documents: Vec<Document>,
    pub status: SubmissionStatus,
    /// Ordered log of status changes.
    #[serde(default)]
    pub transitions: Vec<StatusTransition>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Submission {
    /// Create a submission in `status`.
    pub fn new(
        client_id: ClientId,
        profile_id: ProfileId,
        service: ServiceKind,
        extracted_data: Value,
        documents: Vec<Document>,
        status: SubmissionStatus,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: SubmissionId::new(),
            client_id,
            profile_id,
            service,
            extracted_data,
            documents,
            status,
            transitions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `to`, recording who did it and why.
    pub fn transition(
        &mut self,
        to: SubmissionStatus,
        reason: &str,
        actor: &str,
    ) -> Result<&StatusTransition, SubmissionError> {
        if self.status.is_terminal() {
            return Err(SubmissionError::Terminal {
                id: self.id,
                status: self.status,
            });
        }
        if !self.status.can_transition_to(to) {
            return Err(SubmissionError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(SubmissionError::MissingReason);
        }
        let now = Timestamp::now();
        self.transitions.push(StatusTransition {
            from: self.status,
            to,
            at: now,
            reason: reason.to_string(),
            actor: actor.to_string(),
        });
        self.status = to;
        self.updated_at = now;
        Ok(&self.transitions[self.transitions.len() - 1])
    }

    /// Whether the submission can still change status.
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Build a submission from a legacy import record.
    ///
    /// The free-text status label is mapped onto the lifecycle. A blank or
    /// unrecognised label falls back to the service's initial status, and
    /// the parse error is returned alongside so the caller can report it.
    pub fn from_import(imported: ImportedSubmission) -> (Self, Option<StatusError>) {
        let (status, error) = match imported.status_label.parse::<SubmissionStatus>() {
            Ok(status) => (status, None),
            Err(_) if imported.status_label.is_empty() => {
                (SubmissionStatus::initial_for(imported.service), None)
            }
            Err(e) => (SubmissionStatus::initial_for(imported.service), Some(e)),
        };
        let submission = Self {
            id: imported.id,
            client_id: imported.client_id,
            profile_id: imported.profile_id,
            service: imported.service,
            extracted_data: imported.extracted_data,
            documents: imported.documents,
            status,
            transitions: Vec::new(),
            created_at: imported.created_at,
            updated_at: imported.created_at,
        };
        (submission, error)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_submission(status: SubmissionStatus) -> Submission {
        Submission::new(
            ClientId::new(),
            ProfileId::new(),
            ServiceKind::IncomeTaxReturn,
            json!({"assessment_year": "2024-25"}),
            Vec::new(),
            status,
        )
    }

    #[test]
    fn test_processing_to_filed() {
        let mut s = make_submission(SubmissionStatus::Processing);
        s.transition(SubmissionStatus::UnderReview, "Docs verified", "partner1")
            .unwrap();
        s.transition(SubmissionStatus::Filed, "Acknowledged by portal", "partner1")
            .unwrap();
        assert_eq!(s.status, SubmissionStatus::Filed);
        assert_eq!(s.transitions.len(), 2);
        assert_eq!(s.transitions[0].from, SubmissionStatus::Processing);
        assert_eq!(s.transitions[1].actor, "partner1");
        assert!(!s.is_open());
    }

    fn imported(service: ServiceKind, label: &str) -> ImportedSubmission {
        ImportedSubmission {
            id: SubmissionId::new(),
            legacy_id: Some("17".into()),
            client_id: ClientId::new(),
            profile_id: ProfileId::new(),
            service,
            extracted_data: json!({}),
            documents: Vec::new(),
            status_label: label.to_string(),
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn test_from_import_maps_known_label() {
        let (s, err) = Submission::from_import(imported(
            ServiceKind::GstReturn,
            "Nil Return - Under Processing",
        ));
        assert_eq!(s.status, SubmissionStatus::NilReturnUnderProcessing);
        assert!(err.is_none());
        assert_eq!(s.created_at, s.updated_at);
    }

    #[test]
    fn test_from_import_unknown_label_falls_back() {
        let (s, err) = Submission::from_import(imported(ServiceKind::Consultation, "Awaiting call"));
        assert_eq!(s.status, SubmissionStatus::Scheduled);
        assert!(matches!(err, Some(StatusError::Unknown(_))));

        let (s, err) = Submission::from_import(imported(ServiceKind::GstRegistration, ""));
        assert_eq!(s.status, SubmissionStatus::Processing);
        assert!(err.is_none());
    }

    #[test]
    fn test_terminal_rejects_everything() {
        let mut s = make_submission(SubmissionStatus::Processing);
        s.transition(SubmissionStatus::Completed, "done", "admin").unwrap();
        let err = s
            .transition(SubmissionStatus::Processing, "again", "admin")
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Terminal { .. }));
    }

    #[test]
    fn test_invalid_edge_rejected() {
        let mut s = make_submission(SubmissionStatus::Scheduled);
        let err = s
            .transition(SubmissionStatus::Filed, "skip", "admin")
            .unwrap_err();
        assert_eq!(
            err,
            SubmissionError::InvalidTransition {
                from: SubmissionStatus::Scheduled,
                to: SubmissionStatus::Filed,
            }
        );
        assert!(s.transitions.is_empty());
    }

    #[test]
    fn test_rejected_can_be_resubmitted() {
        let mut s = make_submission(SubmissionStatus::Processing);
        s.transition(SubmissionStatus::Rejected, "Form 16 unreadable", "partner1")
            .unwrap();
        s.transition(SubmissionStatus::Processing, "New upload", "partner1")
            .unwrap();
        assert_eq!(s.status, SubmissionStatus::Processing);
    }

    #[test]
    fn test_reason_required() {
        let mut s = make_submission(SubmissionStatus::Processing);
        assert_eq!(
            s.transition(SubmissionStatus::Filed, "  ", "admin"),
            Err(SubmissionError::MissingReason)
        );
    }

    #[test]
    fn test_serialization_uses_labels() {
        let s = make_submission(SubmissionStatus::NilReturnUnderProcessing);
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["status"], "Nil Return – Under Processing");
        let back: Submission = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }
}
