//! # Submission Status Lifecycle
//!
//! Every submission carries one of seven statuses. The labels serialize
//! exactly as shown to customers.
//!
//! ```text
//!  Scheduled ──▶ Processing ──▶ Under Review ──▶ Filed
//!      │             │    │           │
//!      │             │    └──────▶ Filed / Completed
//!      └──▶ Completed│
//!                    ▼
//!                 Rejected ──▶ Processing (resubmission)
//!
//!  Nil Return – Under Processing ──▶ Filed | Rejected
//! ```
//!
//! `Filed` and `Completed` are terminal.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use ce_core::ServiceKind;

/// Status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub enum SubmissionStatus {
    /// Appointment booked (consultations).
    Scheduled,
    /// Work in progress.
    Processing,
    /// GST nil return accepted for processing.
    #[serde(rename = "Nil Return – Under Processing")]
    NilReturnUnderProcessing,
    /// Waiting on a reviewer or the client.
    #[serde(rename = "Under Review")]
    UnderReview,
    /// Filed with the government portal (terminal).
    Filed,
    /// Service delivered (terminal).
    Completed,
    /// Sent back; may be resubmitted.
    Rejected,
}

/// Errors from status parsing and transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    /// Label matches no known status.
    #[error("unknown submission status: {0:?}")]
    Unknown(String),
}

impl SubmissionStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [SubmissionStatus; 7] = [
        Self::Scheduled,
        Self::Processing,
        Self::NilReturnUnderProcessing,
        Self::UnderReview,
        Self::Filed,
        Self::Completed,
        Self::Rejected,
    ];

    /// Display label (identical to the serialized form).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Scheduled => "Scheduled",
            Self::Processing => "Processing",
            Self::NilReturnUnderProcessing => "Nil Return – Under Processing",
            Self::UnderReview => "Under Review",
            Self::Filed => "Filed",
            Self::Completed => "Completed",
            Self::Rejected => "Rejected",
        }
    }

    /// Status a new submission for `service` starts in.
    ///
    /// GST nil returns start in [`Self::NilReturnUnderProcessing`]; the GST
    /// wizard sets that explicitly since the service alone does not say
    /// which path was taken.
    pub fn initial_for(service: ServiceKind) -> Self {
        if service.is_appointment() {
            Self::Scheduled
        } else {
            Self::Processing
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Filed | Self::Completed)
    }

    /// Statuses reachable in one step.
    pub fn successors(&self) -> &'static [SubmissionStatus] {
        use SubmissionStatus::*;
        match self {
            Scheduled => &[Processing, Completed, Rejected],
            Processing => &[UnderReview, Filed, Completed, Rejected],
            NilReturnUnderProcessing => &[Filed, Rejected],
            UnderReview => &[Filed, Completed, Rejected],
            Rejected => &[Processing],
            Filed | Completed => &[],
        }
    }

    /// Whether `self → to` is a legal transition.
    pub fn can_transition_to(&self, to: SubmissionStatus) -> bool {
        self.successors().contains(&to)
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for SubmissionStatus {
    type Err = StatusError;

    /// Parse a label leniently: case, spacing, underscores and any dash
    /// variant are ignored, so `"under_review"` and `"Nil Return - Under
    /// Processing"` both resolve.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        let status = match key.as_str() {
            "scheduled" => Self::Scheduled,
            "processing" | "inprogress" | "pending" | "submitted" => Self::Processing,
            "nilreturnunderprocessing" => Self::NilReturnUnderProcessing,
            "underreview" => Self::UnderReview,
            "filed" => Self::Filed,
            "completed" | "complete" => Self::Completed,
            "rejected" => Self::Rejected,
            _ => return Err(StatusError::Unknown(s.to_string())),
        };
        Ok(status)
    }
}
