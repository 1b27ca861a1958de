//! Types shared by the filing wizards.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use ce_core::{
    ClientId, Document, DocumentKind, FilingId, GstCredentials, ItrCredentials, ServiceKind,
    ValidationError,
};

use crate::status::SubmissionStatus;

/// Errors from wizard actions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    /// The action belongs to a different step.
    #[error("action requires step {expected}, wizard is at {actual}")]
    WrongStep {
        /// Step the action needs.
        expected: String,
        /// Step the wizard is at.
        actual: String,
    },

    /// `back()` from a step with no predecessor.
    #[error("no previous step from {0}")]
    NoPreviousStep(String),

    /// Required uploads are missing.
    #[error("missing required documents: {0:?}")]
    MissingDocuments(Vec<DocumentKind>),

    /// This wizard does not accept that kind of document.
    #[error("document kind {0:?} is not accepted at this step")]
    UnsupportedDocument(DocumentKind),

    #[error("invalid return period: {0}")]
    InvalidPeriod(String),

    #[error("invalid assessment year: {0}")]
    InvalidAssessmentYear(String),

    /// A required form field was blank.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field failed domain validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// What a completed wizard produces: the data for one profile and one
/// submission, plus any portal credentials to store on the client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilingOutcome {
    pub filing_id: FilingId,
    pub client_id: ClientId,
    pub service: ServiceKind,
    pub status: SubmissionStatus,
    pub extracted_data: Value,
    pub documents: Vec<Document>,
    pub gst_credentials: Option<GstCredentials>,
    pub itr_credentials: Option<ItrCredentials>,
}
