//! # GST Return Wizard
//!
//! ```text
//! Init ──▶ Login ──▶ Dashboard ──▶ TypeSelection ──┬──▶ Upload ──────────┬──▶ Processing
//!                                                  └──▶ NilConfirmation ─┘
//! ```
//!
//! `back()` steps to the single predecessor shown above. `Init` and
//! `Processing` have none. A regular return needs both the sales and the
//! purchase register before it can be submitted; a nil return carries no
//! documents.

use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use ce_core::{ClientId, Document, DocumentKind, FilingId, GstCredentials, Gstin, ServiceKind, Timestamp};

use crate::status::SubmissionStatus;
use crate::wizard::{FilingOutcome, WizardError};

/// First year GST returns can be filed for (GST went live July 2017).
const FIRST_GST_YEAR: u16 = 2017;

/// Steps of the GST return wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GstStep {
    Init,
    Login,
    Dashboard,
    TypeSelection,
    Upload,
    NilConfirmation,
    Processing,
}

impl GstStep {
    /// The step `back()` returns to, if any.
    pub fn predecessor(&self) -> Option<GstStep> {
        match self {
            Self::Login => Some(Self::Init),
            Self::Dashboard => Some(Self::Login),
            Self::TypeSelection => Some(Self::Dashboard),
            Self::Upload | Self::NilConfirmation => Some(Self::TypeSelection),
            Self::Init | Self::Processing => None,
        }
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Login => "login",
            Self::Dashboard => "dashboard",
            Self::TypeSelection => "type_selection",
            Self::Upload => "upload",
            Self::NilConfirmation => "nil_confirmation",
            Self::Processing => "processing",
        }
    }
}

impl std::fmt::Display for GstStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Nil or regular return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    /// No outward or inward supplies in the period.
    Nil,
    /// Regular return with sales and purchase registers.
    Regular,
}

/// A monthly GST return period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub struct ReturnPeriod {
    pub month: u8,
    pub year: u16,
}

impl ReturnPeriod {
    /// Validate a month/year pair.
    pub fn new(month: u8, year: u16) -> Result<Self, WizardError> {
        let valid = (1..=12).contains(&month)
            && (FIRST_GST_YEAR..=2100).contains(&year)
            && !(year == FIRST_GST_YEAR && month < 7);
        if !valid {
            return Err(WizardError::InvalidPeriod(format!("{month:02}-{year}")));
        }
        Ok(Self { month, year })
    }
}

impl std::fmt::Display for ReturnPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}-{}", self.month, self.year)
    }
}

/// A GST return in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GstReturnWizard {
    pub id: FilingId,
    pub client_id: ClientId,
    pub step: GstStep,
    pub credentials: Option<GstCredentials>,
    pub period: Option<ReturnPeriod>,
    pub return_type: Option<ReturnType>,
    pub sales_register: Option<Document>,
    pub purchase_register: Option<Document>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl GstReturnWizard {
    /// Start a wizard for `client_id` at `Init`.
    pub fn new(client_id: ClientId) -> Self {
        let now = Timestamp::now();
        Self {
            id: FilingId::new(),
            client_id,
            step: GstStep::Init,
            credentials: None,
            period: None,
            return_type: None,
            sales_register: None,
            purchase_register: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Init → Login.
    pub fn begin(&mut self) -> Result<(), WizardError> {
        self.require_step(GstStep::Init)?;
        self.go(GstStep::Login);
        Ok(())
    }

    /// Login → Dashboard, capturing the portal credentials.
    pub fn portal_login(&mut self, gstin: &str, portal_username: &str) -> Result<(), WizardError> {
        self.require_step(GstStep::Login)?;
        let gstin = Gstin::new(gstin)?;
        let portal_username = portal_username.trim();
        if portal_username.is_empty() {
            return Err(WizardError::MissingField("portal_username"));
        }
        self.credentials = Some(GstCredentials {
            gstin,
            portal_username: portal_username.to_string(),
        });
        self.go(GstStep::Dashboard);
        Ok(())
    }

    /// Dashboard → TypeSelection.
    pub fn select_period(&mut self, period: ReturnPeriod) -> Result<(), WizardError> {
        self.require_step(GstStep::Dashboard)?;
        self.period = Some(period);
        self.go(GstStep::TypeSelection);
        Ok(())
    }

    /// TypeSelection → NilConfirmation (nil) or Upload (regular).
    pub fn choose_type(&mut self, return_type: ReturnType) -> Result<(), WizardError> {
        self.require_step(GstStep::TypeSelection)?;
        self.return_type = Some(return_type);
        self.go(match return_type {
            ReturnType::Nil => GstStep::NilConfirmation,
            ReturnType::Regular => GstStep::Upload,
        });
        Ok(())
    }

    /// Attach the sales or purchase register while in Upload. A second
    /// upload of the same kind replaces the first.
    pub fn attach(&mut self, document: Document) -> Result<(), WizardError> {
        self.require_step(GstStep::Upload)?;
        match document.kind {
            DocumentKind::SalesRegister => self.sales_register = Some(document),
            DocumentKind::PurchaseRegister => self.purchase_register = Some(document),
            other => return Err(WizardError::UnsupportedDocument(other)),
        }
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Kinds still missing before a regular return can be submitted.
    pub fn missing_documents(&self) -> Vec<DocumentKind> {
        let mut missing = Vec::new();
        if self.sales_register.is_none() {
            missing.push(DocumentKind::SalesRegister);
        }
        if self.purchase_register.is_none() {
            missing.push(DocumentKind::PurchaseRegister);
        }
        missing
    }

    /// Upload → Processing. Requires both registers.
    pub fn submit(&mut self) -> Result<FilingOutcome, WizardError> {
        self.require_step(GstStep::Upload)?;
        let missing = self.missing_documents();
        if !missing.is_empty() {
            return Err(WizardError::MissingDocuments(missing));
        }
        let documents: Vec<Document> = self
            .sales_register
            .iter()
            .chain(self.purchase_register.iter())
            .cloned()
            .collect();
        self.go(GstStep::Processing);
        Ok(self.outcome(SubmissionStatus::Processing, documents))
    }

    /// NilConfirmation → Processing.
    pub fn confirm_nil(&mut self) -> Result<FilingOutcome, WizardError> {
        self.require_step(GstStep::NilConfirmation)?;
        self.go(GstStep::Processing);
        Ok(self.outcome(SubmissionStatus::NilReturnUnderProcessing, Vec::new()))
    }

    /// Step back to the predecessor of the current step.
    pub fn back(&mut self) -> Result<GstStep, WizardError> {
        let prev = self
            .step
            .predecessor()
            .ok_or_else(|| WizardError::NoPreviousStep(self.step.to_string()))?;
        self.go(prev);
        Ok(prev)
    }

    /// Whether the wizard has finished.
    pub fn is_complete(&self) -> bool {
        self.step == GstStep::Processing
    }

    fn outcome(&self, status: SubmissionStatus, documents: Vec<Document>) -> FilingOutcome {
        let extracted_data = json!({
            "gstin": self.credentials.as_ref().map(|c| c.gstin.as_str()),
            "portal_username": self.credentials.as_ref().map(|c| c.portal_username.as_str()),
            "period": self.period.map(|p| p.to_string()),
            "return_type": self.return_type,
        });
        FilingOutcome {
            filing_id: self.id,
            client_id: self.client_id,
            service: ServiceKind::GstReturn,
            status,
            extracted_data,
            documents,
            gst_credentials: self.credentials.clone(),
            itr_credentials: None,
        }
    }

    fn require_step(&self, expected: GstStep) -> Result<(), WizardError> {
        if self.step != expected {
            return Err(WizardError::WrongStep {
                expected: expected.to_string(),
                actual: self.step.to_string(),
            });
        }
        Ok(())
    }

    fn go(&mut self, to: GstStep) {
        self.step = to;
        self.updated_at = Timestamp::now();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &str = "data:application/pdf;base64,JVBERi0xLjQ=";

    fn doc(kind: DocumentKind) -> Document {
        Document::new(kind, "register.pdf", PDF, 1024).unwrap()
    }

    fn at_type_selection() -> GstReturnWizard {
        let mut w = GstReturnWizard::new(ClientId::new());
        w.begin().unwrap();
        w.portal_login("27ABCDE1234F1Z5", "sharma_gst").unwrap();
        w.select_period(ReturnPeriod::new(3, 2024).unwrap()).unwrap();
        assert_eq!(w.step, GstStep::TypeSelection);
        w
    }

    #[test]
    fn test_nil_path_has_no_documents() {
        let mut w = at_type_selection();
        w.choose_type(ReturnType::Nil).unwrap();
        assert_eq!(w.step, GstStep::NilConfirmation);
        let outcome = w.confirm_nil().unwrap();
        assert_eq!(outcome.status, SubmissionStatus::NilReturnUnderProcessing);
        assert_eq!(outcome.status.label(), "Nil Return – Under Processing");
        assert!(outcome.documents.is_empty());
        assert_eq!(outcome.extracted_data["return_type"], "nil");
        assert_eq!(outcome.extracted_data["period"], "03-2024");
        assert!(w.is_complete());
    }

    #[test]
    fn test_regular_path_requires_both_registers() {
        let mut w = at_type_selection();
        w.choose_type(ReturnType::Regular).unwrap();
        assert_eq!(
            w.submit().unwrap_err(),
            WizardError::MissingDocuments(vec![
                DocumentKind::SalesRegister,
                DocumentKind::PurchaseRegister
            ])
        );
        w.attach(doc(DocumentKind::SalesRegister)).unwrap();
        assert_eq!(
            w.submit().unwrap_err(),
            WizardError::MissingDocuments(vec![DocumentKind::PurchaseRegister])
        );
        w.attach(doc(DocumentKind::PurchaseRegister)).unwrap();
        let outcome = w.submit().unwrap();
        assert_eq!(outcome.status, SubmissionStatus::Processing);
        assert_eq!(outcome.documents.len(), 2);
        assert_eq!(
            outcome.gst_credentials.unwrap().gstin.as_str(),
            "27ABCDE1234F1Z5"
        );
    }

    #[test]
    fn test_attach_rejects_other_kinds() {
        let mut w = at_type_selection();
        w.choose_type(ReturnType::Regular).unwrap();
        assert_eq!(
            w.attach(doc(DocumentKind::Form16)).unwrap_err(),
            WizardError::UnsupportedDocument(DocumentKind::Form16)
        );
    }

    #[test]
    fn test_back_predecessors() {
        let mut w = at_type_selection();
        w.choose_type(ReturnType::Regular).unwrap();
        assert_eq!(w.back().unwrap(), GstStep::TypeSelection);
        w.choose_type(ReturnType::Nil).unwrap();
        assert_eq!(w.back().unwrap(), GstStep::TypeSelection);
        assert_eq!(w.back().unwrap(), GstStep::Dashboard);
        assert_eq!(w.back().unwrap(), GstStep::Login);
        assert_eq!(w.back().unwrap(), GstStep::Init);
        assert!(matches!(w.back(), Err(WizardError::NoPreviousStep(_))));
    }

    #[test]
    fn test_no_back_from_processing() {
        let mut w = at_type_selection();
        w.choose_type(ReturnType::Nil).unwrap();
        w.confirm_nil().unwrap();
        assert!(w.back().is_err());
    }

    #[test]
    fn test_steps_out_of_order_rejected() {
        let mut w = GstReturnWizard::new(ClientId::new());
        assert!(matches!(
            w.portal_login("27ABCDE1234F1Z5", "u"),
            Err(WizardError::WrongStep { .. })
        ));
        w.begin().unwrap();
        assert!(w.portal_login("BADGSTIN", "u").is_err());
        assert_eq!(w.step, GstStep::Login);
    }

    #[test]
    fn test_return_period_bounds() {
        assert!(ReturnPeriod::new(7, 2017).is_ok());
        assert!(ReturnPeriod::new(6, 2017).is_err());
        assert!(ReturnPeriod::new(13, 2024).is_err());
        assert!(ReturnPeriod::new(0, 2024).is_err());
    }
}
