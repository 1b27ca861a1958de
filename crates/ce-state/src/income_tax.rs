//! # Income Tax Return Wizard
//!
//! ```text
//! Init ──▶ Login ──▶ AssessmentYear ──▶ IncomeSources ──▶ Upload ──▶ Review ──▶ Processing
//! ```
//!
//! The documents required at `Upload` depend on the income sources picked:
//! salary needs Form 16, business income a bank statement, capital gains a
//! capital-gains statement. `review()` refuses to advance until all of them
//! are attached. Only those kinds are accepted, and re-selecting sources
//! drops uploads the new selection no longer needs.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

use ce_core::{ClientId, Document, DocumentKind, FilingId, ItrCredentials, Pan, ServiceKind, Timestamp};

use crate::status::SubmissionStatus;
use crate::wizard::{FilingOutcome, WizardError};

/// Steps of the income tax return wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ItrStep {
    Init,
    Login,
    AssessmentYear,
    IncomeSources,
    Upload,
    Review,
    Processing,
}

impl ItrStep {
    /// The step `back()` returns to, if any.
    pub fn predecessor(&self) -> Option<ItrStep> {
        match self {
            Self::Login => Some(Self::Init),
            Self::AssessmentYear => Some(Self::Login),
            Self::IncomeSources => Some(Self::AssessmentYear),
            Self::Upload => Some(Self::IncomeSources),
            Self::Review => Some(Self::Upload),
            Self::Init | Self::Processing => None,
        }
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Login => "login",
            Self::AssessmentYear => "assessment_year",
            Self::IncomeSources => "income_sources",
            Self::Upload => "upload",
            Self::Review => "review",
            Self::Processing => "processing",
        }
    }
}

impl std::fmt::Display for ItrStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heads of income.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IncomeSource {
    Salary,
    Business,
    CapitalGains,
    HouseProperty,
    Other,
}

impl IncomeSource {
    /// Document that must be uploaded for this source, if any.
    pub fn required_document(&self) -> Option<DocumentKind> {
        match self {
            Self::Salary => Some(DocumentKind::Form16),
            Self::Business => Some(DocumentKind::BankStatement),
            Self::CapitalGains => Some(DocumentKind::CapitalGainsStatement),
            Self::HouseProperty | Self::Other => None,
        }
    }
}

/// An Indian assessment year such as `2024-25`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(example = "2024-25")]
pub struct AssessmentYear(String);

impl AssessmentYear {
    /// Parse `YYYY-YY` where the second part is the following year.
    pub fn new(value: &str) -> Result<Self, WizardError> {
        let invalid = || WizardError::InvalidAssessmentYear(value.to_string());
        let (start, end) = value.trim().split_once('-').ok_or_else(invalid)?;
        if start.len() != 4 || end.len() != 2 {
            return Err(invalid());
        }
        let start: u16 = start.parse().map_err(|_| invalid())?;
        let end: u16 = end.parse().map_err(|_| invalid())?;
        if !(2000..=2100).contains(&start) || (start + 1) % 100 != end {
            return Err(invalid());
        }
        Ok(Self(format!("{start}-{end:02}")))
    }

    /// The `YYYY-YY` form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AssessmentYear {
    type Error = WizardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<AssessmentYear> for String {
    fn from(ay: AssessmentYear) -> Self {
        ay.0
    }
}

impl std::fmt::Display for AssessmentYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An income tax return in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeTaxWizard {
    pub id: FilingId,
    pub client_id: ClientId,
    pub step: ItrStep,
    pub pan: Option<Pan>,
    pub assessment_year: Option<AssessmentYear>,
    pub income_sources: BTreeSet<IncomeSource>,
    /// One document per kind; a later upload replaces an earlier one.
    pub documents: BTreeMap<String, Document>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl IncomeTaxWizard {
    /// Start a wizard for `client_id` at `Init`.
    pub fn new(client_id: ClientId) -> Self {
        let now = Timestamp::now();
        Self {
            id: FilingId::new(),
            client_id,
            step: ItrStep::Init,
            pan: None,
            assessment_year: None,
            income_sources: BTreeSet::new(),
            documents: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Init → Login.
    pub fn begin(&mut self) -> Result<(), WizardError> {
        self.require_step(ItrStep::Init)?;
        self.go(ItrStep::Login);
        Ok(())
    }

    /// Login → AssessmentYear. The PAN doubles as the portal user id.
    pub fn portal_login(&mut self, pan: &str) -> Result<(), WizardError> {
        self.require_step(ItrStep::Login)?;
        self.pan = Some(Pan::new(pan)?);
        self.go(ItrStep::AssessmentYear);
        Ok(())
    }

    /// AssessmentYear → IncomeSources.
    pub fn select_assessment_year(&mut self, year: AssessmentYear) -> Result<(), WizardError> {
        self.require_step(ItrStep::AssessmentYear)?;
        self.assessment_year = Some(year);
        self.go(ItrStep::IncomeSources);
        Ok(())
    }

    /// IncomeSources → Upload. At least one source is required.
    pub fn select_income_sources(
        &mut self,
        sources: BTreeSet<IncomeSource>,
    ) -> Result<(), WizardError> {
        self.require_step(ItrStep::IncomeSources)?;
        if sources.is_empty() {
            return Err(WizardError::MissingField("income_sources"));
        }
        self.income_sources = sources;
        let required: Vec<String> = self.required_documents().into_iter().map(kind_key).collect();
        self.documents.retain(|key, _| required.contains(key));
        self.go(ItrStep::Upload);
        Ok(())
    }

    /// Attach a document while in Upload. Only kinds the chosen income
    /// sources require are accepted.
    pub fn attach(&mut self, document: Document) -> Result<(), WizardError> {
        self.require_step(ItrStep::Upload)?;
        if !self.required_documents().contains(&document.kind) {
            return Err(WizardError::UnsupportedDocument(document.kind));
        }
        let key = kind_key(document.kind);
        self.documents.insert(key, document);
        self.updated_at = Timestamp::now();
        Ok(())
    }

    /// Documents the chosen income sources require.
    pub fn required_documents(&self) -> Vec<DocumentKind> {
        let mut kinds: Vec<DocumentKind> = Vec::new();
        for kind in self
            .income_sources
            .iter()
            .filter_map(IncomeSource::required_document)
        {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    /// Required documents not yet attached.
    pub fn missing_documents(&self) -> Vec<DocumentKind> {
        self.required_documents()
            .into_iter()
            .filter(|kind| !self.documents.contains_key(&kind_key(*kind)))
            .collect()
    }

    /// Upload → Review, once every required document is attached.
    pub fn review(&mut self) -> Result<(), WizardError> {
        self.require_step(ItrStep::Upload)?;
        let missing = self.missing_documents();
        if !missing.is_empty() {
            return Err(WizardError::MissingDocuments(missing));
        }
        self.go(ItrStep::Review);
        Ok(())
    }

    /// Review → Processing.
    pub fn submit(&mut self) -> Result<FilingOutcome, WizardError> {
        self.require_step(ItrStep::Review)?;
        self.go(ItrStep::Processing);
        let extracted_data = json!({
            "pan": self.pan.as_ref().map(Pan::as_str),
            "assessment_year": self.assessment_year.as_ref().map(AssessmentYear::as_str),
            "income_sources": self.income_sources,
        });
        Ok(FilingOutcome {
            filing_id: self.id,
            client_id: self.client_id,
            service: ServiceKind::IncomeTaxReturn,
            status: SubmissionStatus::Processing,
            extracted_data,
            documents: self.documents.values().cloned().collect(),
            gst_credentials: None,
            itr_credentials: self.pan.as_ref().map(|pan| ItrCredentials {
                pan: pan.clone(),
                portal_user_id: pan.as_str().to_string(),
            }),
        })
    }

    /// Step back to the predecessor of the current step.
    pub fn back(&mut self) -> Result<ItrStep, WizardError> {
        let prev = self
            .step
            .predecessor()
            .ok_or_else(|| WizardError::NoPreviousStep(self.step.to_string()))?;
        self.go(prev);
        Ok(prev)
    }

    /// Whether the wizard has finished.
    pub fn is_complete(&self) -> bool {
        self.step == ItrStep::Processing
    }

    fn require_step(&self, expected: ItrStep) -> Result<(), WizardError> {
        if self.step != expected {
            return Err(WizardError::WrongStep {
                expected: expected.to_string(),
                actual: self.step.to_string(),
            });
        }
        Ok(())
    }

    fn go(&mut self, to: ItrStep) {
        self.step = to;
        self.updated_at = Timestamp::now();
    }
}

fn kind_key(kind: DocumentKind) -> String {
    serde_json::to_value(kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{kind:?}"))
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const PDF: &str = "data:application/pdf;base64,JVBERi0xLjQ=";

    fn doc(kind: DocumentKind) -> Document {
        Document::new(kind, "upload.pdf", PDF, 1024).unwrap()
    }

    fn at_upload(sources: &[IncomeSource]) -> IncomeTaxWizard {
        let mut w = IncomeTaxWizard::new(ClientId::new());
        w.begin().unwrap();
        w.portal_login("abcde1234f").unwrap();
        w.select_assessment_year(AssessmentYear::new("2024-25").unwrap())
            .unwrap();
        w.select_income_sources(sources.iter().copied().collect())
            .unwrap();
        assert_eq!(w.step, ItrStep::Upload);
        w
    }

    #[test]
    fn test_salary_and_capital_gains_path() {
        let mut w = at_upload(&[IncomeSource::Salary, IncomeSource::CapitalGains]);
        assert_eq!(
            w.review().unwrap_err(),
            WizardError::MissingDocuments(vec![
                DocumentKind::Form16,
                DocumentKind::CapitalGainsStatement
            ])
        );
        w.attach(doc(DocumentKind::Form16)).unwrap();
        w.attach(doc(DocumentKind::CapitalGainsStatement)).unwrap();
        w.review().unwrap();
        let outcome = w.submit().unwrap();
        assert_eq!(outcome.service, ServiceKind::IncomeTaxReturn);
        assert_eq!(outcome.status, SubmissionStatus::Processing);
        assert_eq!(outcome.documents.len(), 2);
        assert_eq!(outcome.extracted_data["assessment_year"], "2024-25");
        assert_eq!(outcome.extracted_data["pan"], "ABCDE1234F");
        assert_eq!(outcome.itr_credentials.unwrap().portal_user_id, "ABCDE1234F");
    }

    #[test]
    fn test_house_property_needs_no_upload() {
        let mut w = at_upload(&[IncomeSource::HouseProperty]);
        assert!(w.required_documents().is_empty());
        w.review().unwrap();
        assert!(w.submit().unwrap().documents.is_empty());
    }

    #[test]
    fn test_reupload_replaces() {
        let mut w = at_upload(&[IncomeSource::Business]);
        w.attach(doc(DocumentKind::BankStatement)).unwrap();
        w.attach(doc(DocumentKind::BankStatement)).unwrap();
        assert_eq!(w.documents.len(), 1);
    }

    #[test]
    fn test_empty_income_sources_rejected() {
        let mut w = IncomeTaxWizard::new(ClientId::new());
        w.begin().unwrap();
        w.portal_login("ABCDE1234F").unwrap();
        w.select_assessment_year(AssessmentYear::new("2024-25").unwrap())
            .unwrap();
        assert_eq!(
            w.select_income_sources(BTreeSet::new()).unwrap_err(),
            WizardError::MissingField("income_sources")
        );
    }

    #[test]
    fn test_back_walks_every_predecessor() {
        let mut w = at_upload(&[IncomeSource::Other]);
        w.review().unwrap();
        let mut path = Vec::new();
        while let Ok(step) = w.back() {
            path.push(step);
        }
        assert_eq!(
            path,
            vec![
                ItrStep::Upload,
                ItrStep::IncomeSources,
                ItrStep::AssessmentYear,
                ItrStep::Login,
                ItrStep::Init
            ]
        );
    }

    #[test]
    fn test_attach_rejects_kinds_the_sources_do_not_need() {
        let mut w = at_upload(&[IncomeSource::Salary]);
        assert_eq!(
            w.attach(doc(DocumentKind::SalesRegister)).unwrap_err(),
            WizardError::UnsupportedDocument(DocumentKind::SalesRegister)
        );
        assert_eq!(
            w.attach(doc(DocumentKind::BankStatement)).unwrap_err(),
            WizardError::UnsupportedDocument(DocumentKind::BankStatement)
        );
        assert!(w.documents.is_empty());
    }

    #[test]
    fn test_reselecting_sources_drops_stale_uploads() {
        let mut w = at_upload(&[IncomeSource::Salary, IncomeSource::Business]);
        w.attach(doc(DocumentKind::Form16)).unwrap();
        w.attach(doc(DocumentKind::BankStatement)).unwrap();

        assert_eq!(w.back().unwrap(), ItrStep::IncomeSources);
        w.select_income_sources([IncomeSource::Business, IncomeSource::HouseProperty].into())
            .unwrap();
        assert_eq!(w.documents.len(), 1);
        assert!(w.missing_documents().is_empty());

        w.review().unwrap();
        let outcome = w.submit().unwrap();
        let kinds: Vec<DocumentKind> = outcome.documents.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, vec![DocumentKind::BankStatement]);
        assert_eq!(
            outcome.extracted_data["income_sources"],
            serde_json::json!(["business", "house_property"])
        );
    }

    #[test]
    fn test_reselecting_without_uploads_needed_submits_no_documents() {
        let mut w = at_upload(&[IncomeSource::Salary]);
        w.attach(doc(DocumentKind::Form16)).unwrap();
        w.back().unwrap();
        w.select_income_sources([IncomeSource::HouseProperty].into())
            .unwrap();
        w.review().unwrap();
        assert!(w.submit().unwrap().documents.is_empty());
    }

    #[test]
    fn test_assessment_year_format() {
        assert_eq!(AssessmentYear::new("2024-25").unwrap().as_str(), "2024-25");
        assert_eq!(AssessmentYear::new("2099-00").unwrap().as_str(), "2099-00");
        assert!(AssessmentYear::new("2024-26").is_err());
        assert!(AssessmentYear::new("24-25").is_err());
        assert!(AssessmentYear::new("2024").is_err());
    }
}
