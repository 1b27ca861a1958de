//! # Service Catalogue
//!
//! The compliance services a client can apply for. Each service has a stable
//! wire name (snake_case) and a display label used by the legacy front-end.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ValidationError;

/// A compliance service offered on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// New GST registration.
    GstRegistration,
    /// Periodic GST return (regular or nil).
    GstReturn,
    /// Income tax return.
    IncomeTaxReturn,
    /// Private limited / LLP incorporation.
    CompanyIncorporation,
    /// TDS return.
    TdsReturn,
    /// Bookkeeping and accounting.
    Accounting,
    /// Scheduled consultation with an expert.
    Consultation,
}

impl ServiceKind {
    /// Every service, in catalogue order.
    pub const ALL: [ServiceKind; 7] = [
        Self::GstRegistration,
        Self::GstReturn,
        Self::IncomeTaxReturn,
        Self::CompanyIncorporation,
        Self::TdsReturn,
        Self::Accounting,
        Self::Consultation,
    ];

    /// Stable wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GstRegistration => "gst_registration",
            Self::GstReturn => "gst_return",
            Self::IncomeTaxReturn => "income_tax_return",
            Self::CompanyIncorporation => "company_incorporation",
            Self::TdsReturn => "tds_return",
            Self::Accounting => "accounting",
            Self::Consultation => "consultation",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::GstRegistration => "GST Registration",
            Self::GstReturn => "GST Return Filing",
            Self::IncomeTaxReturn => "Income Tax Return",
            Self::CompanyIncorporation => "Company Incorporation",
            Self::TdsReturn => "TDS Return",
            Self::Accounting => "Accounting & Bookkeeping",
            Self::Consultation => "Expert Consultation",
        }
    }

    /// Whether the service is an appointment rather than a filing.
    pub fn is_appointment(&self) -> bool {
        matches!(self, Self::Consultation)
    }

    /// Parse a wire name or a legacy display label.
    ///
    /// Matching ignores case, spaces, hyphens, underscores and `&`, so
    /// `"GST Return"`, `"gst-return"` and `"gst_return"` all resolve.
    pub fn parse_lenient(s: &str) -> Result<Self, ValidationError> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let kind = match key.as_str() {
            "gstregistration" | "newgstregistration" => Self::GstRegistration,
            "gstreturn" | "gstreturnfiling" | "gstfiling" => Self::GstReturn,
            "incometaxreturn" | "incometax" | "itr" | "itrfiling" => Self::IncomeTaxReturn,
            "companyincorporation" | "incorporation" | "companyregistration" => {
                Self::CompanyIncorporation
            }
            "tdsreturn" | "tds" => Self::TdsReturn,
            "accounting" | "accountingbookkeeping" | "bookkeeping" => Self::Accounting,
            "consultation" | "expertconsultation" => Self::Consultation,
            _ => return Err(ValidationError::UnknownService(s.to_string())),
        };
        Ok(kind)
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_lenient_accepts_labels_and_wire_names() {
        for kind in ServiceKind::ALL {
            assert_eq!(ServiceKind::parse_lenient(kind.as_str()).unwrap(), kind);
            assert_eq!(ServiceKind::parse_lenient(kind.label()).unwrap(), kind);
        }
        assert_eq!(
            ServiceKind::parse_lenient("gst-return").unwrap(),
            ServiceKind::GstReturn
        );
    }

    #[test]
    fn parse_lenient_rejects_unknown() {
        assert!(ServiceKind::parse_lenient("astrology").is_err());
    }

    #[test]
    fn wire_name_matches_serde() {
        let json = serde_json::to_string(&ServiceKind::IncomeTaxReturn).unwrap();
        assert_eq!(json, "\"income_tax_return\"");
    }
}
