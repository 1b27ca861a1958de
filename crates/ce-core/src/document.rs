//! # Uploaded Documents
//!
//! Files are carried inline as base64 `data:` URLs, the same shape the
//! browser's `FileReader.readAsDataURL` produces. Unlike the legacy
//! front-end, the payload is checked for shape and size on construction.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{require_text, ValidationError};
use crate::temporal::Timestamp;

/// What an uploaded file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// GST outward supplies (sales) register.
    SalesRegister,
    /// GST inward supplies (purchase) register.
    PurchaseRegister,
    /// Salary TDS certificate.
    Form16,
    /// Bank statement (business income).
    BankStatement,
    /// Broker capital-gains statement.
    CapitalGainsStatement,
    /// PAN / Aadhaar / passport.
    IdentityProof,
    /// Utility bill, rent agreement.
    AddressProof,
    /// MoA / AoA / board resolutions.
    IncorporationDocument,
    /// Anything else.
    Other,
}

impl DocumentKind {
    /// Map a legacy free-text document type onto a kind.
    pub fn from_legacy(s: &str) -> Self {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "sales" | "salesregister" | "salesfile" | "gstr1" => Self::SalesRegister,
            "purchase" | "purchaseregister" | "purchasefile" | "gstr2" => Self::PurchaseRegister,
            "form16" => Self::Form16,
            "bankstatement" | "bank" => Self::BankStatement,
            "capitalgains" | "capitalgainsstatement" => Self::CapitalGainsStatement,
            "pan" | "aadhaar" | "aadhar" | "identityproof" | "passport" => Self::IdentityProof,
            "addressproof" | "electricitybill" | "rentagreement" => Self::AddressProof,
            "moa" | "aoa" | "incorporation" | "incorporationdocument" => {
                Self::IncorporationDocument
            }
            _ => Self::Other,
        }
    }
}

/// A base64 `data:` URL (`data:<mime>;base64,<payload>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
pub struct DataUrl(String);

impl DataUrl {
    /// Parse a data URL, enforcing shape and a maximum decoded size.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDocument`] if the prefix, MIME
    /// type, encoding marker or base64 alphabet is wrong, or if the decoded
    /// payload exceeds `max_bytes`.
    pub fn parse(value: impl Into<String>, max_bytes: usize) -> Result<Self, ValidationError> {
        let url = DataUrl::try_from(value.into())?;
        let size = url.decoded_len();
        if size > max_bytes {
            return Err(ValidationError::InvalidDocument(format!(
                "payload is {size} bytes, limit is {max_bytes}"
            )));
        }
        Ok(url)
    }

    /// The declared MIME type.
    pub fn mime_type(&self) -> &str {
        let header = self.header();
        header
            .strip_prefix("data:")
            .and_then(|h| h.strip_suffix(";base64"))
            .unwrap_or("")
    }

    /// Decoded payload size in bytes, computed from the base64 length.
    pub fn decoded_len(&self) -> usize {
        let payload = self.payload();
        let padding = payload.bytes().rev().take_while(|b| *b == b'=').count();
        (payload.len() / 4) * 3 - padding.min(2)
    }

    /// Access the full URL.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn header(&self) -> &str {
        self.0.split_once(',').map(|(h, _)| h).unwrap_or("")
    }

    fn payload(&self) -> &str {
        self.0.split_once(',').map(|(_, p)| p).unwrap_or("")
    }
}

impl TryFrom<String> for DataUrl {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let Some((header, payload)) = value.split_once(',') else {
            return Err(ValidationError::InvalidDocument(
                "data URL has no ',' separator".into(),
            ));
        };
        let Some(mime) = header
            .strip_prefix("data:")
            .and_then(|h| h.strip_suffix(";base64"))
        else {
            return Err(ValidationError::InvalidDocument(
                "expected data:<mime>;base64,<payload>".into(),
            ));
        };
        let mime_ok = mime.split_once('/').is_some_and(|(t, s)| {
            !t.is_empty()
                && !s.is_empty()
                && mime
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '+' | '-'))
        });
        if !mime_ok {
            return Err(ValidationError::InvalidDocument(format!(
                "invalid MIME type {mime:?}"
            )));
        }
        let body = payload.trim_end_matches('=');
        let padding = payload.len() - body.len();
        let alphabet_ok = body
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/');
        if payload.is_empty() || payload.len() % 4 != 0 || padding > 2 || !alphabet_ok {
            return Err(ValidationError::InvalidDocument(
                "payload is not valid base64".into(),
            ));
        }
        Ok(Self(value))
    }
}

impl From<DataUrl> for String {
    fn from(url: DataUrl) -> Self {
        url.0
    }
}

/// An uploaded file attached to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Document {
    /// What the file is.
    pub kind: DocumentKind,
    /// Original file name (no path components).
    pub file_name: String,
    /// When the file was uploaded.
    pub uploaded_at: Timestamp,
    /// Inline payload.
    pub file_data: DataUrl,
}

impl Document {
    /// Build a document, validating the file name and payload.
    pub fn new(
        kind: DocumentKind,
        file_name: impl Into<String>,
        file_data: impl Into<String>,
        max_bytes: usize,
    ) -> Result<Self, ValidationError> {
        let file_name = file_name.into();
        require_text("file_name", &file_name, 255)?;
        if file_name.contains(['/', '\\']) {
            return Err(ValidationError::InvalidDocument(format!(
                "file name must not contain path separators: {file_name:?}"
            )));
        }
        Ok(Self {
            kind,
            file_name: file_name.trim().to_string(),
            uploaded_at: Timestamp::now(),
            file_data: DataUrl::parse(file_data, max_bytes)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // "hello" base64-encoded.
    const HELLO: &str = "data:text/plain;base64,aGVsbG8=";

    #[test]
    fn data_url_accepts_well_formed() {
        let url = DataUrl::parse(HELLO, 1024).unwrap();
        assert_eq!(url.mime_type(), "text/plain");
        assert_eq!(url.decoded_len(), 5);
    }

    #[test]
    fn data_url_rejects_missing_base64_marker() {
        assert!(DataUrl::parse("data:text/plain,hello", 1024).is_err());
    }

    #[test]
    fn data_url_rejects_non_data_scheme() {
        assert!(DataUrl::parse("https://example.com/x.pdf", 1024).is_err());
    }

    #[test]
    fn data_url_rejects_bad_alphabet() {
        assert!(DataUrl::parse("data:text/plain;base64,aGV*bG8=", 1024).is_err());
    }

    #[test]
    fn data_url_enforces_size_limit() {
        let err = DataUrl::parse(HELLO, 4).unwrap_err();
        assert!(err.to_string().contains("limit is 4"));
    }

    #[test]
    fn data_url_deserialize_validates() {
        let ok: Result<DataUrl, _> = serde_json::from_str(&format!("\"{HELLO}\""));
        assert!(ok.is_ok());
        let bad: Result<DataUrl, _> = serde_json::from_str("\"not a url\"");
        assert!(bad.is_err());
    }

    #[test]
    fn document_rejects_path_in_name() {
        let err = Document::new(DocumentKind::Form16, "../etc/passwd", HELLO, 1024).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDocument(_)));
    }

    #[test]
    fn document_from_legacy_type() {
        assert_eq!(DocumentKind::from_legacy("sales"), DocumentKind::SalesRegister);
        assert_eq!(DocumentKind::from_legacy("Purchase File"), DocumentKind::PurchaseRegister);
        assert_eq!(DocumentKind::from_legacy("Form-16"), DocumentKind::Form16);
        assert_eq!(DocumentKind::from_legacy("misc"), DocumentKind::Other);
    }
}
