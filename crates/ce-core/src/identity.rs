//! # Identity Newtypes
//!
//! Domain-primitive newtypes for identifiers and contact details.
//! Each identifier is a distinct type. You cannot pass a [`ClientId`]
//! where a [`SubmissionId`] is expected.
//!
//! ## Validation
//!
//! String-based values ([`MobileNumber`], [`Pan`], [`Email`], [`Gstin`],
//! [`Username`]) validate format at construction time and on
//! deserialization. UUID-based identifiers are always valid by construction.
//!
//! ## Formats
//!
//! - Mobile: exactly 10 ASCII digits (surrounding whitespace trimmed)
//! - PAN: `AAAAA9999A`, stored uppercase
//! - GSTIN: 2-digit state code, embedded PAN, entity digit, `Z`, checksum char
//! - Username: 3-64 chars of `a-z 0-9 . _ -`, stored lowercase

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ValidationError;

/// Implement `Deserialize` for string newtypes that must validate their
/// contents. Deserializes as a plain `String`, then routes through the
/// type's `new()` constructor so invalid values are rejected at the boundary.
macro_rules! impl_validating_deserialize {
    ($ty:ident) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Implement the shared surface of a UUID-backed identifier.
macro_rules! impl_uuid_identifier {
    ($ty:ident) => {
        impl $ty {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $ty {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $ty {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::from_str(s).map(Self)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// UUID-based identifiers (always valid by construction)
// ---------------------------------------------------------------------------

/// Identifier of a client (one business entity or individual taxpayer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct ClientId(Uuid);
impl_uuid_identifier!(ClientId);

/// Identifier of a per-service profile attached to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct ProfileId(Uuid);
impl_uuid_identifier!(ProfileId);

/// Identifier of a service submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct SubmissionId(Uuid);
impl_uuid_identifier!(SubmissionId);

/// Identifier of an in-progress filing wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct FilingId(Uuid);
impl_uuid_identifier!(FilingId);

/// Identifier of a task assigned to an associate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct TaskId(Uuid);
impl_uuid_identifier!(TaskId);

// ---------------------------------------------------------------------------
// String-based values (validated at construction)
// ---------------------------------------------------------------------------

/// Indian mobile number, exactly 10 digits.
///
/// Several clients may share one mobile number: a person managing more
/// than one business entity logs in once and switches between them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
pub struct MobileNumber(String);

impl_validating_deserialize!(MobileNumber);

impl MobileNumber {
    /// Create a mobile number, validating the 10-digit format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidMobile`] unless the trimmed value is
    /// exactly 10 ASCII digits.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let s = raw.trim();
        if s.len() != 10 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidMobile(raw));
        }
        Ok(Self(s.to_string()))
    }

    /// Access the digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Mask all but the last four digits, for logs.
    pub fn masked(&self) -> String {
        format!("******{}", &self.0[6..])
    }
}

impl std::fmt::Display for MobileNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Permanent Account Number issued by the Income Tax Department.
///
/// # Validation
///
/// - 10 characters after trimming and uppercasing
/// - 5 letters, 4 digits, 1 letter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
pub struct Pan(String);

impl_validating_deserialize!(Pan);

impl Pan {
    /// Create a PAN, validating the `AAAAA9999A` format.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPan`] if the format is invalid.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let s = raw.trim().to_ascii_uppercase();
        if !is_pan_shape(&s) {
            return Err(ValidationError::InvalidPan(raw));
        }
        Ok(Self(s))
    }

    /// Access the PAN string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Pan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_pan_shape(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[..5].iter().all(u8::is_ascii_uppercase)
        && b[5..9].iter().all(u8::is_ascii_digit)
        && b[9].is_ascii_uppercase()
}

/// Email address.
///
/// The check is deliberately shallow: one `@`, a non-empty local part, a
/// domain with at least one dot and no empty labels, no whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, ToSchema)]
pub struct Email(String);

impl_validating_deserialize!(Email);

impl Email {
    /// Create an email address, validating its shape.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidEmail`] if the shape is invalid.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let s = raw.trim();
        if s.len() > 254 || s.chars().any(char::is_whitespace) {
            return Err(ValidationError::InvalidEmail(raw));
        }
        let Some((local, domain)) = s.split_once('@') else {
            return Err(ValidationError::InvalidEmail(raw));
        };
        let domain_ok = domain.contains('.')
            && !domain.contains('@')
            && domain.split('.').all(|label| !label.is_empty());
        if local.is_empty() || !domain_ok {
            return Err(ValidationError::InvalidEmail(raw));
        }
        Ok(Self(format!("{local}@{}", domain.to_ascii_lowercase())))
    }

    /// Access the address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// GST Identification Number (15 characters).
///
/// Layout: `SS PPPPPPPPPP E Z C` — 2-digit state code, the holder's PAN,
/// entity number (1-9 or A-Z), the literal `Z`, and a checksum character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, ToSchema)]
pub struct Gstin(String);

impl_validating_deserialize!(Gstin);

impl Gstin {
    /// Create a GSTIN, validating the layout.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidGstin`] if the layout is invalid.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let s = raw.trim().to_ascii_uppercase();
        let b = s.as_bytes();
        let valid = b.len() == 15
            && b[..2].iter().all(u8::is_ascii_digit)
            && is_pan_shape(&s[2..12])
            && (b[12].is_ascii_uppercase() || (b'1'..=b'9').contains(&b[12]))
            && b[13] == b'Z'
            && b[14].is_ascii_alphanumeric();
        if !valid {
            return Err(ValidationError::InvalidGstin(raw));
        }
        Ok(Self(s))
    }

    /// Access the GSTIN string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The two-digit state code.
    pub fn state_code(&self) -> &str {
        &self.0[..2]
    }

    /// The PAN embedded in characters 3-12.
    pub fn pan(&self) -> Pan {
        Pan(self.0[2..12].to_string())
    }
}

impl std::fmt::Display for Gstin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Login name for partner agents, corporates and admins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
pub struct Username(String);

impl_validating_deserialize!(Username);

impl Username {
    /// Create a username. Input is trimmed and lowercased.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidUsername`] if the length is outside
    /// 3-64 or a character is outside `a-z 0-9 . _ -`.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let raw = value.into();
        let s = raw.trim().to_ascii_lowercase();
        let valid = (3..=64).contains(&s.len())
            && s
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(ValidationError::InvalidUsername(raw));
        }
        Ok(Self(s))
    }

    /// Access the username.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Username {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn mobile_accepts_ten_digits() {
        let m = MobileNumber::new("9999999999").unwrap();
        assert_eq!(m.as_str(), "9999999999");
    }

    #[test]
    fn mobile_trims_whitespace() {
        let m = MobileNumber::new(" 9876543210 ").unwrap();
        assert_eq!(m.as_str(), "9876543210");
    }

    #[test]
    fn mobile_rejects_nine_digits() {
        let err = MobileNumber::new("999999999").unwrap_err();
        assert_eq!(err, ValidationError::InvalidMobile("999999999".into()));
    }

    #[test]
    fn mobile_rejects_non_digits() {
        assert!(MobileNumber::new("98765abcde").is_err());
        assert!(MobileNumber::new("+919876543210").is_err());
    }

    #[test]
    fn mobile_masked_keeps_last_four() {
        let m = MobileNumber::new("9876543210").unwrap();
        assert_eq!(m.masked(), "******3210");
    }

    #[test]
    fn mobile_deserialize_validates() {
        let ok: Result<MobileNumber, _> = serde_json::from_str("\"9876543210\"");
        assert!(ok.is_ok());
        let bad: Result<MobileNumber, _> = serde_json::from_str("\"12345\"");
        assert!(bad.is_err());
    }

    #[test]
    fn pan_normalizes_case() {
        let p = Pan::new("abcde1234f").unwrap();
        assert_eq!(p.as_str(), "ABCDE1234F");
    }

    #[test]
    fn pan_rejects_bad_layout() {
        assert!(Pan::new("ABCD12345F").is_err());
        assert!(Pan::new("ABCDE1234").is_err());
        assert!(Pan::new("ABCDE12345").is_err());
    }

    #[test]
    fn email_shapes() {
        assert!(Email::new("owner@example.com").is_ok());
        assert!(Email::new("a.b+c@sub.example.in").is_ok());
        assert!(Email::new("no-at-sign.com").is_err());
        assert!(Email::new("@example.com").is_err());
        assert!(Email::new("x@localhost").is_err());
        assert!(Email::new("x@example..com").is_err());
        assert!(Email::new("x y@example.com").is_err());
    }

    #[test]
    fn email_lowercases_domain_only() {
        let e = Email::new("Owner@Example.COM").unwrap();
        assert_eq!(e.as_str(), "Owner@example.com");
    }

    #[test]
    fn gstin_valid_and_embedded_pan() {
        let g = Gstin::new("27abcde1234f1z5").unwrap();
        assert_eq!(g.as_str(), "27ABCDE1234F1Z5");
        assert_eq!(g.state_code(), "27");
        assert_eq!(g.pan().as_str(), "ABCDE1234F");
    }

    #[test]
    fn gstin_rejects_bad_layout() {
        assert!(Gstin::new("27ABCDE1234F1X5").is_err());
        assert!(Gstin::new("2AABCDE1234F1Z5").is_err());
        assert!(Gstin::new("27ABCDE1234F0Z5").is_err());
        assert!(Gstin::new("27ABCDE1234F1Z").is_err());
    }

    #[test]
    fn username_normalizes() {
        let u = Username::new("  Partner.One ").unwrap();
        assert_eq!(u.as_str(), "partner.one");
        assert!(Username::new("ab").is_err());
        assert!(Username::new("has space").is_err());
    }

    #[test]
    fn uuid_identifier_parses_and_displays() {
        let id = ClientId::new();
        let parsed: ClientId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<ClientId>().is_err());
    }

    proptest! {
        #[test]
        fn any_ten_digit_string_is_a_mobile(s in "[0-9]{10}") {
            prop_assert!(MobileNumber::new(s).is_ok());
        }

        #[test]
        fn digit_strings_of_other_lengths_are_rejected(s in "[0-9]{0,9}|[0-9]{11,15}") {
            prop_assert!(MobileNumber::new(s).is_err());
        }

        #[test]
        fn generated_pans_validate(s in "[A-Z]{5}[0-9]{4}[A-Z]") {
            let pan = Pan::new(s.clone()).unwrap();
            prop_assert_eq!(pan.as_str(), s.as_str());
        }
    }
}
