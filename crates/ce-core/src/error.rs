//! # Validation Errors
//!
//! Field-level validation failures raised by the validated constructors in
//! this crate. All variants carry the offending value (or field name) so
//! the HTTP layer can surface a precise message.

use thiserror::Error;

/// Error raised when a domain value fails validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Mobile numbers must be exactly 10 ASCII digits.
    #[error("mobile number must be exactly 10 digits, got {0:?}")]
    InvalidMobile(String),

    /// PAN must match `AAAAA9999A`.
    #[error("PAN must be 5 letters, 4 digits and 1 letter (e.g. ABCDE1234F), got {0:?}")]
    InvalidPan(String),

    /// Email address is not of the form `local@domain.tld`.
    #[error("invalid email address: {0:?}")]
    InvalidEmail(String),

    /// GSTIN is not a well-formed 15-character identifier.
    #[error("invalid GSTIN: {0:?}")]
    InvalidGstin(String),

    /// Username contains disallowed characters or has the wrong length.
    #[error("username must be 3-64 characters of a-z, 0-9, '.', '_' or '-', got {0:?}")]
    InvalidUsername(String),

    /// A required field was empty.
    #[error("{0} must not be empty")]
    MissingField(&'static str),

    /// A field exceeded its maximum length.
    #[error("{field} must not exceed {max} characters")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Maximum permitted length.
        max: usize,
    },

    /// Timestamp could not be parsed or was not UTC.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Document payload or file name was malformed or too large.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Unrecognized entity type label.
    #[error("unknown entity type: {0:?}")]
    UnknownEntityType(String),

    /// Unrecognized service name.
    #[error("unknown service: {0:?}")]
    UnknownService(String),

    /// Unrecognized role name.
    #[error("unknown role: {0:?}")]
    UnknownRole(String),
}

/// Reject empty (after trimming) or overlong text fields.
pub(crate) fn require_text(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_text_rejects_blank() {
        assert_eq!(
            require_text("name", "   ", 10),
            Err(ValidationError::MissingField("name"))
        );
    }

    #[test]
    fn require_text_rejects_overlong() {
        assert_eq!(
            require_text("name", "abcdef", 5),
            Err(ValidationError::TooLong { field: "name", max: 5 })
        );
    }

    #[test]
    fn messages_carry_the_value() {
        let msg = ValidationError::InvalidMobile("12345".into()).to_string();
        assert!(msg.contains("10 digits"));
        assert!(msg.contains("12345"));
    }
}
