//! # Error Hierarchy
//!
//! Structured error types for the storefront domain, built with `thiserror`.
//!
//! Each variant carries the offending input so that API clients and
//! operators can see exactly what was rejected.

use thiserror::Error;

/// Validation errors for domain primitives and request fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Amount string is not a decimal with at most two fractional digits.
    #[error("invalid amount: \"{0}\" (expected a decimal with at most 2 fractional digits)")]
    InvalidAmount(String),

    /// Arithmetic on amounts exceeded the representable range.
    #[error("amount overflow while computing {0}")]
    AmountOverflow(&'static str),

    /// Amount is syntactically valid but outside the allowed range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    AmountOutOfRange {
        /// Field being validated.
        field: &'static str,
        /// The rejected amount, formatted.
        value: String,
        /// Inclusive lower bound, formatted.
        min: String,
        /// Inclusive upper bound, formatted.
        max: String,
    },

    /// Quantity outside `1..=32767`.
    #[error("invalid quantity: {0} (expected 1..=32767)")]
    InvalidQuantity(i64),

    /// Required text field is empty or whitespace.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// Text field exceeds its maximum length.
    #[error("{field} must not exceed {max} characters")]
    FieldTooLong {
        /// Field being validated.
        field: &'static str,
        /// Maximum number of characters.
        max: usize,
    },

    /// Email address without a local part and a dotted domain.
    #[error("email is not a valid address: {0}")]
    InvalidEmail(String),

    /// Unknown membership tier.
    #[error("invalid membership: \"{0}\" (expected BRONZE, SILVER or GOLD)")]
    InvalidMembership(String),

    /// Unknown payment status.
    #[error("invalid payment status: \"{0}\" (expected PENDING, COMPLETE or FAILED)")]
    InvalidPaymentStatus(String),

    /// Tax rate is not a percentage in `0..=100` with at most two decimals.
    #[error("invalid tax rate: \"{0}\" (expected a percentage between 0 and 100)")]
    InvalidTaxRate(String),
}

impl ValidationError {
    /// The request field the error is about, when it names one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::AmountOutOfRange { field, .. } | Self::FieldTooLong { field, .. } => Some(field),
            Self::EmptyField(field) => Some(field),
            Self::InvalidQuantity(_) => Some("quantity"),
            Self::InvalidEmail(_) => Some("email"),
            Self::InvalidMembership(_) => Some("membership"),
            Self::InvalidPaymentStatus(_) => Some("payment_status"),
            Self::InvalidAmount(_) | Self::AmountOverflow(_) | Self::InvalidTaxRate(_) => None,
        }
    }
}

/// Errors raised by status transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    /// The attempted transition is not valid from the current state.
    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        /// The current state name.
        from: &'static str,
        /// The attempted target state name.
        to: &'static str,
        /// Human-readable reason for the rejection.
        reason: &'static str,
    },
}

/// Reject empty and overlong text fields.
///
/// Returns the trimmed value on success.
pub fn require_text(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    if trimmed.chars().count() > max {
        return Err(ValidationError::FieldTooLong { field, max });
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_text_trims() {
        assert_eq!(require_text("title", "  Mugs ", 255).unwrap(), "Mugs");
    }

    #[test]
    fn require_text_rejects_blank() {
        assert_eq!(
            require_text("title", "   ", 255),
            Err(ValidationError::EmptyField("title"))
        );
    }

    #[test]
    fn require_text_rejects_overlong() {
        let long = "x".repeat(256);
        let err = require_text("title", &long, 255).unwrap_err();
        assert!(err.to_string().contains("255"), "got: {err}");
    }

    #[test]
    fn errors_name_their_field() {
        assert_eq!(ValidationError::EmptyField("title").field(), Some("title"));
        assert_eq!(
            ValidationError::FieldTooLong { field: "slug", max: 255 }.field(),
            Some("slug")
        );
        assert_eq!(ValidationError::InvalidQuantity(0).field(), Some("quantity"));
        assert_eq!(ValidationError::AmountOverflow("sum").field(), None);
    }

    #[test]
    fn transition_error_message_names_states() {
        let err = StatusError::InvalidTransition {
            from: "COMPLETE",
            to: "PENDING",
            reason: "terminal",
        };
        let msg = err.to_string();
        assert!(msg.contains("COMPLETE") && msg.contains("PENDING"));
    }
}
