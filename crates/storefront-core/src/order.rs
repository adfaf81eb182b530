//! # Order Payment Status
//!
//! ```text
//! PENDING ──▶ COMPLETE (terminal)
//!    │  ▲
//!    ▼  │
//!   FAILED
//! ```
//!
//! A failed payment may be retried, which returns the order to `PENDING`.
//! Re-applying the current status is accepted as a no-op.

use serde::{Deserialize, Serialize};

use crate::error::{StatusError, ValidationError};

/// Payment status of a placed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Order placed, payment not yet settled.
    #[default]
    Pending,
    /// Payment settled.
    Complete,
    /// Payment attempt failed.
    Failed,
}

impl PaymentStatus {
    /// Return the string representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Complete => "COMPLETE",
            Self::Failed => "FAILED",
        }
    }

    /// Whether no further transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Validate a transition and return the new status.
    pub fn transition_to(self, to: PaymentStatus) -> Result<PaymentStatus, StatusError> {
        use PaymentStatus::*;
        match (self, to) {
            (from, to) if from == to => Ok(to),
            (Pending, Complete) | (Pending, Failed) | (Failed, Pending) => Ok(to),
            (Complete, _) => Err(StatusError::InvalidTransition {
                from: self.as_str(),
                to: to.as_str(),
                reason: "completed payments are final",
            }),
            (Failed, Complete) => Err(StatusError::InvalidTransition {
                from: self.as_str(),
                to: to.as_str(),
                reason: "a failed payment must be retried (PENDING) before completing",
            }),
            _ => Err(StatusError::InvalidTransition {
                from: self.as_str(),
                to: to.as_str(),
                reason: "transition not allowed",
            }),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "COMPLETE" => Ok(Self::Complete),
            "FAILED" => Ok(Self::Failed),
            other => Err(ValidationError::InvalidPaymentStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PaymentStatus::*;

    #[test]
    fn allowed_transitions() {
        assert_eq!(Pending.transition_to(Complete).unwrap(), Complete);
        assert_eq!(Pending.transition_to(Failed).unwrap(), Failed);
        assert_eq!(Failed.transition_to(Pending).unwrap(), Pending);
    }

    #[test]
    fn same_state_is_noop() {
        for s in [Pending, Complete, Failed] {
            assert_eq!(s.transition_to(s).unwrap(), s);
        }
    }

    #[test]
    fn complete_is_terminal() {
        assert!(Complete.is_terminal());
        assert!(Complete.transition_to(Pending).is_err());
        assert!(Complete.transition_to(Failed).is_err());
    }

    #[test]
    fn failed_cannot_jump_to_complete() {
        let err = Failed.transition_to(Complete).unwrap_err();
        assert!(err.to_string().contains("retried"), "got: {err}");
    }

    #[test]
    fn parse_and_serialize() {
        assert_eq!("FAILED".parse::<PaymentStatus>().unwrap(), Failed);
        assert!("pending".parse::<PaymentStatus>().is_err());
        assert_eq!(serde_json::to_string(&Complete).unwrap(), "\"COMPLETE\"");
        assert_eq!(PaymentStatus::default(), Pending);
    }
}
