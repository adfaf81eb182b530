//! # Customer Membership

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Loyalty tier of a customer. New customers start at [`Membership::Bronze`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Membership {
    /// Entry tier.
    #[default]
    Bronze,
    /// Middle tier.
    Silver,
    /// Top tier.
    Gold,
}

impl Membership {
    /// Return the string representation of this tier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "BRONZE",
            Self::Silver => "SILVER",
            Self::Gold => "GOLD",
        }
    }
}

impl std::fmt::Display for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Membership {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BRONZE" => Ok(Self::Bronze),
            "SILVER" => Ok(Self::Silver),
            "GOLD" => Ok(Self::Gold),
            other => Err(ValidationError::InvalidMembership(other.to_string())),
        }
    }
}
