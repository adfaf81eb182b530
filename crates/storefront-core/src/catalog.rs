//! # Catalog Primitives
//!
//! Slug derivation for product URLs, validated cart/order line quantities,
//! and the low/ok inventory classification used by the admin views.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Products with fewer units than this are reported as [`InventoryStatus::Low`].
pub const DEFAULT_LOW_INVENTORY_THRESHOLD: u32 = 10;

/// Derive a URL slug from a product title.
///
/// ASCII letters and digits are lowercased and kept; every other run of
/// characters becomes a single `-`. Leading and trailing dashes are removed.
/// A title with no usable characters yields `"product"`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("product");
    }
    slug
}

/// Number of units on a cart or order line, `1..=32767`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub struct Quantity(u16);

impl Quantity {
    /// Largest quantity a single line may hold.
    pub const MAX: u16 = 32_767;

    /// Validate a raw quantity.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value < 1 || value > i64::from(Self::MAX) {
            return Err(ValidationError::InvalidQuantity(value));
        }
        // Range checked above.
        Ok(Self(value as u16))
    }

    /// The quantity as an integer.
    pub fn get(self) -> u16 {
        self.0
    }

    /// Add more units to a line, rejecting totals above [`Quantity::MAX`].
    pub fn accumulate(self, more: Quantity) -> Result<Self, ValidationError> {
        Self::new(i64::from(self.0) + i64::from(more.0))
    }
}

impl TryFrom<i64> for Quantity {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u16 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

impl From<Quantity> for u32 {
    fn from(q: Quantity) -> Self {
        u32::from(q.0)
    }
}

impl std::fmt::Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stock classification shown to staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryStatus {
    /// Below the low-stock threshold.
    Low,
    /// At or above the threshold.
    Ok,
}

impl InventoryStatus {
    /// Classify an inventory level against a threshold.
    pub fn classify(inventory: u32, threshold: u32) -> Self {
        if inventory < threshold {
            Self::Low
        } else {
            Self::Ok
        }
    }

    /// Return the string representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Ok => "OK",
        }
    }
}

impl std::str::FromStr for InventoryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "ok" => Ok(Self::Ok),
            other => Err(format!("unknown inventory status: {other} (expected low or ok)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Coffee Mug"), "coffee-mug");
        assert_eq!(slugify("  Bread -- Ginger, Spiced! "), "bread-ginger-spiced");
        assert_eq!(slugify("Wine - Red, Cabernet 2019"), "wine-red-cabernet-2019");
    }

    #[test]
    fn slugify_non_ascii_only() {
        assert_eq!(slugify("---"), "product");
        assert_eq!(slugify(""), "product");
        assert_eq!(slugify("Crème brûlée"), "cr-me-br-l-e");
    }

    #[test]
    fn quantity_bounds() {
        assert!(Quantity::new(0).is_err());
        assert!(Quantity::new(-3).is_err());
        assert_eq!(Quantity::new(1).unwrap().get(), 1);
        assert_eq!(Quantity::new(32_767).unwrap().get(), 32_767);
        assert_eq!(
            Quantity::new(32_768),
            Err(ValidationError::InvalidQuantity(32_768))
        );
    }

    #[test]
    fn quantity_accumulate() {
        let a = Quantity::new(3).unwrap();
        let b = Quantity::new(4).unwrap();
        assert_eq!(a.accumulate(b).unwrap().get(), 7);
        let big = Quantity::new(32_000).unwrap();
        assert!(big.accumulate(Quantity::new(1_000).unwrap()).is_err());
    }

    #[test]
    fn quantity_serde() {
        let q: Quantity = serde_json::from_str("5").unwrap();
        assert_eq!(q.get(), 5);
        assert_eq!(serde_json::to_string(&q).unwrap(), "5");
        assert!(serde_json::from_str::<Quantity>("0").is_err());
    }

    #[test]
    fn inventory_classify() {
        assert_eq!(InventoryStatus::classify(9, 10), InventoryStatus::Low);
        assert_eq!(InventoryStatus::classify(10, 10), InventoryStatus::Ok);
        assert_eq!(InventoryStatus::classify(0, 10), InventoryStatus::Low);
    }

    #[test]
    fn inventory_from_str() {
        assert_eq!("LOW".parse::<InventoryStatus>().unwrap(), InventoryStatus::Low);
        assert_eq!("ok".parse::<InventoryStatus>().unwrap(), InventoryStatus::Ok);
        assert!("medium".parse::<InventoryStatus>().is_err());
    }
}
