#![deny(missing_docs)]

//! # storefront-core — Domain Primitives for the Storefront
//!
//! Foundational types shared by the API service and the operator CLI.
//! No I/O and no internal crate dependencies, only `serde` and `thiserror`.
//!
//! ## Design Principles
//!
//! 1. **Money is integer minor units.** [`Money`] holds cents in an `i64`
//!    and never passes through a float. On the wire it is a two-decimal
//!    string (`"19.99"`).
//!
//! 2. **Validated newtypes.** [`Quantity`] and [`TaxRate`] can only be
//!    constructed from values that satisfy their range constraints.
//!
//! 3. **Explicit status transitions.** [`PaymentStatus::transition_to`] is
//!    the only way an order's payment status changes.
//!
//! 4. **[`ValidationError`] hierarchy.** Structured errors with `thiserror`,
//!    no `.unwrap()` outside tests.

pub mod catalog;
pub mod customer;
pub mod error;
pub mod money;
pub mod order;

pub use catalog::{slugify, InventoryStatus, Quantity, DEFAULT_LOW_INVENTORY_THRESHOLD};
pub use customer::Membership;
pub use error::{require_text, StatusError, ValidationError};
pub use money::{Money, TaxRate};
pub use order::PaymentStatus;
