//! # bloodnet-core: Foundational Types
//!
//! Leaf crate of the BloodNet workspace. Every other crate depends on it; it
//! depends on nothing internal.
//!
//! - **`BloodGroup`**: the eight canonical ABO/Rh groups. One definition,
//!   exhaustive `match` everywhere. Summaries iterate [`BloodGroup::ALL`] so a
//!   group can never silently disappear from an aggregate.
//! - **Identifier newtypes**: `AccountId`, `InventoryItemId`, `DonationId`,
//!   `RequestId`. You cannot pass a donation id where an account id is
//!   expected.
//! - **Field validation**: the shared rules for email, phone and bounded text
//!   fields, reported as [`ValidationError`].
//!
//! ## Crate Policy
//!
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod blood_group;
pub mod error;
pub mod identity;
pub mod validation;

pub use blood_group::{BloodGroup, BLOOD_GROUP_COUNT};
pub use error::ValidationError;
pub use identity::{AccountId, DonationId, InventoryItemId, RequestId};
pub use validation::{
    normalize_email, to_hex, validate_bounded_text, validate_email, validate_phone,
    validate_required_text,
};
