//! # bloodnet-state: Domain Core
//!
//! The entities of the blood bank and the rules that bind them together.
//!
//! - **Account** (`account.rs`): one identity record polymorphic over four
//!   roles via [`RoleProfile`]. Holds the donor eligibility rule and password
//!   hashing.
//! - **Inventory** (`inventory.rs`): per-hospital stock batches with derived
//!   expiry status, additive batch merging, deduction, search and summaries.
//! - **Donation** (`donation.rs`): donation records, vitals, amendments and
//!   statistics folds.
//! - **Request** (`request.rs`): the emergency-request state machine with a
//!   transition log, listing helpers and statistics.
//!
//! ## Design
//!
//! Everything here is pure. Functions that depend on the clock take
//! `now: DateTime<Utc>` explicitly, so behaviour at the 90-day and 7-day
//! boundaries is testable without sleeping. Persistence, authorization and
//! multi-entity orchestration live in `bloodnet-api`.

pub mod account;
pub mod donation;
pub mod inventory;
pub mod request;

pub use account::{
    days_until_eligible, is_eligible_to_donate, Account, AccountError, AccountUpdate,
    Location, PasswordHash, ProfileUpdate, PublicAccount, Registration, Role, RoleProfile,
    DONATION_INTERVAL_DAYS,
};
pub use donation::{
    check_donor, derived_batch_number, BloodPressure, Donation, DonationAmendment,
    DonationError, DonationStatus, DonationType, DonorDonationStats, GroupTally, NewDonation,
    TypeCount, Vitals,
};
pub use inventory::{
    ExpiryAlerts, GroupSummary, HospitalStock, InventoryError, InventoryItem, InventorySource,
    ItemStatus, ItemUpdate, NewStock, StockUnit, StockView, DONATION_SHELF_LIFE_DAYS,
    EXPIRY_WARNING_DAYS, LOW_STOCK_THRESHOLD,
};
pub use request::{
    EmergencyRequest, GeoPoint, NewRequest, RequestError, RequestFilter, RequestLocation,
    RequestStats, RequestStatus, RequestTransitionRecord, UrgencyLevel,
};
