//! # Inventory Ledger
//!
//! Per-hospital stock batches of one blood group each. Expiry status is never
//! stored; it is derived from `expiry_date` against the caller's `now` at read
//! time.
//!
//! ## Batch merging
//!
//! Restocking with a batch number that matches an active item of the same
//! hospital and blood group adds to that item's quantity and replaces its
//! expiry. Restocking without a batch number always creates a new item.
//!
//! ## Deduction
//!
//! Approving a request draws from a single batch: the active, unexpired batch
//! of the hospital with enough units and the earliest expiry.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bloodnet_core::{
    validate_bounded_text, AccountId, BloodGroup, InventoryItemId, ValidationError,
};

/// Items with fewer units than this are reported as low stock.
pub const LOW_STOCK_THRESHOLD: u32 = 5;

/// Items expiring within this many days are reported as expiring soon.
pub const EXPIRY_WARNING_DAYS: i64 = 7;

/// Shelf life of whole blood collected through a recorded donation.
pub const DONATION_SHELF_LIFE_DAYS: i64 = 42;

pub const NOTES_MAX_CHARS: usize = 500;
const BATCH_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventorySource {
    #[default]
    Donation,
    Purchase,
    Transfer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockUnit {
    #[default]
    Units,
    Ml,
}

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InventoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Deduction larger than the batch holds.
    #[error("inventory item {item_id} holds {available} units, cannot deduct {requested}")]
    InsufficientStock {
        item_id: InventoryItemId,
        available: u32,
        requested: u32,
    },

    /// Merged quantity does not fit the counter.
    #[error("inventory item {item_id} quantity overflow")]
    QuantityOverflow { item_id: InventoryItemId },
}

// ─── Inputs ──────────────────────────────────────────────────────────

/// A restock request.
#[derive(Debug, Clone)]
pub struct NewStock {
    pub blood_group: BloodGroup,
    pub quantity: i64,
    pub unit: Option<StockUnit>,
    pub expiry_date: DateTime<Utc>,
    pub collection_date: Option<DateTime<Utc>>,
    pub batch_number: Option<String>,
    pub source: Option<InventorySource>,
    pub notes: Option<String>,
}

impl NewStock {
    /// Check quantity and expiry, normalizing text fields in place.
    pub fn validate(&mut self, now: DateTime<Utc>) -> Result<(), InventoryError> {
        positive_quantity(self.quantity)?;
        if self.expiry_date <= now {
            return Err(ValidationError::invalid("expiryDate", "must be in the future").into());
        }
        self.batch_number = normalize_optional("batchNumber", self.batch_number.take(), BATCH_MAX_CHARS)?;
        self.notes = normalize_optional("notes", self.notes.take(), NOTES_MAX_CHARS)?;
        Ok(())
    }
}

fn positive_quantity(quantity: i64) -> Result<u32, ValidationError> {
    if quantity < 1 {
        return Err(ValidationError::invalid("quantity", "must be at least 1"));
    }
    u32::try_from(quantity).map_err(|_| ValidationError::invalid("quantity", "is too large"))
}

fn normalize_optional(
    field: &'static str,
    value: Option<String>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value {
        None => Ok(None),
        Some(v) => {
            let v = validate_bounded_text(field, &v, max)?;
            Ok(Some(v).filter(|v| !v.is_empty()))
        }
    }
}

/// A manual edit of an existing item.
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub quantity: Option<i64>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

// ─── Item ────────────────────────────────────────────────────────────

/// One batch of one blood group held by one hospital.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub hospital_id: AccountId,
    pub blood_group: BloodGroup,
    pub quantity: u32,
    pub unit: StockUnit,
    pub expiry_date: DateTime<Utc>,
    pub collection_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<String>,
    pub source: InventorySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Read-time status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStatus {
    pub is_expired: bool,
    pub is_expiring_soon: bool,
    pub days_until_expiry: i64,
    pub is_low_stock: bool,
}

impl InventoryItem {
    /// Build a new item from a validated restock.
    pub fn from_new(
        hospital_id: AccountId,
        mut stock: NewStock,
        now: DateTime<Utc>,
    ) -> Result<Self, InventoryError> {
        stock.validate(now)?;
        let quantity = positive_quantity(stock.quantity)?;
        Ok(Self {
            id: InventoryItemId::new(),
            hospital_id,
            blood_group: stock.blood_group,
            quantity,
            unit: stock.unit.unwrap_or_default(),
            expiry_date: stock.expiry_date,
            collection_date: stock.collection_date.unwrap_or(now),
            batch_number: stock.batch_number,
            source: stock.source.unwrap_or_default(),
            notes: stock.notes,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Item created as the inventory side of a completed donation.
    pub fn from_donation(
        hospital_id: AccountId,
        blood_group: BloodGroup,
        quantity: u32,
        batch_number: String,
        notes: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InventoryItemId::new(),
            hospital_id,
            blood_group,
            quantity,
            unit: StockUnit::Units,
            expiry_date: now + Duration::days(DONATION_SHELF_LIFE_DAYS),
            collection_date: now,
            batch_number: Some(batch_number),
            source: InventorySource::Donation,
            notes: Some(notes),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_date
    }

    /// Whole days until expiry, rounded up. Negative once expired.
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        let ms = (self.expiry_date - now).num_milliseconds();
        let day = Duration::days(1).num_milliseconds();
        ms.div_euclid(day) + i64::from(ms.rem_euclid(day) > 0)
    }

    pub fn is_expiring_soon(&self, now: DateTime<Utc>) -> bool {
        let days = self.days_until_expiry(now);
        days > 0 && days <= EXPIRY_WARNING_DAYS
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity < LOW_STOCK_THRESHOLD
    }

    /// Active, unexpired and non-empty.
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.quantity > 0 && !self.is_expired(now)
    }

    pub fn status(&self, now: DateTime<Utc>) -> ItemStatus {
        ItemStatus {
            is_expired: self.is_expired(now),
            is_expiring_soon: self.is_expiring_soon(now),
            days_until_expiry: self.days_until_expiry(now),
            is_low_stock: self.is_low_stock(),
        }
    }

    /// Whether a restock with `batch_number` should merge into this item.
    pub fn is_merge_target(
        &self,
        hospital_id: AccountId,
        blood_group: BloodGroup,
        batch_number: &str,
    ) -> bool {
        self.is_active
            && self.hospital_id == hospital_id
            && self.blood_group == blood_group
            && self.batch_number.as_deref() == Some(batch_number)
    }

    /// Fold a validated restock into this batch: quantities add, expiry is
    /// replaced.
    pub fn merge(&mut self, mut stock: NewStock, now: DateTime<Utc>) -> Result<(), InventoryError> {
        stock.validate(now)?;
        let added = positive_quantity(stock.quantity)?;
        self.quantity = self
            .quantity
            .checked_add(added)
            .ok_or(InventoryError::QuantityOverflow { item_id: self.id })?;
        self.expiry_date = stock.expiry_date;
        self.updated_at = now;
        Ok(())
    }

    pub fn apply_update(&mut self, update: ItemUpdate, now: DateTime<Utc>) -> Result<(), InventoryError> {
        let quantity = match update.quantity {
            Some(q) if q < 0 => {
                return Err(ValidationError::invalid("quantity", "cannot be negative").into())
            }
            Some(q) => Some(
                u32::try_from(q).map_err(|_| ValidationError::invalid("quantity", "is too large"))?,
            ),
            None => None,
        };
        let notes = match update.notes {
            Some(n) => Some(normalize_optional("notes", Some(n), NOTES_MAX_CHARS)?),
            None => None,
        };
        if let Some(q) = quantity {
            self.quantity = q;
        }
        if let Some(expiry) = update.expiry_date {
            self.expiry_date = expiry;
        }
        if let Some(n) = notes {
            self.notes = n;
        }
        if let Some(active) = update.is_active {
            self.is_active = active;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Soft delete.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }

    pub fn deduct(&mut self, quantity: u32, now: DateTime<Utc>) -> Result<(), InventoryError> {
        self.quantity = self
            .quantity
            .checked_sub(quantity)
            .ok_or(InventoryError::InsufficientStock {
                item_id: self.id,
                available: self.quantity,
                requested: quantity,
            })?;
        self.updated_at = now;
        Ok(())
    }
}

// ─── Ledger queries ──────────────────────────────────────────────────

/// Item a restock should merge into, if any. Restocks without a batch number
/// never merge.
pub fn find_merge_target<'a>(
    items: impl IntoIterator<Item = &'a InventoryItem>,
    hospital_id: AccountId,
    stock: &NewStock,
) -> Option<InventoryItemId> {
    let batch = stock.batch_number.as_deref().map(str::trim).filter(|b| !b.is_empty())?;
    items
        .into_iter()
        .find(|item| item.is_merge_target(hospital_id, stock.blood_group, batch))
        .map(|item| item.id)
}

/// The batch an approval draws from: active, unexpired, holding at least
/// `quantity` units, earliest expiry first.
pub fn select_batch_for_deduction<'a>(
    items: impl IntoIterator<Item = &'a InventoryItem>,
    hospital_id: AccountId,
    blood_group: BloodGroup,
    quantity: u32,
    now: DateTime<Utc>,
) -> Option<InventoryItemId> {
    items
        .into_iter()
        .filter(|item| {
            item.hospital_id == hospital_id
                && item.blood_group == blood_group
                && item.is_active
                && !item.is_expired(now)
                && item.quantity >= quantity
        })
        .min_by_key(|item| (item.expiry_date, item.created_at))
        .map(|item| item.id)
}

/// Aggregate stock for one blood group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub blood_group: BloodGroup,
    pub total_quantity: u64,
    pub item_count: usize,
}

/// Per-group totals of a hospital's active, unexpired stock. Always one entry
/// per canonical group, in canonical order.
pub fn summarize<'a>(
    items: impl IntoIterator<Item = &'a InventoryItem>,
    hospital_id: AccountId,
    now: DateTime<Utc>,
) -> Vec<GroupSummary> {
    let mut out: Vec<GroupSummary> = BloodGroup::ALL
        .iter()
        .map(|&blood_group| GroupSummary {
            blood_group,
            total_quantity: 0,
            item_count: 0,
        })
        .collect();
    for item in items {
        if item.hospital_id != hospital_id || !item.is_active || item.is_expired(now) {
            continue;
        }
        if let Some(slot) = out.iter_mut().find(|s| s.blood_group == item.blood_group) {
            slot.total_quantity += u64::from(item.quantity);
            slot.item_count += 1;
        }
    }
    out
}

/// Active items of a hospital below the low-stock threshold.
pub fn low_stock<'a>(
    items: impl IntoIterator<Item = &'a InventoryItem>,
    hospital_id: AccountId,
) -> Vec<&'a InventoryItem> {
    items
        .into_iter()
        .filter(|i| i.hospital_id == hospital_id && i.is_active && i.is_low_stock())
        .collect()
}

/// Expiry alerts for one hospital.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryAlerts<'a> {
    pub expiring_soon: Vec<&'a InventoryItem>,
    pub expired: Vec<&'a InventoryItem>,
}

pub fn expiry_alerts<'a>(
    items: impl IntoIterator<Item = &'a InventoryItem>,
    hospital_id: AccountId,
    now: DateTime<Utc>,
) -> ExpiryAlerts<'a> {
    let mut alerts = ExpiryAlerts {
        expiring_soon: Vec::new(),
        expired: Vec::new(),
    };
    for item in items {
        if item.hospital_id != hospital_id || !item.is_active {
            continue;
        }
        if item.is_expired(now) {
            alerts.expired.push(item);
        } else if item.is_expiring_soon(now) {
            alerts.expiring_soon.push(item);
        }
    }
    alerts
}

/// A unit entry in search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockView {
    pub id: InventoryItemId,
    pub blood_group: BloodGroup,
    pub quantity: u32,
    pub expiry_date: DateTime<Utc>,
    pub days_until_expiry: i64,
}

/// Search results for one hospital.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HospitalStock {
    pub hospital_id: AccountId,
    pub units: Vec<StockView>,
}

/// Available units of `blood_group` across hospitals accepted by
/// `hospital_matches`. Units are ordered by quantity descending then expiry
/// ascending; hospitals appear in the order of their first unit.
pub fn search_available<'a>(
    items: impl IntoIterator<Item = &'a InventoryItem>,
    blood_group: BloodGroup,
    hospital_matches: impl Fn(AccountId) -> bool,
    now: DateTime<Utc>,
) -> Vec<HospitalStock> {
    let mut matching: Vec<&InventoryItem> = items
        .into_iter()
        .filter(|i| {
            i.blood_group == blood_group && i.is_available(now) && hospital_matches(i.hospital_id)
        })
        .collect();
    matching.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then(a.expiry_date.cmp(&b.expiry_date))
    });

    let mut grouped: Vec<HospitalStock> = Vec::new();
    for item in matching {
        let view = StockView {
            id: item.id,
            blood_group: item.blood_group,
            quantity: item.quantity,
            expiry_date: item.expiry_date,
            days_until_expiry: item.days_until_expiry(now),
        };
        match grouped.iter_mut().find(|h| h.hospital_id == item.hospital_id) {
            Some(h) => h.units.push(view),
            None => grouped.push(HospitalStock {
                hospital_id: item.hospital_id,
                units: vec![view],
            }),
        }
    }
    grouped
}

/// Listing order: blood group, then earliest expiry.
pub fn sort_for_listing(items: &mut [InventoryItem]) {
    items.sort_by(|a, b| {
        a.blood_group
            .cmp(&b.blood_group)
            .then(a.expiry_date.cmp(&b.expiry_date))
    });
}

// ─── Tests ───────────────────────────────────────────────────────────
