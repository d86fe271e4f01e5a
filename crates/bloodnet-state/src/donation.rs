//! # Donation Records
//!
//! A donation links a donor to the hospital that collected it. Recording a
//! donation is gated by the donor eligibility rule; a donation recorded as
//! `completed` also updates the donor and adds a batch to the hospital's
//! inventory. That fan-out is orchestrated by the API layer; this module
//! supplies the pieces: the gate, the record, and the derived batch token.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bloodnet_core::{
    validate_bounded_text, AccountId, BloodGroup, DonationId, ValidationError,
};

use crate::account::{Account, Role};
use crate::inventory::{InventoryItem, NOTES_MAX_CHARS};

const BATCH_MAX_CHARS: usize = 100;
const REASON_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationType {
    #[default]
    WholeBlood,
    Plasma,
    Platelets,
    DoubleRedCells,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    #[default]
    Completed,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodPressure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systolic: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diastolic: Option<f64>,
}

/// Health measurements taken at collection time. All optional, all
/// non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vitals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hemoglobin: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blood_pressure: Option<BloodPressure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulse: Option<f64>,
}

impl Vitals {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let bp = self.blood_pressure.unwrap_or_default();
        let readings = [
            ("hemoglobin", self.hemoglobin),
            ("bloodPressure.systolic", bp.systolic),
            ("bloodPressure.diastolic", bp.diastolic),
            ("weight", self.weight),
            ("pulse", self.pulse),
        ];
        for (field, value) in readings {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(ValidationError::invalid(field, "cannot be negative"));
                }
            }
        }
        Ok(())
    }

    /// Overwrite the readings present in `other`.
    fn overlay(&mut self, other: Vitals) {
        if other.hemoglobin.is_some() {
            self.hemoglobin = other.hemoglobin;
        }
        if other.blood_pressure.is_some() {
            self.blood_pressure = other.blood_pressure;
        }
        if other.weight.is_some() {
            self.weight = other.weight;
        }
        if other.pulse.is_some() {
            self.pulse = other.pulse;
        }
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DonationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No active donor account with this id.
    #[error("donor {donor_id} not found")]
    DonorNotFound { donor_id: AccountId },

    /// The donor donated less than 90 days ago.
    #[error("donor is not eligible to donate; must wait 90 days since last donation ({days_remaining} days remaining)")]
    NotEligible {
        donor_id: AccountId,
        days_remaining: i64,
    },
}

/// Donation gate: the account must be an active donor past the 90-day
/// interval.
pub fn check_donor(donor: Option<&Account>, donor_id: AccountId, now: DateTime<Utc>) -> Result<(), DonationError> {
    let donor = donor
        .filter(|d| d.is_active_with_role(Role::Donor))
        .ok_or(DonationError::DonorNotFound { donor_id })?;
    if !donor.is_eligible_to_donate(now) {
        return Err(DonationError::NotEligible {
            donor_id,
            days_remaining: donor.days_until_eligible(now),
        });
    }
    Ok(())
}

// ─── Record ──────────────────────────────────────────────────────────

/// Input for recording a donation.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub donor_id: AccountId,
    pub blood_group: BloodGroup,
    pub quantity: Option<i64>,
    pub donation_date: Option<DateTime<Utc>>,
    pub vitals: Vitals,
    pub donation_type: Option<DonationType>,
    pub batch_number: Option<String>,
    pub status: Option<DonationStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: DonationId,
    pub donor_id: AccountId,
    pub hospital_id: AccountId,
    pub blood_group: BloodGroup,
    pub quantity: u32,
    pub donation_date: DateTime<Utc>,
    #[serde(flatten)]
    pub vitals: Vitals,
    pub donation_type: DonationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<String>,
    pub status: DonationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn optional_text(
    field: &'static str,
    value: Option<String>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match value {
        None => Ok(None),
        Some(v) => Ok(Some(validate_bounded_text(field, &v, max)?).filter(|v| !v.is_empty())),
    }
}

impl Donation {
    /// Validate and build a donation collected by `hospital_id`.
    pub fn record(
        input: NewDonation,
        hospital_id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Self, DonationError> {
        let quantity = match input.quantity.unwrap_or(1) {
            q if q < 1 => return Err(ValidationError::invalid("quantity", "must be at least 1").into()),
            q => u32::try_from(q).map_err(|_| ValidationError::invalid("quantity", "is too large"))?,
        };
        input.vitals.validate()?;
        Ok(Self {
            id: DonationId::new(),
            donor_id: input.donor_id,
            hospital_id,
            blood_group: input.blood_group,
            quantity,
            donation_date: input.donation_date.unwrap_or(now),
            vitals: input.vitals,
            donation_type: input.donation_type.unwrap_or_default(),
            batch_number: optional_text("batchNumber", input.batch_number, BATCH_MAX_CHARS)?,
            status: input.status.unwrap_or_default(),
            rejection_reason: None,
            notes: optional_text("notes", input.notes, NOTES_MAX_CHARS)?,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_completed(&self) -> bool {
        self.status == DonationStatus::Completed
    }

    /// Batch token for the inventory item this donation produces: the
    /// caller-supplied batch number, else `DON-` plus the tail of the id.
    pub fn inventory_batch_number(&self) -> String {
        self.batch_number
            .clone()
            .unwrap_or_else(|| derived_batch_number(self.id))
    }

    /// The inventory item a completed donation adds at its hospital.
    pub fn to_inventory_item(&self, donor_name: &str, now: DateTime<Utc>) -> InventoryItem {
        InventoryItem::from_donation(
            self.hospital_id,
            self.blood_group,
            self.quantity,
            self.inventory_batch_number(),
            format!("From donation by {donor_name}"),
            now,
        )
    }

    pub fn apply_amendment(
        &mut self,
        amendment: DonationAmendment,
        now: DateTime<Utc>,
    ) -> Result<(), DonationError> {
        amendment.vitals.validate()?;
        let notes = match amendment.notes {
            Some(n) => Some(optional_text("notes", Some(n), NOTES_MAX_CHARS)?),
            None => None,
        };
        let reason = optional_text("rejectionReason", amendment.rejection_reason, REASON_MAX_CHARS)?;

        self.vitals.overlay(amendment.vitals);
        if let Some(n) = notes {
            self.notes = n;
        }
        if let Some(status) = amendment.status {
            self.status = status;
            if status == DonationStatus::Rejected && reason.is_some() {
                self.rejection_reason = reason;
            }
        }
        self.updated_at = now;
        Ok(())
    }
}

/// `DON-` followed by the last eight hex digits of the id, upper-cased.
pub fn derived_batch_number(id: DonationId) -> String {
    let simple = id.as_uuid().simple().to_string();
    let tail = &simple[simple.len().saturating_sub(8)..];
    format!("DON-{}", tail.to_ascii_uppercase())
}

/// Partial update by the collecting hospital or an administrator.
#[derive(Debug, Clone, Default)]
pub struct DonationAmendment {
    pub vitals: Vitals,
    pub notes: Option<String>,
    pub status: Option<DonationStatus>,
    pub rejection_reason: Option<String>,
}

// ─── Statistics ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeCount {
    pub donation_type: DonationType,
    pub count: usize,
}

/// A donor's own totals over completed donations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorDonationStats {
    pub total_donations: usize,
    pub total_units: u64,
    pub last_donation: Option<DateTime<Utc>>,
    pub donations_by_type: Vec<TypeCount>,
}

pub fn donor_stats<'a>(
    donations: impl IntoIterator<Item = &'a Donation>,
    donor_id: AccountId,
) -> DonorDonationStats {
    let mut stats = DonorDonationStats {
        total_donations: 0,
        total_units: 0,
        last_donation: None,
        donations_by_type: Vec::new(),
    };
    for d in donations
        .into_iter()
        .filter(|d| d.donor_id == donor_id && d.is_completed())
    {
        stats.total_donations += 1;
        stats.total_units += u64::from(d.quantity);
        stats.last_donation = stats.last_donation.max(Some(d.donation_date));
        match stats
            .donations_by_type
            .iter_mut()
            .find(|t| t.donation_type == d.donation_type)
        {
            Some(t) => t.count += 1,
            None => stats.donations_by_type.push(TypeCount {
                donation_type: d.donation_type,
                count: 1,
            }),
        }
    }
    stats.donations_by_type.sort_by_key(|t| t.donation_type);
    stats
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupTally {
    pub blood_group: BloodGroup,
    pub total_donations: usize,
    pub total_units: u64,
}

/// Completed donations per blood group, most donations first. Groups with no
/// donations are omitted.
pub fn group_tallies<'a>(donations: impl IntoIterator<Item = &'a Donation>) -> Vec<GroupTally> {
    let mut out: Vec<GroupTally> = Vec::new();
    for d in donations.into_iter().filter(|d| d.is_completed()) {
        match out.iter_mut().find(|t| t.blood_group == d.blood_group) {
            Some(t) => {
                t.total_donations += 1;
                t.total_units += u64::from(d.quantity);
            }
            None => out.push(GroupTally {
                blood_group: d.blood_group,
                total_donations: 1,
                total_units: u64::from(d.quantity),
            }),
        }
    }
    out.sort_by(|a, b| {
        b.total_donations
            .cmp(&a.total_donations)
            .then(a.blood_group.cmp(&b.blood_group))
    });
    out
}

/// Midnight UTC on the first day of `now`'s month.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

/// Completed donations dated between the start of the month and `now`.
pub fn completed_this_month<'a>(
    donations: impl IntoIterator<Item = &'a Donation>,
    now: DateTime<Utc>,
) -> usize {
    let start = month_start(now);
    donations
        .into_iter()
        .filter(|d| d.is_completed() && d.donation_date >= start && d.donation_date <= now)
        .count()
}

/// Newest first by donation date.
pub fn sort_newest_first(donations: &mut [Donation]) {
    donations.sort_by(|a, b| b.donation_date.cmp(&a.donation_date));
}

// ─── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Location, Registration};
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    fn donor() -> Account {
        Account::register(
            Registration {
                name: "Ravi".into(),
                email: "ravi@example.com".into(),
                password: "secret1".into(),
                phone: "9876543210".into(),
                role: Role::Donor,
                blood_group: Some(BloodGroup::OPositive),
                location: Location {
                    city: "Pune".into(),
                    state: "MH".into(),
                    address: None,
                },
                hospital_name: None,
                registration_number: None,
            },
            now(),
        )
        .unwrap()
    }

    fn new_donation(donor_id: AccountId) -> NewDonation {
        NewDonation {
            donor_id,
            blood_group: BloodGroup::OPositive,
            quantity: None,
            donation_date: None,
            vitals: Vitals::default(),
            donation_type: None,
            batch_number: None,
            status: None,
            notes: None,
        }
    }

    fn completed(hospital: AccountId, group: BloodGroup, quantity: i64, at: DateTime<Utc>) -> Donation {
        let mut input = new_donation(AccountId::new());
        input.blood_group = group;
        input.quantity = Some(quantity);
        input.donation_date = Some(at);
        Donation::record(input, hospital, at).unwrap()
    }

    #[test]
    fn record_applies_defaults() {
        let d = Donation::record(new_donation(AccountId::new()), AccountId::new(), now()).unwrap();
        assert_eq!(d.quantity, 1);
        assert_eq!(d.status, DonationStatus::Completed);
        assert_eq!(d.donation_type, DonationType::WholeBlood);
        assert_eq!(d.donation_date, now());
    }

    #[test]
    fn record_rejects_negative_vitals() {
        let mut input = new_donation(AccountId::new());
        input.vitals.blood_pressure = Some(BloodPressure {
            systolic: Some(120.0),
            diastolic: Some(-1.0),
        });
        let err = Donation::record(input, AccountId::new(), now()).unwrap_err();
        assert!(matches!(
            err,
            DonationError::Validation(ValidationError::InvalidField {
                field: "bloodPressure.diastolic",
                ..
            })
        ));
    }

    #[test]
    fn record_rejects_zero_quantity() {
        let mut input = new_donation(AccountId::new());
        input.quantity = Some(0);
        assert!(Donation::record(input, AccountId::new(), now()).is_err());
    }

    #[test]
    fn gate_requires_active_eligible_donor() {
        let mut d = donor();
        assert!(check_donor(Some(&d), d.id, now()).is_ok());
        assert_eq!(
            check_donor(None, d.id, now()),
            Err(DonationError::DonorNotFound { donor_id: d.id })
        );

        d.record_donation(now() - Duration::days(89), now()).unwrap();
        assert_eq!(
            check_donor(Some(&d), d.id, now()),
            Err(DonationError::NotEligible {
                donor_id: d.id,
                days_remaining: 1
            })
        );

        d.record_donation(now() - Duration::days(90), now()).unwrap();
        assert!(check_donor(Some(&d), d.id, now()).is_ok());

        d.is_active = false;
        assert!(matches!(
            check_donor(Some(&d), d.id, now()),
            Err(DonationError::DonorNotFound { .. })
        ));
    }

    #[test]
    fn derived_batch_uses_id_tail() {
        let id = DonationId::from_uuid(
            uuid::Uuid::parse_str("123e4567-e89b-12d3-a456-426614174abc").unwrap(),
        );
        assert_eq!(derived_batch_number(id), "DON-14174ABC");
    }

    #[test]
    fn inventory_item_carries_donation_details() {
        let hospital = AccountId::new();
        let d = Donation::record(new_donation(AccountId::new()), hospital, now()).unwrap();
        let item = d.to_inventory_item("Ravi", now());
        assert_eq!(item.hospital_id, hospital);
        assert_eq!(item.quantity, 1);
        assert_eq!(item.blood_group, BloodGroup::OPositive);
        assert_eq!(item.batch_number, Some(derived_batch_number(d.id)));
        assert_eq!(item.notes.as_deref(), Some("From donation by Ravi"));
        assert_eq!(item.days_until_expiry(now()), 42);
    }

    #[test]
    fn amendment_stores_reason_only_when_rejected() {
        let mut d = Donation::record(new_donation(AccountId::new()), AccountId::new(), now()).unwrap();
        d.apply_amendment(
            DonationAmendment {
                status: Some(DonationStatus::Pending),
                rejection_reason: Some("low hemoglobin".into()),
                ..Default::default()
            },
            now(),
        )
        .unwrap();
        assert_eq!(d.rejection_reason, None);

        d.apply_amendment(
            DonationAmendment {
                vitals: Vitals {
                    hemoglobin: Some(11.2),
                    ..Default::default()
                },
                status: Some(DonationStatus::Rejected),
                rejection_reason: Some("low hemoglobin".into()),
                ..Default::default()
            },
            now(),
        )
        .unwrap();
        assert_eq!(d.status, DonationStatus::Rejected);
        assert_eq!(d.rejection_reason.as_deref(), Some("low hemoglobin"));
        assert_eq!(d.vitals.hemoglobin, Some(11.2));
    }

    #[test]
    fn stats_count_only_completed() {
        let hospital = AccountId::new();
        let mut a = completed(hospital, BloodGroup::APositive, 2, now());
        let b = completed(hospital, BloodGroup::APositive, 1, now() - Duration::days(20));
        let c = completed(hospital, BloodGroup::OPositive, 1, now() - Duration::days(2));
        let mut pending = completed(hospital, BloodGroup::ONegative, 1, now());
        pending.status = DonationStatus::Pending;
        a.donor_id = b.donor_id;
        let all = vec![a.clone(), b.clone(), c, pending];

        let tallies = group_tallies(&all);
        assert_eq!(tallies.len(), 2);
        assert_eq!(tallies[0].blood_group, BloodGroup::APositive);
        assert_eq!((tallies[0].total_donations, tallies[0].total_units), (2, 3));

        assert_eq!(completed_this_month(&all, now()), 2);

        let mine = donor_stats(&all, b.donor_id);
        assert_eq!(mine.total_donations, 2);
        assert_eq!(mine.total_units, 3);
        assert_eq!(mine.last_donation, Some(now()));
        assert_eq!(
            mine.donations_by_type,
            vec![TypeCount {
                donation_type: DonationType::WholeBlood,
                count: 2
            }]
        );
    }

    #[test]
    fn month_start_is_first_midnight() {
        assert_eq!(
            month_start(now()),
            Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn serde_shape_flattens_vitals() {
        let mut input = new_donation(AccountId::new());
        input.vitals.hemoglobin = Some(13.5);
        let d = Donation::record(input, AccountId::new(), now()).unwrap();
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["hemoglobin"], 13.5);
        assert_eq!(json["donationType"], "whole_blood");
        assert_eq!(json["status"], "completed");
        let back: Donation = serde_json::from_value(json).unwrap();
        assert_eq!(back, d);
    }
}
