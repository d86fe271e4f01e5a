//! Response views: domain records joined with the account summaries and
//! read-time derived fields clients expect.

use std::collections::HashMap;

use bloodnet_core::{AccountId, BloodGroup};
use bloodnet_state::{Account, Donation, EmergencyRequest, InventoryItem, ItemStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// The public face of an account when referenced from another record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_group: Option<BloodGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital_name: Option<String>,
    pub city: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl From<&Account> for AccountSummary {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id,
            name: a.name.clone(),
            email: a.email.clone(),
            phone: a.phone.clone(),
            blood_group: a.blood_group(),
            hospital_name: a.hospital_name().map(String::from),
            city: a.location.city.clone(),
            state: a.location.state.clone(),
            address: a.location.address.clone(),
        }
    }
}

fn summary(accounts: &HashMap<AccountId, Account>, id: AccountId) -> Option<AccountSummary> {
    accounts.get(&id).map(AccountSummary::from)
}

/// An inventory item with its derived expiry/stock flags.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItemView {
    #[serde(flatten)]
    pub item: InventoryItem,
    #[serde(flatten)]
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hospital: Option<AccountSummary>,
}

impl InventoryItemView {
    pub fn new(item: InventoryItem, now: DateTime<Utc>) -> Self {
        let status = item.status(now);
        Self {
            item,
            status,
            hospital: None,
        }
    }

    pub fn with_hospital(
        item: InventoryItem,
        accounts: &HashMap<AccountId, Account>,
        now: DateTime<Utc>,
    ) -> Self {
        let hospital = summary(accounts, item.hospital_id);
        Self {
            hospital,
            ..Self::new(item, now)
        }
    }
}

/// A donation with donor and hospital summaries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationView {
    #[serde(flatten)]
    pub donation: Donation,
    pub donor: Option<AccountSummary>,
    pub hospital: Option<AccountSummary>,
}

impl DonationView {
    pub fn new(donation: Donation, accounts: &HashMap<AccountId, Account>) -> Self {
        Self {
            donor: summary(accounts, donation.donor_id),
            hospital: summary(accounts, donation.hospital_id),
            donation,
        }
    }
}

/// A request with its deadline fields and party summaries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    #[serde(flatten)]
    pub request: EmergencyRequest,
    pub is_overdue: bool,
    pub time_remaining: Option<String>,
    pub patient_info: Option<AccountSummary>,
    pub assigned_hospital_info: Option<AccountSummary>,
}

impl RequestView {
    pub fn new(
        request: EmergencyRequest,
        accounts: &HashMap<AccountId, Account>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            is_overdue: request.is_overdue(now),
            time_remaining: request.time_remaining(now),
            patient_info: summary(accounts, request.patient_id),
            assigned_hospital_info: request
                .assigned_hospital
                .and_then(|h| summary(accounts, h)),
            request,
        }
    }
}
