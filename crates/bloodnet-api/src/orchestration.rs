//! # Write Orchestration
//!
//! Every mutation of the stores goes through this module. Each operation
//! takes the process-wide workflow lock, validates against current state,
//! stages the new records, persists them in one database transaction, and
//! only then publishes them to the in-memory stores. A failed commit leaves
//! the stores untouched. Reads never take the lock.
//!
//! ## Multi-entity workflows
//!
//! - **Donation**: donation record → donor (last donation, unavailable) →
//!   new inventory batch at the collecting hospital. The fan-out only runs
//!   for donations recorded as `completed`.
//! - **Approval**: request transition → deduction from the approving
//!   hospital's earliest-expiring batch large enough to cover the request.
//!   With no such batch the [`ApprovalStockPolicy`] decides.
//! - **Restock**: merge into an existing batch (same hospital, blood group
//!   and batch number) or create a new one.
//!
//! Authorization by role happens in the route layer; ownership checks that
//! need the stored record happen here, under the lock.

use std::collections::HashSet;

use bloodnet_core::{normalize_email, AccountId, DonationId, InventoryItemId, RequestId};
use bloodnet_state::inventory::{find_merge_target, select_batch_for_deduction};
use bloodnet_state::{
    check_donor, Account, AccountUpdate, Donation, DonationAmendment, EmergencyRequest,
    InventoryItem, ItemUpdate, NewDonation, NewRequest, NewStock, ProfileUpdate, Registration,
    RequestError, RequestStatus, Role,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::CallerIdentity;
use crate::db::{Collection, WriteSet};
use crate::error::AppError;
use crate::state::{AppState, ApprovalStockPolicy, EMAIL_TAKEN};
use crate::views::AccountSummary;

fn not_found(what: &str) -> AppError {
    AppError::NotFound(format!("{what} not found"))
}

// ── Accounts ─────────────────────────────────────────────────────────────────

/// Validate and store a new account. Emails are unique across all roles.
pub async fn register_account(
    state: &AppState,
    registration: Registration,
    now: DateTime<Utc>,
) -> Result<Account, AppError> {
    let account = Account::register(registration, now)?;

    let _guard = state.workflow_lock.lock().await;
    if state.account_by_email(&account.email).is_some() {
        return Err(AppError::validation(EMAIL_TAKEN));
    }
    state.persist(WriteSet::new().account(&account)).await?;
    state.accounts.insert(account.id, account.clone());

    tracing::info!(account_id = %account.id, role = %account.role(), "account registered");
    Ok(account)
}

/// Check credentials and open a session. Returns the account and its token.
pub fn login(
    state: &AppState,
    email: &str,
    password: &str,
    now: DateTime<Utc>,
) -> Result<(Account, String), AppError> {
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());
    let account = state
        .account_by_email(&normalize_email(email))
        .ok_or_else(invalid)?;
    if !account.verify_password(password) {
        tracing::warn!(account_id = %account.id, "login failed: wrong password");
        return Err(invalid());
    }
    if !account.is_active {
        tracing::warn!(account_id = %account.id, "login refused: account deactivated");
        return Err(AppError::Unauthorized("Account is deactivated".to_string()));
    }
    let token = state
        .sessions
        .issue(account.id, state.config.session_ttl, now);
    tracing::info!(account_id = %account.id, "session opened");
    Ok((account, token))
}

pub async fn update_profile(
    state: &AppState,
    caller: &CallerIdentity,
    update: ProfileUpdate,
    now: DateTime<Utc>,
) -> Result<Account, AppError> {
    let _guard = state.workflow_lock.lock().await;
    let mut account = state
        .accounts
        .get(&caller.account_id)
        .ok_or_else(|| not_found("User"))?;
    account.apply_profile_update(update, now)?;
    state.persist(WriteSet::new().account(&account)).await?;
    state.accounts.insert(account.id, account.clone());
    tracing::info!(account_id = %account.id, "profile updated");
    Ok(account)
}

/// Replace the caller's password after verifying the current one.
pub async fn change_password(
    state: &AppState,
    caller: &CallerIdentity,
    current: &str,
    new: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let _guard = state.workflow_lock.lock().await;
    let mut account = state
        .accounts
        .get(&caller.account_id)
        .ok_or_else(|| not_found("User"))?;
    if !account.verify_password(current) {
        tracing::warn!(account_id = %account.id, "password change refused: wrong current password");
        return Err(AppError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }
    account.set_password(new, now)?;
    state.persist(WriteSet::new().account(&account)).await?;
    state.accounts.insert(account.id, account);
    tracing::info!(account_id = %caller.account_id, "password changed");
    Ok(())
}

/// Administrative edit. A changed email must stay unique.
pub async fn update_account(
    state: &AppState,
    id: AccountId,
    update: AccountUpdate,
    now: DateTime<Utc>,
) -> Result<Account, AppError> {
    let _guard = state.workflow_lock.lock().await;
    if let Some(email) = &update.email {
        let email = normalize_email(email);
        if state.account_by_email(&email).is_some_and(|a| a.id != id) {
            return Err(AppError::validation(EMAIL_TAKEN));
        }
    }
    let mut account = state.accounts.get(&id).ok_or_else(|| not_found("User"))?;
    account.apply_admin_update(update, now)?;
    state.persist(WriteSet::new().account(&account)).await?;
    state.accounts.insert(id, account.clone());
    if !account.is_active {
        state.sessions.revoke_account(id);
    }
    tracing::info!(account_id = %id, active = account.is_active, "account updated by admin");
    Ok(account)
}

/// Hard delete. Administrator accounts cannot be deleted.
pub async fn delete_account(state: &AppState, id: AccountId) -> Result<(), AppError> {
    let _guard = state.workflow_lock.lock().await;
    let account = state.accounts.get(&id).ok_or_else(|| not_found("User"))?;
    if account.role() == Role::Admin {
        return Err(AppError::Forbidden("Cannot delete admin users".to_string()));
    }
    state
        .persist(WriteSet::new().delete(Collection::Accounts, *id.as_uuid()))
        .await?;
    state.accounts.remove(&id);
    let sessions = state.sessions.revoke_account(id);
    tracing::info!(account_id = %id, sessions, "account deleted");
    Ok(())
}

// ── Inventory ────────────────────────────────────────────────────────────────

/// Result of a restock.
#[derive(Debug, Clone)]
pub struct StockOutcome {
    pub item: InventoryItem,
    /// True when the stock was folded into an existing batch.
    pub merged: bool,
}

pub async fn add_stock(
    state: &AppState,
    hospital_id: AccountId,
    stock: NewStock,
    now: DateTime<Utc>,
) -> Result<StockOutcome, AppError> {
    let _guard = state.workflow_lock.lock().await;
    let target = state
        .inventory
        .read(|all| find_merge_target(all.values(), hospital_id, &stock));

    let outcome = match target {
        Some(id) => {
            let mut item = state
                .inventory
                .get(&id)
                .ok_or_else(|| not_found("Inventory item"))?;
            item.merge(stock, now)?;
            StockOutcome { item, merged: true }
        }
        None => StockOutcome {
            item: InventoryItem::from_new(hospital_id, stock, now)?,
            merged: false,
        },
    };
    state.persist(WriteSet::new().item(&outcome.item)).await?;
    state
        .inventory
        .insert(outcome.item.id, outcome.item.clone());

    tracing::info!(
        item_id = %outcome.item.id,
        hospital_id = %hospital_id,
        blood_group = %outcome.item.blood_group,
        quantity = outcome.item.quantity,
        merged = outcome.merged,
        "stock added"
    );
    Ok(outcome)
}

fn owned_item(
    state: &AppState,
    caller: &CallerIdentity,
    id: InventoryItemId,
) -> Result<InventoryItem, AppError> {
    let item = state
        .inventory
        .get(&id)
        .ok_or_else(|| not_found("Inventory item"))?;
    if !caller.is_admin() && item.hospital_id != caller.account_id {
        return Err(AppError::Forbidden(
            "Not authorized to modify this inventory item".to_string(),
        ));
    }
    Ok(item)
}

/// Manual edit by the owning hospital or an administrator.
pub async fn update_stock(
    state: &AppState,
    caller: &CallerIdentity,
    id: InventoryItemId,
    update: ItemUpdate,
    now: DateTime<Utc>,
) -> Result<InventoryItem, AppError> {
    let _guard = state.workflow_lock.lock().await;
    let mut item = owned_item(state, caller, id)?;
    item.apply_update(update, now)?;
    state.persist(WriteSet::new().item(&item)).await?;
    state.inventory.insert(id, item.clone());
    tracing::info!(item_id = %id, quantity = item.quantity, "stock updated");
    Ok(item)
}

/// Soft delete: the item stays on record, inactive.
pub async fn remove_stock(
    state: &AppState,
    caller: &CallerIdentity,
    id: InventoryItemId,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let _guard = state.workflow_lock.lock().await;
    let mut item = owned_item(state, caller, id)?;
    item.deactivate(now);
    state.persist(WriteSet::new().item(&item)).await?;
    state.inventory.insert(id, item);
    tracing::info!(item_id = %id, "stock removed");
    Ok(())
}

// ── Donations ────────────────────────────────────────────────────────────────

/// Result of recording a donation.
#[derive(Debug, Clone)]
pub struct RecordedDonation {
    pub donation: Donation,
    /// The batch added to the hospital's inventory, for completed donations.
    pub inventory_item: Option<InventoryItem>,
}

/// Record a donation collected by `hospital_id`.
///
/// The donor must be an active donor past the 90-day interval. A completed
/// donation also marks the donor unavailable with a new last-donation date
/// and adds a 42-day batch to the hospital's inventory.
pub async fn record_donation(
    state: &AppState,
    hospital_id: AccountId,
    input: NewDonation,
    now: DateTime<Utc>,
) -> Result<RecordedDonation, AppError> {
    let _guard = state.workflow_lock.lock().await;
    let donor_id = input.donor_id;
    let donor = state.accounts.get(&donor_id);
    check_donor(donor.as_ref(), donor_id, now)?;
    let mut donor = donor.ok_or_else(|| not_found("Donor"))?;

    let donation = Donation::record(input, hospital_id, now)?;
    let mut writes = WriteSet::new().donation(&donation);
    let mut inventory_item = None;
    if donation.is_completed() {
        donor.record_donation(donation.donation_date, now)?;
        let item = donation.to_inventory_item(&donor.name, now);
        writes = writes.account(&donor).item(&item);
        inventory_item = Some(item);
    }

    state.persist(writes).await?;
    state.donations.insert(donation.id, donation.clone());
    if let Some(item) = &inventory_item {
        state.accounts.insert(donor.id, donor);
        state.inventory.insert(item.id, item.clone());
    }

    tracing::info!(
        donation_id = %donation.id,
        donor_id = %donor_id,
        hospital_id = %hospital_id,
        status = ?donation.status,
        inventory_item = ?inventory_item.as_ref().map(|i| i.id),
        "donation recorded"
    );
    Ok(RecordedDonation {
        donation,
        inventory_item,
    })
}

/// Amend vitals, notes or status. Owning hospital or administrator only.
pub async fn amend_donation(
    state: &AppState,
    caller: &CallerIdentity,
    id: DonationId,
    amendment: DonationAmendment,
    now: DateTime<Utc>,
) -> Result<Donation, AppError> {
    let _guard = state.workflow_lock.lock().await;
    let mut donation = state
        .donations
        .get(&id)
        .ok_or_else(|| not_found("Donation"))?;
    if !caller.is_admin() && donation.hospital_id != caller.account_id {
        return Err(AppError::Forbidden(
            "Not authorized to update this donation".to_string(),
        ));
    }
    donation.apply_amendment(amendment, now)?;
    state.persist(WriteSet::new().donation(&donation)).await?;
    state.donations.insert(id, donation.clone());
    tracing::info!(donation_id = %id, status = ?donation.status, "donation updated");
    Ok(donation)
}

pub async fn delete_donation(state: &AppState, id: DonationId) -> Result<(), AppError> {
    let _guard = state.workflow_lock.lock().await;
    if !state.donations.contains(&id) {
        return Err(not_found("Donation"));
    }
    state
        .persist(WriteSet::new().delete(Collection::Donations, *id.as_uuid()))
        .await?;
    state.donations.remove(&id);
    tracing::info!(donation_id = %id, "donation deleted");
    Ok(())
}

// ── Requests ─────────────────────────────────────────────────────────────────

/// A hospital holding enough of the requested group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HospitalMatch {
    pub hospital: AccountSummary,
    pub available_quantity: u32,
}

/// A newly opened request with the informational matching results.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedRequest {
    pub request: EmergencyRequest,
    pub matching_hospitals: Vec<HospitalMatch>,
    pub matching_donors_count: usize,
}

/// Hospitals with a single available batch covering the request, largest
/// batch first, one entry per hospital.
pub fn matching_hospitals(
    state: &AppState,
    request: &EmergencyRequest,
    now: DateTime<Utc>,
) -> Vec<HospitalMatch> {
    let mut batches: Vec<(AccountId, u32)> = state.inventory.read(|all| {
        all.values()
            .filter(|i| {
                i.blood_group == request.blood_group
                    && i.is_available(now)
                    && i.quantity >= request.quantity
            })
            .map(|i| (i.hospital_id, i.quantity))
            .collect()
    });
    batches.sort_by(|a, b| b.1.cmp(&a.1));

    let mut seen = HashSet::new();
    state.accounts.read(|accounts| {
        batches
            .into_iter()
            .filter(|(hospital_id, _)| seen.insert(*hospital_id))
            .filter_map(|(hospital_id, available_quantity)| {
                accounts
                    .get(&hospital_id)
                    .filter(|h| h.is_active_with_role(Role::Hospital))
                    .map(|h| HospitalMatch {
                        hospital: AccountSummary::from(h),
                        available_quantity,
                    })
            })
            .collect()
    })
}

/// Active, available donors of the requested group in the request's city.
pub fn matching_donors_count(state: &AppState, request: &EmergencyRequest) -> usize {
    let city = request.location.city.to_lowercase();
    state.accounts.read(|accounts| {
        accounts
            .values()
            .filter(|a| {
                a.is_active_with_role(Role::Donor)
                    && a.is_available()
                    && a.blood_group() == Some(request.blood_group)
                    && a.location.city.to_lowercase() == city
            })
            .count()
    })
}

pub async fn open_request(
    state: &AppState,
    patient_id: AccountId,
    input: NewRequest,
    now: DateTime<Utc>,
) -> Result<OpenedRequest, AppError> {
    let request = EmergencyRequest::open(patient_id, input, now)?;
    {
        let _guard = state.workflow_lock.lock().await;
        state.persist(WriteSet::new().request(&request)).await?;
        state.requests.insert(request.id, request.clone());
    }
    tracing::info!(
        request_id = %request.id,
        patient_id = %patient_id,
        blood_group = %request.blood_group,
        urgency = request.urgency_level.as_str(),
        "request opened"
    );
    Ok(OpenedRequest {
        matching_hospitals: matching_hospitals(state, &request, now),
        matching_donors_count: matching_donors_count(state, &request),
        request,
    })
}

/// Requested status change.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub status: RequestStatus,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    /// Administrators may name the hospital acting on the request.
    pub hospital_id: Option<AccountId>,
}

/// Result of a status change.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub request: EmergencyRequest,
    /// For approvals: whether stock was deducted.
    pub inventory_deducted: Option<bool>,
}

/// Move a request along its lifecycle on behalf of a hospital or an
/// administrator. Approval deducts stock from the approving hospital.
pub async fn transition_request(
    state: &AppState,
    caller: &CallerIdentity,
    id: RequestId,
    change: StatusChange,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, AppError> {
    let _guard = state.workflow_lock.lock().await;
    let current = state.requests.get(&id).ok_or_else(|| not_found("Request"))?;
    if current.status.is_terminal() {
        return Err(RequestError::AlreadyTerminal {
            request_id: id,
            status: current.status,
        }
        .into());
    }

    let acting_hospital = match caller.role {
        Role::Hospital => {
            if change.hospital_id.is_some_and(|h| h != caller.account_id) {
                return Err(AppError::Forbidden(
                    "Hospitals can only act on their own behalf".to_string(),
                ));
            }
            if !current.hospital_may_act(caller.account_id) {
                return Err(AppError::Forbidden(
                    "Not authorized to update this request".to_string(),
                ));
            }
            Some(caller.account_id)
        }
        Role::Admin => match change.hospital_id {
            Some(h) => Some(state.active_hospital(h)?.id),
            None => current.assigned_hospital,
        },
        _ => {
            return Err(AppError::Forbidden(
                "Not authorized to update this request".to_string(),
            ))
        }
    };

    let mut next = current.clone();
    let mut deducted_item: Option<InventoryItem> = None;
    let mut inventory_deducted = None;
    match change.status {
        RequestStatus::Approved => {
            let hospital_id = acting_hospital.ok_or_else(|| {
                AppError::validation("hospitalId is required to approve an unassigned request")
            })?;
            next.approve(hospital_id, caller.account_id, now)?;
            let batch = state.inventory.read(|all| {
                select_batch_for_deduction(
                    all.values(),
                    hospital_id,
                    next.blood_group,
                    next.quantity,
                    now,
                )
                .and_then(|item_id| all.get(&item_id).cloned())
            });
            match (batch, state.config.approval_stock_policy) {
                (Some(mut item), _) => {
                    item.deduct(next.quantity, now)?;
                    deducted_item = Some(item);
                    inventory_deducted = Some(true);
                }
                (None, ApprovalStockPolicy::Strict) => {
                    return Err(AppError::validation(format!(
                        "Insufficient {} stock: no batch with at least {} units",
                        next.blood_group, next.quantity
                    )));
                }
                (None, ApprovalStockPolicy::Lenient) => {
                    tracing::warn!(
                        request_id = %id,
                        hospital_id = %hospital_id,
                        blood_group = %next.blood_group,
                        quantity = next.quantity,
                        "approved without a matching batch; inventory unchanged"
                    );
                    inventory_deducted = Some(false);
                }
            }
        }
        RequestStatus::Rejected => {
            next.reject(change.rejection_reason, caller.account_id, now)?;
        }
        RequestStatus::Completed => {
            next.complete(acting_hospital, caller.account_id, now)?;
        }
        RequestStatus::Cancelled => {
            if !caller.is_admin() {
                return Err(AppError::Forbidden(
                    "Only administrators can cancel through this endpoint".to_string(),
                ));
            }
            next.cancel(caller.account_id, now)?;
        }
        RequestStatus::Pending => {
            return Err(AppError::validation(
                "Invalid status. Must be one of: approved, rejected, completed, cancelled",
            ));
        }
    }
    next.set_notes(change.notes)?;

    let mut writes = WriteSet::new().request(&next);
    if let Some(item) = &deducted_item {
        writes = writes.item(item);
    }
    state.persist(writes).await?;
    state.requests.insert(id, next.clone());
    if let Some(item) = &deducted_item {
        state.inventory.insert(item.id, item.clone());
    }

    tracing::info!(
        request_id = %id,
        from = %current.status,
        to = %next.status,
        actor = %caller.account_id,
        deducted_from = ?deducted_item.as_ref().map(|i| i.id),
        "request transitioned"
    );
    Ok(TransitionOutcome {
        request: next,
        inventory_deducted,
    })
}

/// Cancel a pending request. Only the patient who opened it may cancel.
pub async fn cancel_request(
    state: &AppState,
    caller: &CallerIdentity,
    id: RequestId,
    now: DateTime<Utc>,
) -> Result<EmergencyRequest, AppError> {
    let _guard = state.workflow_lock.lock().await;
    let mut request = state.requests.get(&id).ok_or_else(|| not_found("Request"))?;
    if request.patient_id != caller.account_id {
        return Err(AppError::Forbidden(
            "Not authorized to cancel this request".to_string(),
        ));
    }
    request.cancel(caller.account_id, now)?;
    state.persist(WriteSet::new().request(&request)).await?;
    state.requests.insert(id, request.clone());
    tracing::info!(request_id = %id, "request cancelled by patient");
    Ok(request)
}

/// Point a request at an active hospital without changing its status.
pub async fn assign_request(
    state: &AppState,
    id: RequestId,
    hospital_id: AccountId,
    now: DateTime<Utc>,
) -> Result<EmergencyRequest, AppError> {
    let _guard = state.workflow_lock.lock().await;
    let hospital = state.active_hospital(hospital_id)?;
    let mut request = state.requests.get(&id).ok_or_else(|| not_found("Request"))?;
    request.assign(hospital.id, now);
    state.persist(WriteSet::new().request(&request)).await?;
    state.requests.insert(id, request.clone());
    tracing::info!(request_id = %id, hospital_id = %hospital_id, "request assigned");
    Ok(request)
}

pub async fn delete_request(state: &AppState, id: RequestId) -> Result<(), AppError> {
    let _guard = state.workflow_lock.lock().await;
    if !state.requests.contains(&id) {
        return Err(not_found("Request"));
    }
    state
        .persist(WriteSet::new().delete(Collection::EmergencyRequests, *id.as_uuid()))
        .await?;
    state.requests.remove(&id);
    tracing::info!(request_id = %id, "request deleted");
    Ok(())
}
