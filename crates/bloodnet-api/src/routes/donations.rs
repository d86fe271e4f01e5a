//! # Donations API
//!
//! ## Endpoints
//!
//! - `POST /api/donations`: record a donation (hospital/admin)
//! - `GET /api/donations`: donations visible to the caller
//! - `GET /api/donations/my-donations`: the calling donor's donations
//! - `GET /api/donations/hospital`: donations collected by a hospital
//! - `GET /api/donations/recent`: latest donations visible to the caller
//! - `GET /api/donations/stats`: role-dependent statistics
//! - `GET /api/donations/:id`: one donation (donor, collecting hospital, admin)
//! - `PUT /api/donations/:id`: amend vitals, notes or status
//! - `DELETE /api/donations/:id`: hard delete (admin)

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use bloodnet_core::{AccountId, BloodGroup, DonationId};
use bloodnet_state::donation::{
    completed_this_month, donor_stats, group_tallies, sort_newest_first,
};
use bloodnet_state::{
    Donation, DonationAmendment, DonationStatus, DonationType, DonorDonationStats, GroupTally,
    NewDonation, Role, Vitals,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{require_any_role, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, parse_id};
use crate::orchestration;
use crate::response::{ApiResponse, Page, DEFAULT_LIMIT, MAX_LIMIT};
use crate::routes::{blood_group_param, hospital_scope};
use crate::state::AppState;
use crate::views::{DonationView, InventoryItemView};

const COLLECTORS: &[Role] = &[Role::Hospital, Role::Admin];
const ADMIN_RECENT: usize = 10;

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct DonationQuery {
    #[serde(default, deserialize_with = "crate::response::lenient_count")]
    pub page: Option<usize>,
    #[serde(default, deserialize_with = "crate::response::lenient_count")]
    pub limit: Option<usize>,
    pub blood_group: Option<String>,
    #[param(value_type = Option<String>)]
    pub status: Option<DonationStatus>,
    /// Administrators only, for `/hospital`.
    pub hospital_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecentQuery {
    #[serde(default, deserialize_with = "crate::response::lenient_count")]
    pub limit: Option<usize>,
}

/// A donation to record.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDonationRequest {
    pub donor_id: String,
    #[schema(value_type = String)]
    pub blood_group: BloodGroup,
    /// Units; defaults to 1.
    pub quantity: Option<i64>,
    /// Defaults to now.
    pub donation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub vitals: Vitals,
    #[schema(value_type = Option<String>)]
    pub donation_type: Option<DonationType>,
    pub batch_number: Option<String>,
    /// Defaults to `completed`. Only completed donations reach inventory.
    #[schema(value_type = Option<String>)]
    pub status: Option<DonationStatus>,
    pub notes: Option<String>,
    /// Required for administrators: the collecting hospital.
    pub hospital_id: Option<String>,
}

/// Partial amendment. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDonationRequest {
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub vitals: Vitals,
    pub notes: Option<String>,
    #[schema(value_type = Option<String>)]
    pub status: Option<DonationStatus>,
    /// Stored only when `status` is `rejected`.
    pub rejection_reason: Option<String>,
}

impl From<UpdateDonationRequest> for DonationAmendment {
    fn from(req: UpdateDonationRequest) -> Self {
        Self {
            vitals: req.vitals,
            notes: req.notes,
            status: req.status,
            rejection_reason: req.rejection_reason,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedDonationResponse {
    pub donation: DonationView,
    /// The batch added at the collecting hospital, for completed donations.
    pub inventory_item: Option<InventoryItemView>,
}

/// Statistics payload; its shape depends on the caller's role.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DonationStats {
    Donor(DonorDonationStats),
    #[serde(rename_all = "camelCase")]
    Hospital {
        by_blood_group: Vec<GroupTally>,
        total: usize,
        this_month: usize,
    },
    #[serde(rename_all = "camelCase")]
    Admin {
        by_blood_group: Vec<GroupTally>,
        total: usize,
        this_month: usize,
        recent: Vec<DonationView>,
    },
}

fn with_parties(state: &AppState, donations: Vec<Donation>) -> Vec<DonationView> {
    state.accounts.read(|accounts| {
        donations
            .into_iter()
            .map(|d| DonationView::new(d, accounts))
            .collect()
    })
}

/// Donations `caller` may list: their own as donor, their collections as
/// hospital, everything as administrator.
fn visible_to(caller: &CallerIdentity, d: &Donation) -> bool {
    match caller.role {
        Role::Admin => true,
        Role::Hospital => d.hospital_id == caller.account_id,
        Role::Donor => d.donor_id == caller.account_id,
        Role::Patient => false,
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/donations", get(list_donations).post(create_donation))
        .route("/api/donations/my-donations", get(my_donations))
        .route("/api/donations/hospital", get(hospital_donations))
        .route("/api/donations/recent", get(recent_donations))
        .route("/api/donations/stats", get(donation_stats))
        .route(
            "/api/donations/:id",
            get(get_donation).put(update_donation).delete(delete_donation),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /api/donations: Record a donation.
///
/// A completed donation also marks the donor unavailable and adds a 42-day
/// batch to the collecting hospital's inventory.
#[utoipa::path(
    post,
    path = "/api/donations",
    request_body = CreateDonationRequest,
    responses(
        (status = 201, description = "Donation recorded"),
        (status = 400, description = "Validation error or donor not eligible", body = crate::error::ErrorBody),
        (status = 404, description = "Donor not found", body = crate::error::ErrorBody),
    ),
    tag = "donations"
)]
async fn create_donation(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateDonationRequest>, JsonRejection>,
) -> Result<ApiResponse<RecordedDonationResponse>, AppError> {
    require_any_role(&caller, COLLECTORS)?;
    let req = extract_json(body)?;
    let hospital_id = hospital_scope(&state, &caller, req.hospital_id.as_deref())?;
    let donor_id: AccountId = parse_id(&req.donor_id, "Donor")?;
    let now = Utc::now();

    let input = NewDonation {
        donor_id,
        blood_group: req.blood_group,
        quantity: req.quantity,
        donation_date: req.donation_date,
        vitals: req.vitals,
        donation_type: req.donation_type,
        batch_number: req.batch_number,
        status: req.status,
        notes: req.notes,
    };
    let recorded = orchestration::record_donation(&state, hospital_id, input, now).await?;
    let donation = state
        .accounts
        .read(|accounts| DonationView::new(recorded.donation, accounts));
    Ok(ApiResponse::created(RecordedDonationResponse {
        donation,
        inventory_item: recorded
            .inventory_item
            .map(|item| InventoryItemView::new(item, now)),
    })
    .with_message("Donation recorded successfully"))
}

/// GET /api/donations: Donations visible to the caller, newest first.
#[utoipa::path(
    get,
    path = "/api/donations",
    params(DonationQuery),
    responses((status = 200, description = "One page of donations")),
    tag = "donations"
)]
async fn list_donations(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<DonationQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<DonationView>>, AppError> {
    require_any_role(&caller, &[Role::Donor, Role::Hospital, Role::Admin])?;
    let q = extract_query(query)?;
    let group = blood_group_param(q.blood_group.as_deref())?;
    let mut donations = state.donations.filter(|d| {
        visible_to(&caller, d)
            && group.map_or(true, |g| d.blood_group == g)
            && q.status.map_or(true, |s| d.status == s)
    });
    sort_newest_first(&mut donations);
    Ok(ApiResponse::paged(
        with_parties(&state, donations),
        Page::new(q.page, q.limit),
    ))
}

/// GET /api/donations/my-donations: The calling donor's donations.
#[utoipa::path(
    get,
    path = "/api/donations/my-donations",
    params(DonationQuery),
    responses(
        (status = 200, description = "One page of the donor's donations"),
        (status = 403, description = "Donors only", body = crate::error::ErrorBody),
    ),
    tag = "donations"
)]
async fn my_donations(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<DonationQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<DonationView>>, AppError> {
    require_any_role(&caller, &[Role::Donor])?;
    let q = extract_query(query)?;
    let mut donations = state
        .donations
        .filter(|d| d.donor_id == caller.account_id);
    sort_newest_first(&mut donations);
    Ok(ApiResponse::paged(
        with_parties(&state, donations),
        Page::new(q.page, q.limit),
    ))
}

/// GET /api/donations/hospital: Donations collected by a hospital.
#[utoipa::path(
    get,
    path = "/api/donations/hospital",
    params(DonationQuery),
    responses(
        (status = 200, description = "One page of the hospital's donations"),
        (status = 403, description = "Hospitals and administrators only", body = crate::error::ErrorBody),
    ),
    tag = "donations"
)]
async fn hospital_donations(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<DonationQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<DonationView>>, AppError> {
    require_any_role(&caller, COLLECTORS)?;
    let q = extract_query(query)?;
    let hospital_id = hospital_scope(&state, &caller, q.hospital_id.as_deref())?;
    let group = blood_group_param(q.blood_group.as_deref())?;
    let mut donations = state.donations.filter(|d| {
        d.hospital_id == hospital_id
            && group.map_or(true, |g| d.blood_group == g)
            && q.status.map_or(true, |s| d.status == s)
    });
    sort_newest_first(&mut donations);
    Ok(ApiResponse::paged(
        with_parties(&state, donations),
        Page::new(q.page, q.limit),
    ))
}

/// GET /api/donations/recent: Latest donations visible to the caller.
#[utoipa::path(
    get,
    path = "/api/donations/recent",
    params(RecentQuery),
    responses((status = 200, description = "Most recent donations")),
    tag = "donations"
)]
async fn recent_donations(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<DonationView>>, AppError> {
    require_any_role(&caller, &[Role::Donor, Role::Hospital, Role::Admin])?;
    let q = extract_query(query)?;
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let mut donations = state.donations.filter(|d| visible_to(&caller, d));
    sort_newest_first(&mut donations);
    donations.truncate(limit);
    Ok(ApiResponse::ok(with_parties(&state, donations)))
}

/// GET /api/donations/stats: Statistics over completed donations.
///
/// Donors get their own totals, hospitals a per-group breakdown of their
/// collections, administrators the global breakdown plus recent activity.
#[utoipa::path(
    get,
    path = "/api/donations/stats",
    responses(
        (status = 200, description = "Role-dependent statistics"),
        (status = 403, description = "Patients have no donation statistics", body = crate::error::ErrorBody),
    ),
    tag = "donations"
)]
async fn donation_stats(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<ApiResponse<DonationStats>, AppError> {
    require_any_role(&caller, &[Role::Donor, Role::Hospital, Role::Admin])?;
    let now = Utc::now();
    let stats = match caller.role {
        Role::Donor => DonationStats::Donor(
            state
                .donations
                .read(|all| donor_stats(all.values(), caller.account_id)),
        ),
        Role::Hospital => state.donations.read(|all| {
            let own: Vec<&Donation> = all
                .values()
                .filter(|d| d.hospital_id == caller.account_id)
                .collect();
            DonationStats::Hospital {
                by_blood_group: group_tallies(own.iter().copied()),
                total: own.iter().filter(|d| d.is_completed()).count(),
                this_month: completed_this_month(own.iter().copied(), now),
            }
        }),
        _ => {
            let (by_blood_group, total, this_month) = state.donations.read(|all| {
                (
                    group_tallies(all.values()),
                    all.values().filter(|d| d.is_completed()).count(),
                    completed_this_month(all.values(), now),
                )
            });
            let mut recent = state.donations.list();
            sort_newest_first(&mut recent);
            recent.truncate(ADMIN_RECENT);
            DonationStats::Admin {
                by_blood_group,
                total,
                this_month,
                recent: with_parties(&state, recent),
            }
        }
    };
    Ok(ApiResponse::ok(stats))
}

/// GET /api/donations/:id: One donation.
#[utoipa::path(
    get,
    path = "/api/donations/{id}",
    params(("id" = String, Path, description = "Donation ID")),
    responses(
        (status = 200, description = "Donation found"),
        (status = 403, description = "Not a party to this donation", body = crate::error::ErrorBody),
        (status = 404, description = "Donation not found", body = crate::error::ErrorBody),
    ),
    tag = "donations"
)]
async fn get_donation(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<ApiResponse<DonationView>, AppError> {
    let id: DonationId = parse_id(&id, "Donation")?;
    let donation = state
        .donations
        .get(&id)
        .ok_or_else(|| AppError::NotFound("Donation not found".into()))?;
    let is_party =
        donation.donor_id == caller.account_id || donation.hospital_id == caller.account_id;
    if !is_party && !caller.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this donation".into(),
        ));
    }
    let view = state
        .accounts
        .read(|accounts| DonationView::new(donation, accounts));
    Ok(ApiResponse::ok(view))
}

/// PUT /api/donations/:id: Amend a donation.
#[utoipa::path(
    put,
    path = "/api/donations/{id}",
    params(("id" = String, Path, description = "Donation ID")),
    request_body = UpdateDonationRequest,
    responses(
        (status = 200, description = "Donation updated"),
        (status = 403, description = "Not the collecting hospital", body = crate::error::ErrorBody),
        (status = 404, description = "Donation not found", body = crate::error::ErrorBody),
    ),
    tag = "donations"
)]
async fn update_donation(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<UpdateDonationRequest>, JsonRejection>,
) -> Result<ApiResponse<DonationView>, AppError> {
    require_any_role(&caller, COLLECTORS)?;
    let id = parse_id(&id, "Donation")?;
    let req = extract_json(body)?;
    let donation =
        orchestration::amend_donation(&state, &caller, id, req.into(), Utc::now()).await?;
    let view = state
        .accounts
        .read(|accounts| DonationView::new(donation, accounts));
    Ok(ApiResponse::ok(view).with_message("Donation updated successfully"))
}

/// DELETE /api/donations/:id: Hard delete.
#[utoipa::path(
    delete,
    path = "/api/donations/{id}",
    params(("id" = String, Path, description = "Donation ID")),
    responses(
        (status = 200, description = "Donation deleted"),
        (status = 403, description = "Administrators only", body = crate::error::ErrorBody),
        (status = 404, description = "Donation not found", body = crate::error::ErrorBody),
    ),
    tag = "donations"
)]
async fn delete_donation(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    require_any_role(&caller, &[Role::Admin])?;
    let id = parse_id(&id, "Donation")?;
    orchestration::delete_donation(&state, id).await?;
    Ok(ApiResponse::ok(()).with_message("Donation deleted successfully"))
}
