//! # User Management API
//!
//! ## Endpoints
//!
//! - `GET /api/users`: list accounts with filters (admin)
//! - `GET /api/users/stats`: account statistics (admin)
//! - `GET /api/users/hospitals`: active hospital directory
//! - `GET /api/users/donors/search`: donor directory with eligibility
//! - `GET /api/users/donor/dashboard`: the calling donor's dashboard
//! - `GET /api/users/:id`: one account (admin or the account itself)
//! - `PUT /api/users/:id`: administrative edit (admin)
//! - `DELETE /api/users/:id`: hard delete, never for admins (admin)

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use bloodnet_core::{AccountId, BloodGroup};
use bloodnet_state::donation::sort_newest_first;
use bloodnet_state::request::sort_by_urgency_then_age;
use bloodnet_state::{AccountUpdate, Donation, PublicAccount, RequestStatus, Role};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{require_any_role, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, parse_id};
use crate::orchestration;
use crate::response::{ApiResponse, Page};
use crate::routes::{blood_group_param, contains_ci};
use crate::state::AppState;
use crate::views::{DonationView, RequestView};

const RECENT_REGISTRATION_DAYS: i64 = 30;
const TOP_CITIES: usize = 10;
const DASHBOARD_ITEMS: usize = 5;

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    #[serde(default, deserialize_with = "crate::response::lenient_count")]
    pub page: Option<usize>,
    #[serde(default, deserialize_with = "crate::response::lenient_count")]
    pub limit: Option<usize>,
    #[param(value_type = Option<String>)]
    pub role: Option<Role>,
    pub blood_group: Option<String>,
    /// Case-insensitive substring.
    pub city: Option<String>,
    pub is_active: Option<bool>,
    /// Case-insensitive substring of name or email.
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LocationQuery {
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct DonorSearchQuery {
    pub blood_group: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub available: Option<bool>,
}

/// Administrative account edit. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[schema(value_type = Option<String>)]
    pub blood_group: Option<BloodGroup>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub is_active: Option<bool>,
    pub is_available: Option<bool>,
}

impl From<UpdateUserRequest> for AccountUpdate {
    fn from(req: UpdateUserRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            phone: req.phone,
            blood_group: req.blood_group,
            city: req.city,
            state: req.state,
            is_active: req.is_active,
            is_available: req.is_available,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoleCount {
    pub role: Role,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodGroupCount {
    pub blood_group: BloodGroup,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CityCount {
    pub city: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_users: usize,
    pub total_donors: usize,
    pub total_patients: usize,
    pub total_hospitals: usize,
    pub available_donors: usize,
    pub recent_registrations: usize,
    pub users_by_role: Vec<RoleCount>,
    pub users_by_blood_group: Vec<BloodGroupCount>,
    pub users_by_city: Vec<CityCount>,
}

/// A donor directory entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorListing {
    #[serde(flatten)]
    pub donor: PublicAccount,
    pub is_eligible: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonorDashboard {
    pub profile: PublicAccount,
    pub is_eligible: bool,
    pub days_until_eligible: i64,
    pub total_donations: usize,
    pub recent_donations: Vec<DonationView>,
    pub nearby_requests: Vec<RequestView>,
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/stats", get(user_stats))
        .route("/api/users/hospitals", get(list_hospitals))
        .route("/api/users/donors/search", get(search_donors))
        .route("/api/users/donor/dashboard", get(donor_dashboard))
        .route(
            "/api/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/users: List accounts, newest first.
#[utoipa::path(
    get,
    path = "/api/users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "One page of accounts"),
        (status = 403, description = "Administrators only", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
async fn list_users(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<ListUsersQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<PublicAccount>>, AppError> {
    require_any_role(&caller, &[Role::Admin])?;
    let q = extract_query(query)?;
    let group = blood_group_param(q.blood_group.as_deref())?;
    let search = q.search.as_deref().map(|s| s.trim().to_lowercase());

    let mut accounts = state.accounts.filter(|a| {
        q.role.map_or(true, |r| a.role() == r)
            && group.map_or(true, |g| a.blood_group() == Some(g))
            && contains_ci(&a.location.city, q.city.as_deref())
            && q.is_active.map_or(true, |active| a.is_active == active)
            && search.as_deref().map_or(true, |s| {
                a.name.to_lowercase().contains(s) || a.email.contains(s)
            })
    });
    accounts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let accounts = accounts.iter().map(PublicAccount::from).collect();
    Ok(ApiResponse::paged(accounts, Page::new(q.page, q.limit)))
}

/// GET /api/users/stats: Account statistics.
#[utoipa::path(
    get,
    path = "/api/users/stats",
    responses(
        (status = 200, description = "Totals per role, blood group and city"),
        (status = 403, description = "Administrators only", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
async fn user_stats(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<ApiResponse<UserStats>, AppError> {
    require_any_role(&caller, &[Role::Admin])?;
    let since = Utc::now() - Duration::days(RECENT_REGISTRATION_DAYS);

    let stats = state.accounts.read(|all| {
        let count_role = |role: Role| all.values().filter(|a| a.role() == role).count();

        let users_by_role = Role::ALL
            .into_iter()
            .map(|role| RoleCount {
                role,
                count: count_role(role),
            })
            .filter(|c| c.count > 0)
            .collect();

        let users_by_blood_group = BloodGroup::ALL
            .into_iter()
            .map(|blood_group| BloodGroupCount {
                blood_group,
                count: all
                    .values()
                    .filter(|a| a.blood_group() == Some(blood_group))
                    .count(),
            })
            .filter(|c| c.count > 0)
            .collect();

        let mut cities: HashMap<&str, usize> = HashMap::new();
        for a in all.values() {
            *cities.entry(a.location.city.as_str()).or_default() += 1;
        }
        let mut users_by_city: Vec<CityCount> = cities
            .into_iter()
            .map(|(city, count)| CityCount {
                city: city.to_string(),
                count,
            })
            .collect();
        users_by_city.sort_by(|a, b| b.count.cmp(&a.count).then(a.city.cmp(&b.city)));
        users_by_city.truncate(TOP_CITIES);

        UserStats {
            total_users: all.len(),
            total_donors: count_role(Role::Donor),
            total_patients: count_role(Role::Patient),
            total_hospitals: count_role(Role::Hospital),
            available_donors: all
                .values()
                .filter(|a| a.is_active_with_role(Role::Donor) && a.is_available())
                .count(),
            recent_registrations: all.values().filter(|a| a.created_at >= since).count(),
            users_by_role,
            users_by_blood_group,
            users_by_city,
        }
    });
    Ok(ApiResponse::ok(stats))
}

/// GET /api/users/hospitals: Active hospitals, by name.
#[utoipa::path(
    get,
    path = "/api/users/hospitals",
    params(LocationQuery),
    responses((status = 200, description = "Active hospitals")),
    tag = "users"
)]
async fn list_hospitals(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    query: Result<Query<LocationQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<PublicAccount>>, AppError> {
    let q = extract_query(query)?;
    let mut hospitals = state.accounts.filter(|a| {
        a.is_active_with_role(Role::Hospital)
            && contains_ci(&a.location.city, q.city.as_deref())
            && contains_ci(&a.location.state, q.state.as_deref())
    });
    hospitals.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(ApiResponse::ok(
        hospitals.iter().map(PublicAccount::from).collect(),
    ))
}

/// GET /api/users/donors/search: Active donors with eligibility.
///
/// Available donors come first, then those who donated longest ago.
#[utoipa::path(
    get,
    path = "/api/users/donors/search",
    params(DonorSearchQuery),
    responses((status = 200, description = "Matching donors, each with isEligible")),
    tag = "users"
)]
async fn search_donors(
    State(state): State<AppState>,
    _caller: CallerIdentity,
    query: Result<Query<DonorSearchQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<DonorListing>>, AppError> {
    let q = extract_query(query)?;
    let group = blood_group_param(q.blood_group.as_deref())?;
    let now = Utc::now();

    let mut donors = state.accounts.filter(|a| {
        a.is_active_with_role(Role::Donor)
            && group.map_or(true, |g| a.blood_group() == Some(g))
            && contains_ci(&a.location.city, q.city.as_deref())
            && contains_ci(&a.location.state, q.state.as_deref())
            && q.available.map_or(true, |flag| a.is_available() == flag)
    });
    donors.sort_by(|a, b| {
        b.is_available()
            .cmp(&a.is_available())
            .then(a.last_donation_date().cmp(&b.last_donation_date()))
    });
    let listings = donors
        .iter()
        .map(|d| DonorListing {
            donor: PublicAccount::from(d),
            is_eligible: d.is_eligible_to_donate(now),
        })
        .collect();
    Ok(ApiResponse::ok(listings))
}

/// GET /api/users/donor/dashboard: Eligibility, history and nearby needs.
#[utoipa::path(
    get,
    path = "/api/users/donor/dashboard",
    responses(
        (status = 200, description = "The calling donor's dashboard"),
        (status = 403, description = "Donors only", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
async fn donor_dashboard(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<ApiResponse<DonorDashboard>, AppError> {
    require_any_role(&caller, &[Role::Donor])?;
    let now = Utc::now();
    let donor = state
        .accounts
        .get(&caller.account_id)
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    let mut donations: Vec<Donation> = state.donations.filter(|d| d.donor_id == donor.id);
    sort_newest_first(&mut donations);
    let total_donations = donations.len();
    donations.truncate(DASHBOARD_ITEMS);

    let city = donor.location.city.to_lowercase();
    let mut nearby = state.requests.filter(|r| {
        r.status == RequestStatus::Pending
            && Some(r.blood_group) == donor.blood_group()
            && r.location.city.to_lowercase() == city
    });
    sort_by_urgency_then_age(&mut nearby);
    nearby.truncate(DASHBOARD_ITEMS);

    let dashboard = state.accounts.read(|accounts| DonorDashboard {
        profile: PublicAccount::from(&donor),
        is_eligible: donor.is_eligible_to_donate(now),
        days_until_eligible: donor.days_until_eligible(now),
        total_donations,
        recent_donations: donations
            .into_iter()
            .map(|d| DonationView::new(d, accounts))
            .collect(),
        nearby_requests: nearby
            .into_iter()
            .map(|r| RequestView::new(r, accounts, now))
            .collect(),
    });
    Ok(ApiResponse::ok(dashboard))
}

/// GET /api/users/:id: One account.
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account found"),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
async fn get_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<ApiResponse<PublicAccount>, AppError> {
    let id: AccountId = parse_id(&id, "User")?;
    if !caller.is_admin() && caller.account_id != id {
        return Err(AppError::Forbidden(
            "Not authorized to view this user".into(),
        ));
    }
    let account = state
        .accounts
        .get(&id)
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(ApiResponse::ok(PublicAccount::from(&account)))
}

/// PUT /api/users/:id: Administrative account edit.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "Account ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account updated"),
        (status = 400, description = "Validation error or email taken", body = crate::error::ErrorBody),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
async fn update_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicAccount>, AppError> {
    require_any_role(&caller, &[Role::Admin])?;
    let id = parse_id(&id, "User")?;
    let req = extract_json(body)?;
    let account = orchestration::update_account(&state, id, req.into(), Utc::now()).await?;
    Ok(ApiResponse::ok(PublicAccount::from(&account)).with_message("User updated successfully"))
}

/// DELETE /api/users/:id: Hard delete. Administrator accounts are protected.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = String, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account deleted"),
        (status = 403, description = "Administrator accounts cannot be deleted", body = crate::error::ErrorBody),
        (status = 404, description = "Account not found", body = crate::error::ErrorBody),
    ),
    tag = "users"
)]
async fn delete_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    require_any_role(&caller, &[Role::Admin])?;
    let id = parse_id(&id, "User")?;
    orchestration::delete_account(&state, id).await?;
    Ok(ApiResponse::ok(()).with_message("User deleted successfully"))
}
