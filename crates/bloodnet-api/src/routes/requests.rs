//! # Emergency Requests API
//!
//! ## Endpoints
//!
//! - `POST /api/requests`: open a request (patient/admin)
//! - `GET /api/requests`: filtered listing (hospital/admin)
//! - `GET /api/requests/critical`: pending critical requests, oldest first
//! - `GET /api/requests/stats`: aggregate statistics (admin)
//! - `GET /api/requests/my-requests`: the calling patient's requests
//! - `GET /api/requests/:id`: one request (owner, eligible hospital, admin)
//! - `PUT /api/requests/:id/status`: approve, reject, complete or cancel
//! - `PUT /api/requests/:id/cancel`: owner cancels a pending request
//! - `PUT /api/requests/:id/assign`: point a request at a hospital (admin)
//! - `DELETE /api/requests/:id`: hard delete (admin)
//!
//! Hospitals see requests that are still pending or already assigned to
//! them. Completed, rejected and cancelled requests never change again.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use bloodnet_core::{AccountId, BloodGroup, RequestId};
use bloodnet_state::request::{critical_queue, sort_for_listing};
use bloodnet_state::{
    EmergencyRequest, NewRequest, RequestFilter, RequestLocation, RequestStats, RequestStatus,
    Role, UrgencyLevel,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{require_any_role, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, parse_id};
use crate::orchestration::{self, OpenedRequest, StatusChange};
use crate::response::{ApiResponse, Page};
use crate::routes::blood_group_param;
use crate::state::AppState;
use crate::views::RequestView;

const RESPONDERS: &[Role] = &[Role::Hospital, Role::Admin];

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct RequestQuery {
    #[serde(default, deserialize_with = "crate::response::lenient_count")]
    pub page: Option<usize>,
    #[serde(default, deserialize_with = "crate::response::lenient_count")]
    pub limit: Option<usize>,
    #[param(value_type = Option<String>)]
    pub status: Option<RequestStatus>,
    pub blood_group: Option<String>,
    #[param(value_type = Option<String>)]
    pub urgency_level: Option<UrgencyLevel>,
    /// Case-insensitive substring of the request city.
    pub city: Option<String>,
}

impl RequestQuery {
    fn filter(&self) -> Result<RequestFilter, AppError> {
        Ok(RequestFilter {
            status: self.status,
            blood_group: blood_group_param(self.blood_group.as_deref())?,
            urgency_level: self.urgency_level,
            city: self
                .city
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        })
    }
}

/// A request for blood.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    #[schema(value_type = String)]
    pub blood_group: BloodGroup,
    /// Units; defaults to 1.
    pub quantity: Option<i64>,
    /// `critical`, `urgent` or `normal` (default).
    #[schema(value_type = Option<String>)]
    pub urgency_level: Option<UrgencyLevel>,
    #[schema(value_type = Object)]
    pub location: RequestLocation,
    pub patient_name: String,
    pub patient_phone: String,
    /// Name of the hospital the patient is at.
    pub hospital: String,
    pub doctor_name: Option<String>,
    pub reason: Option<String>,
    /// Must be in the future.
    pub required_by: DateTime<Utc>,
    /// Administrators only: the patient the request is opened for.
    pub patient_id: Option<String>,
}

impl CreateRequestBody {
    fn into_parts(self) -> (Option<String>, NewRequest) {
        (
            self.patient_id,
            NewRequest {
                blood_group: self.blood_group,
                quantity: self.quantity,
                urgency_level: self.urgency_level,
                location: self.location,
                patient_name: self.patient_name,
                patient_phone: self.patient_phone,
                hospital: self.hospital,
                doctor_name: self.doctor_name,
                reason: self.reason,
                required_by: self.required_by,
            },
        )
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    /// `approved`, `rejected`, `completed` or `cancelled`.
    #[schema(value_type = String)]
    pub status: RequestStatus,
    /// Required when rejecting.
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    /// Administrators only: the hospital acting on the request.
    pub hospital_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequestBody {
    pub hospital_id: String,
}

/// A request after a status change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateResponse {
    #[serde(flatten)]
    pub request: RequestView,
    /// For approvals: whether stock was deducted from the approving hospital.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory_deducted: Option<bool>,
}

fn view(state: &AppState, request: EmergencyRequest, now: DateTime<Utc>) -> RequestView {
    state
        .accounts
        .read(|accounts| RequestView::new(request, accounts, now))
}

fn views(state: &AppState, requests: Vec<EmergencyRequest>, now: DateTime<Utc>) -> Vec<RequestView> {
    state.accounts.read(|accounts| {
        requests
            .into_iter()
            .map(|r| RequestView::new(r, accounts, now))
            .collect()
    })
}

/// Whether `caller` may read `request`.
fn may_view(caller: &CallerIdentity, request: &EmergencyRequest) -> bool {
    match caller.role {
        Role::Admin => true,
        Role::Hospital => request.visible_to_hospital(caller.account_id),
        Role::Patient => request.patient_id == caller.account_id,
        Role::Donor => false,
    }
}

// ── Router ──────────────────────────────────────────────────────────

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/requests", get(list_requests).post(create_request))
        .route("/api/requests/critical", get(critical_requests))
        .route("/api/requests/stats", get(request_stats))
        .route("/api/requests/my-requests", get(my_requests))
        .route(
            "/api/requests/:id",
            get(get_request).delete(delete_request),
        )
        .route("/api/requests/:id/status", put(update_status))
        .route("/api/requests/:id/cancel", put(cancel_request))
        .route("/api/requests/:id/assign", put(assign_request))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /api/requests: Open an emergency request.
///
/// The response lists hospitals holding a batch large enough to cover the
/// request and counts available donors of the group in the request's city.
/// Neither result is stored.
#[utoipa::path(
    post,
    path = "/api/requests",
    request_body = CreateRequestBody,
    responses(
        (status = 201, description = "Request opened with matching hospitals and donor count"),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 403, description = "Patients and administrators only", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn create_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateRequestBody>, JsonRejection>,
) -> Result<ApiResponse<OpenedRequest>, AppError> {
    require_any_role(&caller, &[Role::Patient, Role::Admin])?;
    let (patient_id, input) = extract_json(body)?.into_parts();
    let patient_id = match (caller.role, patient_id.as_deref().map(str::trim)) {
        (Role::Admin, Some(raw)) if !raw.is_empty() => {
            let id: AccountId = parse_id(raw, "Patient")?;
            state
                .accounts
                .get(&id)
                .filter(|a| a.is_active_with_role(Role::Patient))
                .ok_or_else(|| AppError::NotFound("Patient not found".into()))?
                .id
        }
        _ => caller.account_id,
    };
    let opened = orchestration::open_request(&state, patient_id, input, Utc::now()).await?;
    Ok(ApiResponse::created(opened).with_message("Emergency request created successfully"))
}

/// GET /api/requests: Requests visible to the calling hospital, or all
/// requests for administrators.
///
/// Sorted by urgency, newest first within a level.
#[utoipa::path(
    get,
    path = "/api/requests",
    params(RequestQuery),
    responses(
        (status = 200, description = "One page of requests"),
        (status = 403, description = "Hospitals and administrators only", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn list_requests(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<RequestQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<RequestView>>, AppError> {
    require_any_role(&caller, RESPONDERS)?;
    let q = extract_query(query)?;
    let filter = q.filter()?;
    let mut requests = state
        .requests
        .filter(|r| may_view(&caller, r) && filter.matches(r));
    sort_for_listing(&mut requests);
    Ok(ApiResponse::paged(
        views(&state, requests, Utc::now()),
        Page::new(q.page, q.limit),
    ))
}

/// GET /api/requests/critical: Pending critical requests, oldest first.
#[utoipa::path(
    get,
    path = "/api/requests/critical",
    responses(
        (status = 200, description = "Pending critical requests"),
        (status = 403, description = "Hospitals and administrators only", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn critical_requests(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<ApiResponse<Vec<RequestView>>, AppError> {
    require_any_role(&caller, RESPONDERS)?;
    let now = Utc::now();
    let queue = state.requests.read(|all| {
        critical_queue(all.values())
            .into_iter()
            .cloned()
            .collect::<Vec<_>>()
    });
    Ok(ApiResponse::ok(views(&state, queue, now)))
}

/// GET /api/requests/stats: Aggregate request statistics.
#[utoipa::path(
    get,
    path = "/api/requests/stats",
    responses(
        (status = 200, description = "Totals and breakdowns by status, blood group and urgency"),
        (status = 403, description = "Administrators only", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn request_stats(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<ApiResponse<RequestStats>, AppError> {
    require_any_role(&caller, &[Role::Admin])?;
    let now = Utc::now();
    let stats = state
        .requests
        .read(|all| RequestStats::compute(all.values(), now));
    Ok(ApiResponse::ok(stats))
}

/// GET /api/requests/my-requests: The calling patient's requests, newest
/// first.
#[utoipa::path(
    get,
    path = "/api/requests/my-requests",
    params(RequestQuery),
    responses(
        (status = 200, description = "One page of the patient's requests"),
        (status = 403, description = "Patients only", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn my_requests(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<RequestQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<RequestView>>, AppError> {
    require_any_role(&caller, &[Role::Patient])?;
    let q = extract_query(query)?;
    let filter = q.filter()?;
    let mut requests = state
        .requests
        .filter(|r| r.patient_id == caller.account_id && filter.matches(r));
    requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(ApiResponse::paged(
        views(&state, requests, Utc::now()),
        Page::new(q.page, q.limit),
    ))
}

/// GET /api/requests/:id: One request.
#[utoipa::path(
    get,
    path = "/api/requests/{id}",
    params(("id" = String, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request found"),
        (status = 403, description = "Not visible to the caller", body = crate::error::ErrorBody),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn get_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<ApiResponse<RequestView>, AppError> {
    let id: RequestId = parse_id(&id, "Request")?;
    let request = state
        .requests
        .get(&id)
        .ok_or_else(|| AppError::NotFound("Request not found".into()))?;
    if !may_view(&caller, &request) {
        return Err(AppError::Forbidden(
            "Not authorized to view this request".into(),
        ));
    }
    Ok(ApiResponse::ok(view(&state, request, Utc::now())))
}

/// PUT /api/requests/:id/status: Approve, reject, complete or cancel.
///
/// Approval deducts the requested units from the approving hospital's
/// earliest-expiring batch that covers them.
#[utoipa::path(
    put,
    path = "/api/requests/{id}/status",
    params(("id" = String, Path, description = "Request ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 400, description = "Invalid transition or insufficient stock", body = crate::error::ErrorBody),
        (status = 403, description = "Request assigned to another hospital", body = crate::error::ErrorBody),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn update_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<ApiResponse<StatusUpdateResponse>, AppError> {
    require_any_role(&caller, RESPONDERS)?;
    let id: RequestId = parse_id(&id, "Request")?;
    let req = extract_json(body)?;
    let hospital_id = req
        .hospital_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|raw| parse_id::<AccountId>(raw, "Hospital"))
        .transpose()?;
    let change = StatusChange {
        status: req.status,
        rejection_reason: req.rejection_reason,
        notes: req.notes,
        hospital_id,
    };
    let now = Utc::now();
    let outcome = orchestration::transition_request(&state, &caller, id, change, now).await?;
    let status = outcome.request.status;
    Ok(ApiResponse::ok(StatusUpdateResponse {
        request: view(&state, outcome.request, now),
        inventory_deducted: outcome.inventory_deducted,
    })
    .with_message(format!("Request {status} successfully")))
}

/// PUT /api/requests/:id/cancel: Cancel one of the caller's pending
/// requests.
#[utoipa::path(
    put,
    path = "/api/requests/{id}/cancel",
    params(("id" = String, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request cancelled"),
        (status = 400, description = "Request is no longer pending", body = crate::error::ErrorBody),
        (status = 403, description = "Not the requesting patient", body = crate::error::ErrorBody),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn cancel_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<ApiResponse<RequestView>, AppError> {
    require_any_role(&caller, &[Role::Patient])?;
    let id: RequestId = parse_id(&id, "Request")?;
    let now = Utc::now();
    let request = orchestration::cancel_request(&state, &caller, id, now).await?;
    Ok(ApiResponse::ok(view(&state, request, now)).with_message("Request cancelled successfully"))
}

/// PUT /api/requests/:id/assign: Assign a request to an active hospital.
#[utoipa::path(
    put,
    path = "/api/requests/{id}/assign",
    params(("id" = String, Path, description = "Request ID")),
    request_body = AssignRequestBody,
    responses(
        (status = 200, description = "Request assigned"),
        (status = 403, description = "Administrators only", body = crate::error::ErrorBody),
        (status = 404, description = "Request or hospital not found", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn assign_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<AssignRequestBody>, JsonRejection>,
) -> Result<ApiResponse<RequestView>, AppError> {
    require_any_role(&caller, &[Role::Admin])?;
    let id: RequestId = parse_id(&id, "Request")?;
    let req = extract_json(body)?;
    let hospital_id: AccountId = parse_id(req.hospital_id.trim(), "Hospital")?;
    let now = Utc::now();
    let request = orchestration::assign_request(&state, id, hospital_id, now).await?;
    Ok(ApiResponse::ok(view(&state, request, now))
        .with_message("Request assigned to hospital successfully"))
}

/// DELETE /api/requests/:id: Hard delete.
#[utoipa::path(
    delete,
    path = "/api/requests/{id}",
    params(("id" = String, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request deleted"),
        (status = 403, description = "Administrators only", body = crate::error::ErrorBody),
        (status = 404, description = "Request not found", body = crate::error::ErrorBody),
    ),
    tag = "requests"
)]
async fn delete_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    require_any_role(&caller, &[Role::Admin])?;
    let id: RequestId = parse_id(&id, "Request")?;
    orchestration::delete_request(&state, id).await?;
    Ok(ApiResponse::ok(()).with_message("Request deleted successfully"))
}
