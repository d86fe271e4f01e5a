//! # Inventory Ledger API
//!
//! Per-hospital blood stock. Hospitals manage their own batches;
//! administrators act on a named hospital through `hospitalId`.
//!
//! ## Endpoints
//!
//! - `GET /api/inventory/search`: available units across hospitals (public)
//! - `GET /api/inventory`: the hospital's active batches
//! - `POST /api/inventory`: add stock, merging into a matching batch
//! - `GET /api/inventory/summary`: totals per blood group
//! - `GET /api/inventory/alerts/low-stock`: batches below five units
//! - `GET /api/inventory/alerts/expiring`: expiring-soon and expired batches
//! - `GET /api/inventory/all`: every active batch (admin)
//! - `GET|PUT|DELETE /api/inventory/:id`: one batch (owner or admin)

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use bloodnet_core::{AccountId, BloodGroup, InventoryItemId};
use bloodnet_state::inventory::{
    expiry_alerts, low_stock, search_available, sort_for_listing, summarize,
};
use bloodnet_state::{
    GroupSummary, InventoryItem, InventorySource, ItemUpdate, NewStock, Role, StockUnit,
    StockView,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::{require_any_role, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, parse_id};
use crate::orchestration;
use crate::response::{ApiResponse, Page};
use crate::routes::{blood_group_param, contains_ci, hospital_scope};
use crate::state::AppState;
use crate::views::{AccountSummary, InventoryItemView};

const MANAGERS: &[Role] = &[Role::Hospital, Role::Admin];

// ── Request/Response DTOs ───────────────────────────────────────────

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct InventoryQuery {
    #[serde(default, deserialize_with = "crate::response::lenient_count")]
    pub page: Option<usize>,
    #[serde(default, deserialize_with = "crate::response::lenient_count")]
    pub limit: Option<usize>,
    /// Required for administrators.
    pub hospital_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub blood_group: Option<String>,
    /// Case-insensitive substring of the hospital's city.
    pub city: Option<String>,
    /// Case-insensitive substring of the hospital's state.
    pub state: Option<String>,
}

/// Stock to add.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddStockRequest {
    #[schema(value_type = String)]
    pub blood_group: BloodGroup,
    pub quantity: i64,
    #[schema(value_type = Option<String>)]
    pub unit: Option<StockUnit>,
    pub expiry_date: DateTime<Utc>,
    pub collection_date: Option<DateTime<Utc>>,
    /// Stock with a batch number already held is merged into that batch.
    pub batch_number: Option<String>,
    #[schema(value_type = Option<String>)]
    pub source: Option<InventorySource>,
    pub notes: Option<String>,
    /// Required for administrators.
    pub hospital_id: Option<String>,
}

impl AddStockRequest {
    fn into_parts(self) -> (Option<String>, NewStock) {
        let stock = NewStock {
            blood_group: self.blood_group,
            quantity: self.quantity,
            unit: self.unit,
            expiry_date: self.expiry_date,
            collection_date: self.collection_date,
            batch_number: self.batch_number,
            source: self.source,
            notes: self.notes,
        };
        (self.hospital_id, stock)
    }
}

/// Manual batch edit. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStockRequest {
    pub quantity: Option<i64>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

impl From<UpdateStockRequest> for ItemUpdate {
    fn from(req: UpdateStockRequest) -> Self {
        Self {
            quantity: req.quantity,
            expiry_date: req.expiry_date,
            notes: req.notes,
            is_active: req.is_active,
        }
    }
}

/// Available units at one hospital.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HospitalUnits {
    pub hospital: AccountSummary,
    pub blood_units: Vec<StockView>,
}

/// Search result body.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub success: bool,
    /// Number of matching units across all hospitals.
    pub count: usize,
    pub hospitals: Vec<HospitalUnits>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertGroup {
    pub count: usize,
    pub items: Vec<InventoryItemView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryAlertsResponse {
    pub expiring_soon: AlertGroup,
    pub expired: AlertGroup,
}

fn views(items: Vec<&InventoryItem>, now: DateTime<Utc>) -> Vec<InventoryItemView> {
    items
        .into_iter()
        .map(|i| InventoryItemView::new(i.clone(), now))
        .collect()
}

// ── Router ──────────────────────────────────────────────────────────

/// Unauthenticated stock search.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/api/inventory/search", get(search_stock))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/inventory", get(list_stock).post(add_stock))
        .route("/api/inventory/summary", get(stock_summary))
        .route("/api/inventory/alerts/low-stock", get(low_stock_alerts))
        .route("/api/inventory/alerts/expiring", get(expiring_alerts))
        .route("/api/inventory/all", get(all_stock))
        .route(
            "/api/inventory/:id",
            get(get_item).put(update_item).delete(remove_item),
        )
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /api/inventory/search: Available units of a blood group by hospital.
#[utoipa::path(
    get,
    path = "/api/inventory/search",
    params(SearchQuery),
    responses(
        (status = 200, description = "Hospitals holding available units, largest batches first"),
        (status = 400, description = "bloodGroup missing or unknown", body = crate::error::ErrorBody),
    ),
    tag = "inventory"
)]
async fn search_stock(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let q = extract_query(query)?;
    let group = blood_group_param(q.blood_group.as_deref())?
        .ok_or_else(|| AppError::validation("Blood group is required"))?;
    let now = Utc::now();

    let hospitals: Vec<HospitalUnits> = state.accounts.read(|accounts| {
        let matches = |id: AccountId| {
            accounts.get(&id).is_some_and(|h| {
                h.is_active_with_role(Role::Hospital)
                    && contains_ci(&h.location.city, q.city.as_deref())
                    && contains_ci(&h.location.state, q.state.as_deref())
            })
        };
        let found = state
            .inventory
            .read(|items| search_available(items.values(), group, matches, now));
        found
            .into_iter()
            .filter_map(|stock| {
                accounts.get(&stock.hospital_id).map(|h| HospitalUnits {
                    hospital: AccountSummary::from(h),
                    blood_units: stock.units,
                })
            })
            .collect()
    });
    let count = hospitals.iter().map(|h| h.blood_units.len()).sum();
    Ok(Json(SearchResponse {
        success: true,
        count,
        hospitals,
    }))
}

/// GET /api/inventory: The hospital's active batches.
#[utoipa::path(
    get,
    path = "/api/inventory",
    params(InventoryQuery),
    responses(
        (status = 200, description = "Active batches by blood group then expiry"),
        (status = 403, description = "Hospitals and administrators only", body = crate::error::ErrorBody),
    ),
    tag = "inventory"
)]
async fn list_stock(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<InventoryQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<InventoryItemView>>, AppError> {
    require_any_role(&caller, MANAGERS)?;
    let q = extract_query(query)?;
    let hospital_id = hospital_scope(&state, &caller, q.hospital_id.as_deref())?;
    let now = Utc::now();

    let mut items = state
        .inventory
        .filter(|i| i.hospital_id == hospital_id && i.is_active);
    sort_for_listing(&mut items);
    let items = items
        .into_iter()
        .map(|i| InventoryItemView::new(i, now))
        .collect();
    Ok(ApiResponse::paged(items, Page::new(q.page, q.limit)))
}

/// POST /api/inventory: Add stock.
///
/// Responds 201 for a new batch and 200 when merged into an existing one.
#[utoipa::path(
    post,
    path = "/api/inventory",
    request_body = AddStockRequest,
    responses(
        (status = 201, description = "New batch created"),
        (status = 200, description = "Merged into an existing batch"),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "inventory"
)]
async fn add_stock(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<AddStockRequest>, JsonRejection>,
) -> Result<ApiResponse<InventoryItemView>, AppError> {
    require_any_role(&caller, MANAGERS)?;
    let (hospital_id, stock) = extract_json(body)?.into_parts();
    let hospital_id = hospital_scope(&state, &caller, hospital_id.as_deref())?;
    let now = Utc::now();

    let outcome = orchestration::add_stock(&state, hospital_id, stock, now).await?;
    let view = InventoryItemView::new(outcome.item, now);
    Ok(if outcome.merged {
        ApiResponse::ok(view).with_message("Inventory updated successfully")
    } else {
        ApiResponse::created(view).with_message("Blood added to inventory successfully")
    })
}

/// GET /api/inventory/summary: Totals for all eight blood groups.
#[utoipa::path(
    get,
    path = "/api/inventory/summary",
    params(InventoryQuery),
    responses((status = 200, description = "One entry per blood group, zero when absent")),
    tag = "inventory"
)]
async fn stock_summary(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<InventoryQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<GroupSummary>>, AppError> {
    require_any_role(&caller, MANAGERS)?;
    let q = extract_query(query)?;
    let hospital_id = hospital_scope(&state, &caller, q.hospital_id.as_deref())?;
    let now = Utc::now();
    let summary = state
        .inventory
        .read(|items| summarize(items.values(), hospital_id, now));
    Ok(ApiResponse::ok(summary))
}

/// GET /api/inventory/alerts/low-stock: Active batches below five units.
#[utoipa::path(
    get,
    path = "/api/inventory/alerts/low-stock",
    params(InventoryQuery),
    responses((status = 200, description = "Low-stock batches")),
    tag = "inventory"
)]
async fn low_stock_alerts(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<InventoryQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<InventoryItemView>>, AppError> {
    require_any_role(&caller, MANAGERS)?;
    let q = extract_query(query)?;
    let hospital_id = hospital_scope(&state, &caller, q.hospital_id.as_deref())?;
    let now = Utc::now();
    let mut items = state
        .inventory
        .read(|items| views(low_stock(items.values(), hospital_id), now));
    items.sort_by_key(|v| v.item.quantity);
    Ok(ApiResponse::ok(items))
}

/// GET /api/inventory/alerts/expiring: Expiring-soon and expired batches.
#[utoipa::path(
    get,
    path = "/api/inventory/alerts/expiring",
    params(InventoryQuery),
    responses((status = 200, description = "expiringSoon and expired groups")),
    tag = "inventory"
)]
async fn expiring_alerts(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<InventoryQuery>, QueryRejection>,
) -> Result<ApiResponse<ExpiryAlertsResponse>, AppError> {
    require_any_role(&caller, MANAGERS)?;
    let q = extract_query(query)?;
    let hospital_id = hospital_scope(&state, &caller, q.hospital_id.as_deref())?;
    let now = Utc::now();

    let (mut soon, mut expired) = state.inventory.read(|items| {
        let alerts = expiry_alerts(items.values(), hospital_id, now);
        (views(alerts.expiring_soon, now), views(alerts.expired, now))
    });
    soon.sort_by_key(|v| v.item.expiry_date);
    expired.sort_by_key(|v| v.item.expiry_date);
    Ok(ApiResponse::ok(ExpiryAlertsResponse {
        expiring_soon: AlertGroup {
            count: soon.len(),
            items: soon,
        },
        expired: AlertGroup {
            count: expired.len(),
            items: expired,
        },
    }))
}

/// GET /api/inventory/all: Every active batch with its hospital.
#[utoipa::path(
    get,
    path = "/api/inventory/all",
    params(InventoryQuery),
    responses(
        (status = 200, description = "Active batches across all hospitals"),
        (status = 403, description = "Administrators only", body = crate::error::ErrorBody),
    ),
    tag = "inventory"
)]
async fn all_stock(
    State(state): State<AppState>,
    caller: CallerIdentity,
    query: Result<Query<InventoryQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<InventoryItemView>>, AppError> {
    require_any_role(&caller, &[Role::Admin])?;
    let q = extract_query(query)?;
    let now = Utc::now();

    let mut items = state.inventory.filter(|i| i.is_active);
    items.sort_by(|a, b| {
        a.blood_group
            .cmp(&b.blood_group)
            .then(b.created_at.cmp(&a.created_at))
    });
    let items = state.accounts.read(|accounts| {
        items
            .into_iter()
            .map(|i| InventoryItemView::with_hospital(i, accounts, now))
            .collect()
    });
    Ok(ApiResponse::paged(items, Page::new(q.page, q.limit)))
}

fn owned_item(
    state: &AppState,
    caller: &CallerIdentity,
    raw_id: &str,
) -> Result<InventoryItem, AppError> {
    let id: InventoryItemId = parse_id(raw_id, "Inventory item")?;
    let item = state
        .inventory
        .get(&id)
        .ok_or_else(|| AppError::NotFound("Inventory item not found".into()))?;
    if !caller.is_admin() && item.hospital_id != caller.account_id {
        return Err(AppError::Forbidden(
            "Not authorized to access this inventory".into(),
        ));
    }
    Ok(item)
}

/// GET /api/inventory/:id: One batch.
#[utoipa::path(
    get,
    path = "/api/inventory/{id}",
    params(("id" = String, Path, description = "Inventory item ID")),
    responses(
        (status = 200, description = "Batch found"),
        (status = 403, description = "Not the owning hospital", body = crate::error::ErrorBody),
        (status = 404, description = "Batch not found", body = crate::error::ErrorBody),
    ),
    tag = "inventory"
)]
async fn get_item(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<ApiResponse<InventoryItemView>, AppError> {
    let item = owned_item(&state, &caller, &id)?;
    Ok(ApiResponse::ok(InventoryItemView::new(item, Utc::now())))
}

/// PUT /api/inventory/:id: Manual batch edit.
#[utoipa::path(
    put,
    path = "/api/inventory/{id}",
    params(("id" = String, Path, description = "Inventory item ID")),
    request_body = UpdateStockRequest,
    responses(
        (status = 200, description = "Batch updated"),
        (status = 403, description = "Not the owning hospital", body = crate::error::ErrorBody),
        (status = 404, description = "Batch not found", body = crate::error::ErrorBody),
    ),
    tag = "inventory"
)]
async fn update_item(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
    body: Result<Json<UpdateStockRequest>, JsonRejection>,
) -> Result<ApiResponse<InventoryItemView>, AppError> {
    require_any_role(&caller, MANAGERS)?;
    let id = parse_id(&id, "Inventory item")?;
    let req = extract_json(body)?;
    let now = Utc::now();
    let item = orchestration::update_stock(&state, &caller, id, req.into(), now).await?;
    Ok(ApiResponse::ok(InventoryItemView::new(item, now))
        .with_message("Inventory updated successfully"))
}

/// DELETE /api/inventory/:id: Soft delete.
#[utoipa::path(
    delete,
    path = "/api/inventory/{id}",
    params(("id" = String, Path, description = "Inventory item ID")),
    responses(
        (status = 200, description = "Batch deactivated"),
        (status = 403, description = "Not the owning hospital", body = crate::error::ErrorBody),
        (status = 404, description = "Batch not found", body = crate::error::ErrorBody),
    ),
    tag = "inventory"
)]
async fn remove_item(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<ApiResponse<()>, AppError> {
    require_any_role(&caller, MANAGERS)?;
    let id = parse_id(&id, "Inventory item")?;
    orchestration::remove_stock(&state, &caller, id, Utc::now()).await?;
    Ok(ApiResponse::ok(()).with_message("Inventory item removed successfully"))
}
