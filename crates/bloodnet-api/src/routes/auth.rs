//! # Accounts & Sessions API
//!
//! ## Endpoints
//!
//! - `POST /api/auth/register`: create a donor, patient or hospital account (public)
//! - `POST /api/auth/login`: exchange credentials for a session token (public)
//! - `GET /api/auth/me`: the caller's account
//! - `PUT /api/auth/profile`: self-service profile edit
//! - `PUT /api/auth/password`: change password
//! - `POST /api/auth/logout`: revoke the presented session token

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use bloodnet_core::{BloodGroup, ValidationError};
use bloodnet_state::{Location, ProfileUpdate, PublicAccount, Registration, Role};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{bearer_token, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json, Validate};
use crate::orchestration;
use crate::response::ApiResponse;
use crate::state::AppState;

// ── Request/Response DTOs ───────────────────────────────────────────

/// Request to create an account.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: String,
    /// `donor`, `patient` or `hospital`.
    #[schema(value_type = String)]
    pub role: Role,
    /// Required for donors and patients.
    #[schema(value_type = Option<String>)]
    pub blood_group: Option<BloodGroup>,
    pub city: String,
    pub state: String,
    pub address: Option<String>,
    /// Required for hospitals.
    pub hospital_name: Option<String>,
    pub registration_number: Option<String>,
}

impl Validate for RegisterRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.role == Role::Admin {
            return Err(ValidationError::invalid(
                "role",
                "must be one of donor, patient, hospital",
            ));
        }
        Ok(())
    }
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Self {
            name: req.name,
            email: req.email,
            password: req.password,
            phone: req.phone,
            role: req.role,
            blood_group: req.blood_group,
            location: Location {
                city: req.city,
                state: req.state,
                address: req.address,
            },
            hospital_name: req.hospital_name,
            registration_number: req.registration_number,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.email.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "email" });
        }
        if self.password.is_empty() {
            return Err(ValidationError::MissingField { field: "password" });
        }
        Ok(())
    }
}

/// Self-service profile edit. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub address: Option<String>,
    /// Donors only.
    pub is_available: Option<bool>,
    /// Hospitals only.
    pub hospital_name: Option<String>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(req: UpdateProfileRequest) -> Self {
        Self {
            name: req.name,
            phone: req.phone,
            city: req.city,
            state: req.state,
            address: req.address,
            is_available: req.is_available,
            hospital_name: req.hospital_name,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// An account with a fresh session token.
#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub user: PublicAccount,
    pub token: String,
}

// ── Router ──────────────────────────────────────────────────────────

/// Unauthenticated account endpoints.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
}

/// Endpoints acting on the caller's own account.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/auth/profile", put(update_profile))
        .route("/api/auth/password", put(change_password))
        .route("/api/auth/logout", post(logout))
}

// ── Handlers ────────────────────────────────────────────────────────

/// POST /api/auth/register: Create an account and open a session.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; returns the user and a session token"),
        (status = 400, description = "Validation error or email already registered", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<ApiResponse<AuthPayload>, AppError> {
    let req = extract_validated_json(body)?;
    let now = Utc::now();
    let account = orchestration::register_account(&state, req.into(), now).await?;
    let token = state
        .sessions
        .issue(account.id, state.config.session_ttl, now);
    Ok(ApiResponse::created(AuthPayload {
        user: PublicAccount::from(&account),
        token,
    })
    .with_message("User registered successfully"))
}

/// POST /api/auth/login: Exchange credentials for a session token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; returns the user and a session token"),
        (status = 401, description = "Invalid credentials or deactivated account", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<ApiResponse<AuthPayload>, AppError> {
    let req = extract_validated_json(body)?;
    let (account, token) = orchestration::login(&state, &req.email, &req.password, Utc::now())?;
    Ok(ApiResponse::ok(AuthPayload {
        user: PublicAccount::from(&account),
        token,
    })
    .with_message("Login successful"))
}

/// GET /api/auth/me: The caller's account.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "The caller's account"),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn me(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<ApiResponse<PublicAccount>, AppError> {
    let account = state
        .accounts
        .get(&caller.account_id)
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(ApiResponse::ok(PublicAccount::from(&account)))
}

/// PUT /api/auth/profile: Edit the caller's profile.
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated"),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn update_profile(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<ApiResponse<PublicAccount>, AppError> {
    let req = extract_json(body)?;
    let account = orchestration::update_profile(&state, &caller, req.into(), Utc::now()).await?;
    Ok(ApiResponse::ok(PublicAccount::from(&account)).with_message("Profile updated successfully"))
}

/// PUT /api/auth/password: Change the caller's password.
#[utoipa::path(
    put,
    path = "/api/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 401, description = "Current password is incorrect", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn change_password(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<ApiResponse<()>, AppError> {
    let req = extract_json(body)?;
    orchestration::change_password(
        &state,
        &caller,
        &req.current_password,
        &req.new_password,
        Utc::now(),
    )
    .await?;
    Ok(ApiResponse::ok(()).with_message("Password changed successfully"))
}

/// POST /api/auth/logout: Revoke the presented session token.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Logged out")),
    tag = "auth"
)]
async fn logout(
    State(state): State<AppState>,
    caller: CallerIdentity,
    headers: HeaderMap,
) -> ApiResponse<()> {
    let revoked = bearer_token(&headers)
        .map(|token| state.sessions.revoke(token))
        .unwrap_or(false);
    tracing::info!(account_id = %caller.account_id, revoked, "logout");
    ApiResponse::ok(()).with_message("Logged out successfully")
}
