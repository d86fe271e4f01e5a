//! # Authentication & Authorization Middleware
//!
//! Bearer token middleware with role-based access control.
//!
//! ## Token Formats
//!
//! ```text
//! Bearer {session_token}                : 64 hex chars issued by /api/auth/login
//! Bearer {role}:{account_id}:{secret}   : service token, when SERVICE_TOKEN_SECRET is set
//! ```
//!
//! Session tokens are random and stored only as SHA-256 digests with an
//! expiry. Service tokens authenticate as an existing account, which must be
//! active and hold the named role.
//!
//! ## CallerIdentity
//!
//! Every authenticated request gets a [`CallerIdentity`] injected into the
//! request extensions. Handlers extract it via the `FromRequestParts` impl
//! and pass it explicitly into every domain operation.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bloodnet_core::{to_hex, AccountId};
use bloodnet_state::Role;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller, available to all route handlers via
/// Axum's `FromRequestParts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account_id: AccountId,
    pub role: Role,
}

impl CallerIdentity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.contains(&self.role)
    }
}

/// Axum `FromRequestParts` implementation for `CallerIdentity`.
///
/// Extracts the identity that the auth middleware injected into extensions.
/// Returns 401 if no identity is present (middleware didn't run or failed).
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("Not authorized to access this route".into()))
    }
}

/// Check that the caller holds one of `roles`.
/// Returns 403 Forbidden otherwise.
pub fn require_any_role(caller: &CallerIdentity, roles: &[Role]) -> Result<(), AppError> {
    if caller.has_any_role(roles) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "User role {} is not authorized to access this route",
            caller.role
        )))
    }
}

// ── Sessions ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Session {
    account_id: AccountId,
    expires_at: DateTime<Utc>,
}

/// Issued login sessions, keyed by the SHA-256 digest of the token.
///
/// Custom `Debug` prints only the session count.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.len())
            .finish()
    }
}

fn token_digest(token: &str) -> String {
    to_hex(&Sha256::digest(token.as_bytes()))
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `account_id`, valid for `ttl`. Sessions that
    /// expired by `now` are swept first.
    pub fn issue(&self, account_id: AccountId, ttl: Duration, now: DateTime<Utc>) -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let token = to_hex(&bytes);
        let mut sessions = self.sessions.write();
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(
            token_digest(&token),
            Session {
                account_id,
                expires_at: now + ttl,
            },
        );
        token
    }

    /// The account a live token belongs to. Expired sessions are dropped.
    pub fn resolve(&self, token: &str, now: DateTime<Utc>) -> Option<AccountId> {
        let digest = token_digest(token);
        let session = self.sessions.read().get(&digest).copied()?;
        if session.expires_at <= now {
            self.sessions.write().remove(&digest);
            return None;
        }
        Some(session.account_id)
    }

    /// Revoke one token. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.write().remove(&token_digest(token)).is_some()
    }

    /// Revoke every session of an account. Returns how many were removed.
    pub fn revoke_account(&self, account_id: AccountId) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.account_id != account_id);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of secrets.
///
/// When lengths differ, performs a dummy comparison to avoid leaking length
/// information through timing variance.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a service token in format `{role}:{account_id}:{secret}`.
pub fn parse_service_token(provided: &str, expected_secret: &str) -> Result<(Role, AccountId), String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();
    if parts.len() != 3 {
        return Err("invalid token format".into());
    }
    if !constant_time_token_eq(parts[2], expected_secret) {
        return Err("invalid bearer token".into());
    }
    let role = parts[0]
        .parse::<Role>()
        .map_err(|_| format!("unknown role: {}", parts[0]))?;
    let account_id = parts[1]
        .parse::<AccountId>()
        .map_err(|e| format!("invalid account id: {e}"))?;
    Ok((role, account_id))
}

/// The token of a `Bearer` authorization header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve a bearer token to the identity of an active account.
pub fn authenticate(
    state: &AppState,
    token: &str,
    now: DateTime<Utc>,
) -> Result<CallerIdentity, String> {
    let (account_id, claimed_role) = if token.contains(':') {
        let secret = state
            .config
            .service_token_secret
            .as_deref()
            .ok_or_else(|| "service tokens are not enabled".to_string())?;
        let (role, id) = parse_service_token(token, secret)?;
        (id, Some(role))
    } else {
        let id = state
            .sessions
            .resolve(token, now)
            .ok_or_else(|| "Not authorized, token failed".to_string())?;
        (id, None)
    };

    let account = state
        .accounts
        .get(&account_id)
        .ok_or_else(|| "User not found".to_string())?;
    if !account.is_active {
        return Err("Account is deactivated".into());
    }
    if let Some(role) = claimed_role {
        if account.role() != role {
            return Err(format!("account does not hold role {role}"));
        }
    }
    Ok(CallerIdentity {
        account_id,
        role: account.role(),
    })
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Extract and validate the Bearer token from the Authorization header and
/// inject the caller's [`CallerIdentity`] into request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let has_header = request.headers().contains_key(header::AUTHORIZATION);
    let token = match bearer_token(request.headers()) {
        Some(token) => token.to_string(),
        None if has_header => {
            tracing::warn!("authentication failed: non-Bearer authorization scheme");
            return unauthorized_response("authorization header must use Bearer scheme");
        }
        None => {
            tracing::warn!("authentication failed: missing authorization header");
            return unauthorized_response("Not authorized to access this route");
        }
    };

    match authenticate(&state, &token, Utc::now()) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(msg) => {
            tracing::warn!(reason = %msg, "authentication failed");
            unauthorized_response(&msg)
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(ErrorBody::new(message))).into_response()
}
