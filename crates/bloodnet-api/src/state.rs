//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! AppState holds:
//! - **Accounts**: donors, patients, hospitals and administrators
//! - **Inventory**: per-hospital blood stock batches
//! - **Donations**: donation records
//! - **Requests**: emergency blood requests
//! - **Sessions**: issued login tokens (see [`crate::auth::SessionStore`])
//! - **Workflow lock**: serializes multi-entity workflows
//! - **Database pool** (optional): write-through persistence

use std::collections::HashMap;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;

use bloodnet_core::{AccountId, DonationId, InventoryItemId, RequestId};
use bloodnet_state::{
    Account, Donation, EmergencyRequest, InventoryItem, Location, Registration, Role,
};
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use sqlx::PgPool;
use thiserror::Error;

use crate::auth::SessionStore;
use crate::db::{self, Document, WriteSet};
use crate::error::AppError;
use crate::middleware::metrics::ApiMetrics;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// All operations are synchronous (the RwLock is `parking_lot`, not `tokio::sync`)
/// because we never hold the lock across `.await` points. `parking_lot::RwLock`
/// is non-poisonable: a panicking writer does not permanently corrupt the store.
#[derive(Debug)]
pub struct Store<K, T> {
    data: Arc<RwLock<HashMap<K, T>>>,
}

impl<K, T> Clone for Store<K, T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K: Copy + Eq + Hash, T: Clone + Send + Sync> Store<K, T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: K, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &K) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Clone out the records matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data
            .read()
            .values()
            .filter(|v| pred(v))
            .cloned()
            .collect()
    }

    /// Run `f` over the records under a read lock, without cloning them.
    pub fn read<R>(&self, f: impl FnOnce(&HashMap<K, T>) -> R) -> R {
        f(&self.data.read())
    }

    /// Remove a record by ID.
    pub fn remove(&self, id: &K) -> Option<T> {
        self.data.write().remove(id)
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &K) -> bool {
        self.data.read().contains_key(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Copy + Eq + Hash, T: Clone + Send + Sync> Default for Store<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Configuration ------------------------------------------------------------

/// Deployment mode. Development responses include error debug output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(format!("expected development or production, got {other:?}")),
        }
    }
}

/// What an approval does when the approving hospital holds no batch large
/// enough to cover the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApprovalStockPolicy {
    /// Approve anyway and leave inventory unchanged.
    #[default]
    Lenient,
    /// Refuse the approval; the request stays pending.
    Strict,
}

impl FromStr for ApprovalStockPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lenient" => Ok(Self::Lenient),
            "strict" => Ok(Self::Strict),
            other => Err(format!("expected lenient or strict, got {other:?}")),
        }
    }
}

/// Credentials for the administrator account created at startup.
#[derive(Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl std::fmt::Debug for AdminBootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminBootstrap")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("name", &self.name)
            .finish()
    }
}

/// Errors raised while reading configuration from the environment.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var} must be set when {because} is set")]
    Missing {
        var: &'static str,
        because: &'static str,
    },
}

/// Application configuration.
///
/// Custom `Debug` redacts secrets to prevent credential leakage in logs.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    pub environment: Environment,
    /// Shared secret for `{role}:{account_id}:{secret}` service tokens.
    /// If `None`, only session tokens are accepted.
    pub service_token_secret: Option<String>,
    /// Lifetime of a login session.
    pub session_ttl: Duration,
    pub approval_stock_policy: ApprovalStockPolicy,
    pub bootstrap_admin: Option<AdminBootstrap>,
    /// Postgres connection string. `None` means in-memory only.
    pub database_url: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field(
                "service_token_secret",
                &self.service_token_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("session_ttl_hours", &self.session_ttl.num_hours())
            .field("approval_stock_policy", &self.approval_stock_policy)
            .field("bootstrap_admin", &self.bootstrap_admin)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            environment: Environment::Development,
            service_token_secret: None,
            session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            approval_stock_policy: ApprovalStockPolicy::Lenient,
            bootstrap_admin: None,
            database_url: None,
        }
    }
}

const DEFAULT_SESSION_TTL_HOURS: i64 = 168;

fn parse_var<T: FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

impl AppConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = parse_var("PORT", get("PORT"), 8080u16)?;
        let environment = parse_var("APP_ENV", get("APP_ENV"), Environment::Development)?;
        let ttl_hours = parse_var(
            "SESSION_TTL_HOURS",
            get("SESSION_TTL_HOURS"),
            DEFAULT_SESSION_TTL_HOURS,
        )?;
        if ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                var: "SESSION_TTL_HOURS",
                value: ttl_hours.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        let approval_stock_policy = parse_var(
            "APPROVAL_STOCK_POLICY",
            get("APPROVAL_STOCK_POLICY"),
            ApprovalStockPolicy::Lenient,
        )?;

        let bootstrap_admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                email,
                password,
                name: get("ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Missing {
                    var: "ADMIN_PASSWORD",
                    because: "ADMIN_EMAIL",
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Missing {
                    var: "ADMIN_EMAIL",
                    because: "ADMIN_PASSWORD",
                })
            }
            (None, None) => None,
        };

        Ok(Self {
            port,
            environment,
            service_token_secret: get("SERVICE_TOKEN_SECRET"),
            session_ttl: Duration::hours(ttl_hours),
            approval_stock_policy,
            bootstrap_admin,
            database_url: get("DATABASE_URL"),
        })
    }
}

/// A collection that could not be loaded at startup.
#[derive(Error, Debug)]
#[error("failed to load {table}: {source}")]
pub struct HydrateError {
    pub table: &'static str,
    #[source]
    pub source: sqlx::Error,
}

async fn load<D: Document>(pool: &PgPool) -> Result<Vec<D>, HydrateError> {
    db::documents::load_all(pool)
        .await
        .map_err(|source| HydrateError {
            table: D::COLLECTION.table(),
            source,
        })
}

// -- Application State --------------------------------------------------------

/// Shared application state accessible to all route handlers.
///
/// Clone-friendly via `Arc` internals in each `Store`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub accounts: Store<AccountId, Account>,
    pub inventory: Store<InventoryItemId, InventoryItem>,
    pub donations: Store<DonationId, Donation>,
    pub requests: Store<RequestId, EmergencyRequest>,
    pub sessions: SessionStore,

    /// Held for the whole of any operation that reads and then writes more
    /// than one record (donation fan-out, approval deduction, stock merge,
    /// email uniqueness). A `tokio` mutex because the guard is held across
    /// the database commit.
    pub workflow_lock: Arc<tokio::sync::Mutex<()>>,

    pub metrics: ApiMetrics,

    /// PostgreSQL connection pool for durable state persistence.
    /// When `None`, the API operates in in-memory-only mode.
    pub db_pool: Option<PgPool>,

    pub config: AppConfig,
}

impl AppState {
    /// Create a new application state with default configuration, in memory.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// Create a new application state with the given configuration and
    /// optional database pool.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        Self {
            accounts: Store::new(),
            inventory: Store::new(),
            donations: Store::new(),
            requests: Store::new(),
            sessions: SessionStore::new(),
            workflow_lock: Arc::new(tokio::sync::Mutex::new(())),
            metrics: ApiMetrics::new(),
            db_pool,
            config,
        }
    }

    /// Persist a set of writes in one transaction (no-op without a database).
    ///
    /// Callers publish to the in-memory stores only after this returns `Ok`.
    pub async fn persist(&self, writes: WriteSet) -> Result<(), AppError> {
        let pool = match &self.db_pool {
            Some(pool) if !writes.is_empty() => pool,
            _ => return Ok(()),
        };
        let count = writes.len();
        writes.commit(pool).await.map_err(|e| {
            tracing::error!(writes = count, error = %e, "failed to persist to database");
            AppError::Internal("database persist failed".to_string())
        })
    }

    /// Account with this (already normalized) email address.
    pub fn account_by_email(&self, email: &str) -> Option<Account> {
        self.accounts
            .read(|all| all.values().find(|a| a.email == email).cloned())
    }

    /// An active account with the hospital role, or `NotFound`.
    pub fn active_hospital(&self, id: AccountId) -> Result<Account, AppError> {
        self.accounts
            .get(&id)
            .filter(|a| a.is_active_with_role(Role::Hospital))
            .ok_or_else(|| AppError::NotFound("Hospital not found".to_string()))
    }

    /// Create the configured administrator account unless one with that
    /// email already exists.
    pub async fn bootstrap_admin(&self) -> Result<Option<AccountId>, AppError> {
        let admin = match &self.config.bootstrap_admin {
            Some(admin) => admin.clone(),
            None => return Ok(None),
        };
        let registration = Registration {
            name: admin.name,
            email: admin.email,
            password: admin.password,
            phone: BOOTSTRAP_ADMIN_PHONE.to_string(),
            role: Role::Admin,
            blood_group: None,
            location: Location {
                city: BOOTSTRAP_ADMIN_PLACE.to_string(),
                state: BOOTSTRAP_ADMIN_PLACE.to_string(),
                address: None,
            },
            hospital_name: None,
            registration_number: None,
        };
        match crate::orchestration::register_account(self, registration, Utc::now()).await {
            Ok(account) => {
                tracing::info!(account_id = %account.id, "bootstrap administrator created");
                Ok(Some(account.id))
            }
            Err(AppError::Validation { message, .. }) if message == EMAIL_TAKEN => {
                tracing::debug!("bootstrap administrator already exists");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Hydrate in-memory stores from the database.
    ///
    /// Called once on startup when a database pool is available.
    pub async fn hydrate_from_db(&self) -> Result<(), HydrateError> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let accounts: Vec<Account> = load(pool).await?;
        let account_count = accounts.len();
        for record in accounts {
            self.accounts.insert(record.id, record);
        }

        let items: Vec<InventoryItem> = load(pool).await?;
        let item_count = items.len();
        for record in items {
            self.inventory.insert(record.id, record);
        }

        let donations: Vec<Donation> = load(pool).await?;
        let donation_count = donations.len();
        for record in donations {
            self.donations.insert(record.id, record);
        }

        let requests: Vec<EmergencyRequest> = load(pool).await?;
        let request_count = requests.len();
        for record in requests {
            self.requests.insert(record.id, record);
        }

        tracing::info!(
            accounts = account_count,
            inventory = item_count,
            donations = donation_count,
            requests = request_count,
            "Hydrated in-memory stores from database"
        );

        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Message of the validation error raised for a duplicate email.
pub const EMAIL_TAKEN: &str = "User already exists with this email";

const BOOTSTRAP_ADMIN_PHONE: &str = "0000000000";
const BOOTSTRAP_ADMIN_PLACE: &str = "Headquarters";
