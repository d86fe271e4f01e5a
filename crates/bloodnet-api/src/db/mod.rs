//! # Database Persistence Layer
//!
//! Optional Postgres write-through for the in-memory stores via SQLx.
//!
//! ## Architecture
//!
//! When `DATABASE_URL` is set, every mutation is committed before it is
//! published to the in-memory stores, and the stores are hydrated from the database on
//! startup. When absent, the API runs in in-memory-only mode (suitable for
//! development and tests).
//!
//! Each entity is stored as a JSONB document keyed by its UUID in its own
//! table (see `migrations/`). Mutations touching several records are
//! collected in a [`WriteSet`] and committed in a single transaction.
//!
//! Sessions are not persisted; a restart logs everyone out.

pub mod documents;

use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use bloodnet_state::{Account, Donation, EmergencyRequest, InventoryItem};

pub use documents::{Collection, Document};

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if no URL is configured (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let url = match database_url {
        Some(url) => url,
        None => {
            tracing::warn!(
                "DATABASE_URL not set; running in-memory only. State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Records touched by one operation, persisted together.
#[derive(Debug, Default)]
pub struct WriteSet {
    accounts: Vec<Account>,
    items: Vec<InventoryItem>,
    donations: Vec<Donation>,
    requests: Vec<EmergencyRequest>,
    deletions: Vec<(Collection, Uuid)>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(mut self, account: &Account) -> Self {
        self.accounts.push(account.clone());
        self
    }

    pub fn item(mut self, item: &InventoryItem) -> Self {
        self.items.push(item.clone());
        self
    }

    pub fn donation(mut self, donation: &Donation) -> Self {
        self.donations.push(donation.clone());
        self
    }

    pub fn request(mut self, request: &EmergencyRequest) -> Self {
        self.requests.push(request.clone());
        self
    }

    pub fn delete(mut self, collection: Collection, id: Uuid) -> Self {
        self.deletions.push((collection, id));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.items.is_empty()
            && self.donations.is_empty()
            && self.requests.is_empty()
            && self.deletions.is_empty()
    }

    /// Number of upserts and deletions in the set.
    pub fn len(&self) -> usize {
        self.accounts.len()
            + self.items.len()
            + self.donations.len()
            + self.requests.len()
            + self.deletions.len()
    }

    /// Apply every write in one transaction. Nothing is committed if any
    /// statement fails.
    pub async fn commit(self, pool: &PgPool) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;
        for account in &self.accounts {
            documents::upsert(&mut *tx, account).await?;
        }
        for item in &self.items {
            documents::upsert(&mut *tx, item).await?;
        }
        for donation in &self.donations {
            documents::upsert(&mut *tx, donation).await?;
        }
        for request in &self.requests {
            documents::upsert(&mut *tx, request).await?;
        }
        for (collection, id) in &self.deletions {
            documents::delete(&mut *tx, *collection, *id).await?;
        }
        tx.commit().await
    }
}
