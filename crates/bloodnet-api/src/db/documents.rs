//! JSONB document persistence.
//!
//! Every collection table has the shape
//! `(id UUID PRIMARY KEY, document JSONB NOT NULL, updated_at TIMESTAMPTZ)`.
//! Entity invariants are enforced by the domain types, not in SQL.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use bloodnet_state::{Account, Donation, EmergencyRequest, InventoryItem};

/// The persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Accounts,
    InventoryItems,
    Donations,
    EmergencyRequests,
}

impl Collection {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Accounts => "accounts",
            Self::InventoryItems => "inventory_items",
            Self::Donations => "donations",
            Self::EmergencyRequests => "emergency_requests",
        }
    }
}

/// An entity stored as one JSONB document.
pub trait Document: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn key(&self) -> Uuid;
}

impl Document for Account {
    const COLLECTION: Collection = Collection::Accounts;

    fn key(&self) -> Uuid {
        *self.id.as_uuid()
    }
}

impl Document for InventoryItem {
    const COLLECTION: Collection = Collection::InventoryItems;

    fn key(&self) -> Uuid {
        *self.id.as_uuid()
    }
}

impl Document for Donation {
    const COLLECTION: Collection = Collection::Donations;

    fn key(&self) -> Uuid {
        *self.id.as_uuid()
    }
}

impl Document for EmergencyRequest {
    const COLLECTION: Collection = Collection::EmergencyRequests;

    fn key(&self) -> Uuid {
        *self.id.as_uuid()
    }
}

fn encode<D: Document>(doc: &D) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::to_value(doc).map_err(|e| {
        tracing::error!(
            table = D::COLLECTION.table(),
            id = %doc.key(),
            error = %e,
            "failed to serialize document"
        );
        sqlx::Error::Encode(Box::new(e))
    })
}

/// Insert or replace a document.
pub async fn upsert<'e, E, D>(executor: E, doc: &D) -> Result<(), sqlx::Error>
where
    E: PgExecutor<'e>,
    D: Document,
{
    let value = encode(doc)?;
    let sql = format!(
        "INSERT INTO {} (id, document, updated_at) VALUES ($1, $2, now())
         ON CONFLICT (id) DO UPDATE SET document = EXCLUDED.document, updated_at = now()",
        D::COLLECTION.table()
    );
    sqlx::query(&sql)
        .bind(doc.key())
        .bind(&value)
        .execute(executor)
        .await?;
    Ok(())
}

/// Delete a document. Returns whether a row was removed.
pub async fn delete<'e, E>(executor: E, collection: Collection, id: Uuid) -> Result<bool, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let sql = format!("DELETE FROM {} WHERE id = $1", collection.table());
    let result = sqlx::query(&sql).bind(id).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}

/// Load every document of a collection.
pub async fn load_all<D: Document>(pool: &PgPool) -> Result<Vec<D>, sqlx::Error> {
    let sql = format!("SELECT document FROM {}", D::COLLECTION.table());
    let rows: Vec<(serde_json::Value,)> = sqlx::query_as(&sql).fetch_all(pool).await?;
    rows.into_iter()
        .map(|(value,)| {
            serde_json::from_value(value).map_err(|e| {
                tracing::error!(table = D::COLLECTION.table(), error = %e, "failed to decode document");
                sqlx::Error::Decode(Box::new(e))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bloodnet_core::{AccountId, BloodGroup};
    use chrono::{Duration, Utc};

    #[test]
    fn table_names_match_migration() {
        let sql = include_str!("../../migrations/0001_init.sql");
        for c in [
            Collection::Accounts,
            Collection::InventoryItems,
            Collection::Donations,
            Collection::EmergencyRequests,
        ] {
            assert!(
                sql.contains(&format!("CREATE TABLE IF NOT EXISTS {}", c.table())),
                "missing table {}",
                c.table()
            );
        }
    }

    #[test]
    fn documents_round_trip_through_json() {
        let now = Utc::now();
        let item = InventoryItem::from_donation(
            AccountId::new(),
            BloodGroup::ONegative,
            2,
            "DON-1".into(),
            "From donation by A".into(),
            now,
        );
        let value = encode(&item).unwrap();
        assert_eq!(value["bloodGroup"], "O-");
        let back: InventoryItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
        assert_eq!(back.key(), *item.id.as_uuid());
        assert!(back.expiry_date > now + Duration::days(41));
    }
}
