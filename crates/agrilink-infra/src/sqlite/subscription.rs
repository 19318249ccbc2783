//! SQLite subscription repository implementation.

use agrilink_core::subscription::repository::SubscriptionRepository;
use agrilink_types::error::RepositoryError;
use agrilink_types::subscription::Subscription;
use sqlx::Row;
use uuid::Uuid;

use super::identity::{format_datetime, parse_datetime};
use super::pool::DatabasePool;

/// SQLite-backed implementation of `SubscriptionRepository`.
pub struct SqliteSubscriptionRepository {
    pool: DatabasePool,
}

impl SqliteSubscriptionRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Subscription, RepositoryError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let farmer_id: String = row
        .try_get("farmer_id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let started_at: String = row
        .try_get("started_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let expires_at: String = row
        .try_get("expires_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let active: i64 = row
        .try_get("active")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(Subscription {
        id: Uuid::parse_str(&id)
            .map_err(|e| RepositoryError::Query(format!("invalid subscription id: {e}")))?,
        farmer_id: Uuid::parse_str(&farmer_id)
            .map_err(|e| RepositoryError::Query(format!("invalid farmer_id: {e}")))?,
        plan_id: row
            .try_get("plan_id")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        price: row
            .try_get("price")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        currency: row
            .try_get("currency")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        started_at: parse_datetime(&started_at)?,
        expires_at: parse_datetime(&expires_at)?,
        provider: row
            .try_get("provider")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        active: active != 0,
    })
}

impl SubscriptionRepository for SqliteSubscriptionRepository {
    async fn create(&self, subscription: &Subscription) -> Result<Subscription, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO subscriptions (id, farmer_id, plan_id, price, currency, started_at, expires_at, provider, active)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(subscription.id.to_string())
        .bind(subscription.farmer_id.to_string())
        .bind(&subscription.plan_id)
        .bind(subscription.price)
        .bind(&subscription.currency)
        .bind(format_datetime(&subscription.started_at))
        .bind(format_datetime(&subscription.expires_at))
        .bind(&subscription.provider)
        .bind(subscription.active as i64)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(subscription.clone())
    }

    async fn list_for(&self, farmer_id: &Uuid) -> Result<Vec<Subscription>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM subscriptions WHERE farmer_id = ? ORDER BY started_at DESC",
        )
        .bind(farmer_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::consultation::tests::seed_parties;
    use crate::sqlite::pool::tests::test_pool;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_create_and_list_roundtrip() {
        let pool = test_pool().await;
        let repo = SqliteSubscriptionRepository::new(pool.clone());
        let (farmer, _) = seed_parties(&pool).await;

        let started_at = Utc::now();
        let subscription = Subscription {
            id: Uuid::now_v7(),
            farmer_id: farmer,
            plan_id: "monthly-basic".to_string(),
            price: 500,
            currency: "usd".to_string(),
            started_at,
            expires_at: started_at + Duration::days(30),
            provider: "mock".to_string(),
            active: true,
        };
        repo.create(&subscription).await.unwrap();

        let listed = repo.list_for(&farmer).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].plan_id, "monthly-basic");
        assert!(listed[0].active);
        assert!(listed[0].is_current(Utc::now()));

        assert!(repo.list_for(&Uuid::now_v7()).await.unwrap().is_empty());
    }
}
