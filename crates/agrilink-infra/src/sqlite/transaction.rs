//! SQLite transaction ledger implementation.

use agrilink_core::transaction::TransactionRepository;
use agrilink_types::error::RepositoryError;
use agrilink_types::transaction::{Transaction, TransactionKind};
use sqlx::Row;
use uuid::Uuid;

use super::identity::{format_datetime, parse_datetime};
use super::pool::DatabasePool;

/// SQLite-backed implementation of `TransactionRepository`.
pub struct SqliteTransactionRepository {
    pool: DatabasePool,
}

impl SqliteTransactionRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn parse_uuid_opt(value: Option<String>, what: &str) -> Result<Option<Uuid>, RepositoryError> {
    value
        .map(|s| {
            Uuid::parse_str(&s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
        })
        .transpose()
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Transaction, RepositoryError> {
    let id: String = row
        .try_get("id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let kind: String = row
        .try_get("kind")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let kind: TransactionKind = kind.parse().map_err(RepositoryError::Query)?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

    Ok(Transaction {
        id: Uuid::parse_str(&id)
            .map_err(|e| RepositoryError::Query(format!("invalid transaction id: {e}")))?,
        kind,
        amount: row
            .try_get("amount")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        currency: row
            .try_get("currency")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        from_id: parse_uuid_opt(
            row.try_get("from_id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?,
            "from_id",
        )?,
        to_id: parse_uuid_opt(
            row.try_get("to_id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?,
            "to_id",
        )?,
        consultation_id: parse_uuid_opt(
            row.try_get("consultation_id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?,
            "consultation_id",
        )?,
        provider: row
            .try_get("provider")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        provider_payment_ref: row
            .try_get("provider_payment_ref")
            .map_err(|e| RepositoryError::Query(e.to_string()))?,
        created_at: parse_datetime(&created_at)?,
    })
}

impl TransactionRepository for SqliteTransactionRepository {
    async fn record(&self, transaction: &Transaction) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO transactions (id, kind, amount, currency, from_id, to_id, consultation_id, provider, provider_payment_ref, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(transaction.id.to_string())
        .bind(transaction.kind.to_string())
        .bind(transaction.amount)
        .bind(&transaction.currency)
        .bind(transaction.from_id.map(|id| id.to_string()))
        .bind(transaction.to_id.map(|id| id.to_string()))
        .bind(transaction.consultation_id.map(|id| id.to_string()))
        .bind(&transaction.provider)
        .bind(&transaction.provider_payment_ref)
        .bind(format_datetime(&transaction.created_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_for(&self, identity_id: &Uuid) -> Result<Vec<Transaction>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM transactions
               WHERE from_id = ? OR to_id = ?
               ORDER BY created_at DESC"#,
        )
        .bind(identity_id.to_string())
        .bind(identity_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(from_row).collect()
    }
}
