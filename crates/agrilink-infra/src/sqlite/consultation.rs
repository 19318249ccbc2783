//! SQLite consultation repository implementation.
//!
//! The `pending -> paid` gate is a conditional UPDATE on status, so only
//! one capture can ever win for a consultation.

use agrilink_core::consultation::repository::ConsultationRepository;
use agrilink_types::consultation::{Consultation, ConsultationStatus, PaymentRecord};
use agrilink_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::identity::{format_datetime, parse_datetime};
use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConsultationRepository`.
pub struct SqliteConsultationRepository {
    pool: DatabasePool,
}

impl SqliteConsultationRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn fetch_list(&self, sql: &str, bind: Option<String>) -> Result<Vec<Consultation>, RepositoryError> {
        let mut query = sqlx::query(sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut consultations = Vec::with_capacity(rows.len());
        for row in &rows {
            let consultation_row = ConsultationRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            consultations.push(consultation_row.into_consultation()?);
        }
        Ok(consultations)
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConsultationRow {
    id: String,
    farmer_id: String,
    agronomist_id: String,
    topic: String,
    description: Option<String>,
    scheduled_at: Option<String>,
    price: i64,
    currency: String,
    status: String,
    payment_ref: Option<String>,
    payment_provider: Option<String>,
    paid_at: Option<String>,
    notes: Option<String>,
    created_at: String,
    updated_at: String,
}

impl ConsultationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            farmer_id: row.try_get("farmer_id")?,
            agronomist_id: row.try_get("agronomist_id")?,
            topic: row.try_get("topic")?,
            description: row.try_get("description")?,
            scheduled_at: row.try_get("scheduled_at")?,
            price: row.try_get("price")?,
            currency: row.try_get("currency")?,
            status: row.try_get("status")?,
            payment_ref: row.try_get("payment_ref")?,
            payment_provider: row.try_get("payment_provider")?,
            paid_at: row.try_get("paid_at")?,
            notes: row.try_get("notes")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_consultation(self) -> Result<Consultation, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid consultation id: {e}")))?;
        let farmer_id = Uuid::parse_str(&self.farmer_id)
            .map_err(|e| RepositoryError::Query(format!("invalid farmer_id: {e}")))?;
        let agronomist_id = Uuid::parse_str(&self.agronomist_id)
            .map_err(|e| RepositoryError::Query(format!("invalid agronomist_id: {e}")))?;
        let status: ConsultationStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let scheduled_at = self
            .scheduled_at
            .as_deref()
            .map(parse_datetime)
            .transpose()?;
        let created_at = parse_datetime(&self.created_at)?;
        let updated_at = parse_datetime(&self.updated_at)?;

        // A payment record exists only when all three columns are set.
        let payment = match (self.payment_ref, self.payment_provider, self.paid_at) {
            (Some(payment_ref), Some(provider), Some(paid_at)) => Some(PaymentRecord {
                payment_ref,
                provider,
                paid_at: parse_datetime(&paid_at)?,
            }),
            _ => None,
        };

        Ok(Consultation {
            id,
            farmer_id,
            agronomist_id,
            topic: self.topic,
            description: self.description,
            scheduled_at,
            price: self.price,
            currency: self.currency,
            status,
            payment,
            notes: self.notes,
            created_at,
            updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// ConsultationRepository implementation
// ---------------------------------------------------------------------------

impl ConsultationRepository for SqliteConsultationRepository {
    async fn create(&self, consultation: &Consultation) -> Result<Consultation, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO consultations (id, farmer_id, agronomist_id, topic, description, scheduled_at, price, currency, status, notes, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(consultation.id.to_string())
        .bind(consultation.farmer_id.to_string())
        .bind(consultation.agronomist_id.to_string())
        .bind(&consultation.topic)
        .bind(&consultation.description)
        .bind(consultation.scheduled_at.as_ref().map(format_datetime))
        .bind(consultation.price)
        .bind(&consultation.currency)
        .bind(consultation.status.to_string())
        .bind(&consultation.notes)
        .bind(format_datetime(&consultation.created_at))
        .bind(format_datetime(&consultation.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(consultation.clone())
    }

    async fn get(&self, consultation_id: &Uuid) -> Result<Option<Consultation>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM consultations WHERE id = ?")
            .bind(consultation_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let consultation_row = ConsultationRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(consultation_row.into_consultation()?))
            }
            None => Ok(None),
        }
    }

    async fn list_for_farmer(
        &self,
        farmer_id: &Uuid,
    ) -> Result<Vec<Consultation>, RepositoryError> {
        self.fetch_list(
            "SELECT * FROM consultations WHERE farmer_id = ? ORDER BY created_at DESC",
            Some(farmer_id.to_string()),
        )
        .await
    }

    async fn list_for_agronomist(
        &self,
        agronomist_id: &Uuid,
    ) -> Result<Vec<Consultation>, RepositoryError> {
        self.fetch_list(
            "SELECT * FROM consultations WHERE agronomist_id = ? ORDER BY created_at DESC",
            Some(agronomist_id.to_string()),
        )
        .await
    }

    async fn list_all(&self) -> Result<Vec<Consultation>, RepositoryError> {
        self.fetch_list("SELECT * FROM consultations ORDER BY created_at DESC", None)
            .await
    }

    async fn update(&self, consultation: &Consultation) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE consultations SET status = ?, notes = ?, updated_at = ? WHERE id = ?"#,
        )
        .bind(consultation.status.to_string())
        .bind(&consultation.notes)
        .bind(format_datetime(&consultation.updated_at))
        .bind(consultation.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn mark_paid(
        &self,
        consultation_id: &Uuid,
        payment: &PaymentRecord,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE consultations
               SET status = 'paid', payment_ref = ?, payment_provider = ?, paid_at = ?, updated_at = ?
               WHERE id = ? AND status = 'pending'"#,
        )
        .bind(&payment.payment_ref)
        .bind(&payment.provider)
        .bind(format_datetime(&payment.paid_at))
        .bind(format_datetime(&payment.paid_at))
        .bind(consultation_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}
