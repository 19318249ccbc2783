//! SQLite identity repository implementation.
//!
//! Implements `IdentityRepository` from `agrilink-core` using sqlx with
//! split read/write pools: raw queries, private Row structs, RFC 3339 text
//! timestamps. Skills are stored JSON-encoded in a single column.

use agrilink_core::identity::repository::IdentityRepository;
use agrilink_types::error::RepositoryError;
use agrilink_types::identity::{Identity, Profile, Role, Wallet};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `IdentityRepository`.
pub struct SqliteIdentityRepository {
    pool: DatabasePool,
}

impl SqliteIdentityRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row type for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct IdentityRow {
    id: String,
    name: String,
    email: String,
    role: String,
    phone: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    skills: String,
    balance: i64,
    currency: String,
    created_at: String,
    updated_at: String,
}

impl IdentityRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            role: row.try_get("role")?,
            phone: row.try_get("phone")?,
            bio: row.try_get("bio")?,
            location: row.try_get("location")?,
            skills: row.try_get("skills")?,
            balance: row.try_get("balance")?,
            currency: row.try_get("currency")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_identity(self) -> Result<Identity, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid identity id: {e}")))?;
        let role: Role = self
            .role
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let skills: Vec<String> = serde_json::from_str(&self.skills)
            .map_err(|e| RepositoryError::Query(format!("invalid skills json: {e}")))?;
        let created_at = parse_datetime(&self.created_at)?;
        let updated_at = parse_datetime(&self.updated_at)?;

        Ok(Identity {
            id,
            name: self.name,
            email: self.email,
            role,
            phone: self.phone,
            profile: Profile {
                bio: self.bio,
                location: self.location,
                skills,
            },
            wallet: Wallet {
                balance: self.balance,
                currency: self.currency,
            },
            created_at,
            updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn map_unique_violation(e: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return RepositoryError::Conflict(what.to_string());
        }
    }
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// IdentityRepository implementation
// ---------------------------------------------------------------------------

impl IdentityRepository for SqliteIdentityRepository {
    async fn create(
        &self,
        identity: &Identity,
        password_hash: &str,
    ) -> Result<Identity, RepositoryError> {
        let skills = serde_json::to_string(&identity.profile.skills)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO identities (id, name, email, password_hash, role, phone, bio, location, skills, balance, currency, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(identity.id.to_string())
        .bind(&identity.name)
        .bind(&identity.email)
        .bind(password_hash)
        .bind(identity.role.to_string())
        .bind(&identity.phone)
        .bind(&identity.profile.bio)
        .bind(&identity.profile.location)
        .bind(skills)
        .bind(identity.wallet.balance)
        .bind(&identity.wallet.currency)
        .bind(format_datetime(&identity.created_at))
        .bind(format_datetime(&identity.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| map_unique_violation(e, "email already in use"))?;

        Ok(identity.clone())
    }

    async fn get(&self, identity_id: &Uuid) -> Result<Option<Identity>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM identities WHERE id = ?")
            .bind(identity_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let identity_row = IdentityRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(identity_row.into_identity()?))
            }
            None => Ok(None),
        }
    }

    async fn get_many(&self, identity_ids: &[Uuid]) -> Result<Vec<Identity>, RepositoryError> {
        if identity_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; identity_ids.len()].join(", ");
        let sql = format!("SELECT * FROM identities WHERE id IN ({placeholders})");

        let mut query = sqlx::query(&sql);
        for id in identity_ids {
            query = query.bind(id.to_string());
        }
        let rows = query
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut identities = Vec::with_capacity(rows.len());
        for row in &rows {
            let identity_row =
                IdentityRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            identities.push(identity_row.into_identity()?);
        }
        Ok(identities)
    }

    async fn get_by_email_with_hash(
        &self,
        email: &str,
    ) -> Result<Option<(Identity, String)>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM identities WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let password_hash: String = row
                    .try_get("password_hash")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                let identity_row = IdentityRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some((identity_row.into_identity()?, password_hash)))
            }
            None => Ok(None),
        }
    }

    async fn update(&self, identity: &Identity) -> Result<(), RepositoryError> {
        let skills = serde_json::to_string(&identity.profile.skills)
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            r#"UPDATE identities
               SET name = ?, phone = ?, bio = ?, location = ?, skills = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&identity.name)
        .bind(&identity.phone)
        .bind(&identity.profile.bio)
        .bind(&identity.profile.location)
        .bind(skills)
        .bind(format_datetime(&identity.updated_at))
        .bind(identity.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn search_agronomists(
        &self,
        query: Option<&str>,
        location: Option<&str>,
    ) -> Result<Vec<Identity>, RepositoryError> {
        let mut sql = String::from("SELECT * FROM identities WHERE role = 'agronomist'");
        if query.is_some() {
            sql.push_str(
                " AND (lower(name) LIKE ? OR lower(coalesce(bio, '')) LIKE ? OR lower(skills) LIKE ?)",
            );
        }
        if location.is_some() {
            sql.push_str(" AND lower(coalesce(location, '')) LIKE ?");
        }
        sql.push_str(" ORDER BY name ASC");

        let mut q = sqlx::query(&sql);
        if let Some(query) = query {
            let pattern = format!("%{}%", query.to_lowercase());
            q = q.bind(pattern.clone()).bind(pattern.clone()).bind(pattern);
        }
        if let Some(location) = location {
            q = q.bind(format!("%{}%", location.to_lowercase()));
        }

        let rows = q
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut identities = Vec::with_capacity(rows.len());
        for row in &rows {
            let identity_row =
                IdentityRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            identities.push(identity_row.into_identity()?);
        }
        Ok(identities)
    }

    async fn credit_balance(
        &self,
        identity_id: &Uuid,
        amount: i64,
    ) -> Result<i64, RepositoryError> {
        let row = sqlx::query(
            "UPDATE identities SET balance = balance + ?, updated_at = ? WHERE id = ? RETURNING balance",
        )
        .bind(amount)
        .bind(format_datetime(&Utc::now()))
        .bind(identity_id.to_string())
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => row
                .try_get("balance")
                .map_err(|e| RepositoryError::Query(e.to_string())),
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn try_debit_balance(
        &self,
        identity_id: &Uuid,
        amount: i64,
    ) -> Result<Option<i64>, RepositoryError> {
        let row = sqlx::query(
            r#"UPDATE identities SET balance = balance - ?, updated_at = ?
               WHERE id = ? AND balance >= ?
               RETURNING balance"#,
        )
        .bind(amount)
        .bind(format_datetime(&Utc::now()))
        .bind(identity_id.to_string())
        .bind(amount)
        .fetch_optional(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let balance: i64 = row
                    .try_get("balance")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(balance))
            }
            // Unknown id and insufficient funds both land here; callers
            // resolve existence before debiting.
            None => Ok(None),
        }
    }
}
