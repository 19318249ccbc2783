//! IdentityRepository trait definition.
//!
//! Uses native async fn in traits (RPITIT, Rust 2024 edition). The
//! password hash is write-only through `create` and readable only through
//! `get_by_email_with_hash`; domain `Identity` values never carry it.

use agrilink_types::error::RepositoryError;
use agrilink_types::identity::Identity;
use uuid::Uuid;

/// Repository trait for account persistence.
///
/// Implementations live in agrilink-infra (e.g., `SqliteIdentityRepository`).
pub trait IdentityRepository: Send + Sync {
    /// Insert a new identity with its password hash.
    ///
    /// Returns `RepositoryError::Conflict` when the email is taken.
    fn create(
        &self,
        identity: &Identity,
        password_hash: &str,
    ) -> impl std::future::Future<Output = Result<Identity, RepositoryError>> + Send;

    /// Get an identity by its unique ID.
    fn get(
        &self,
        identity_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Identity>, RepositoryError>> + Send;

    /// Get several identities at once; missing ids are skipped.
    fn get_many(
        &self,
        identity_ids: &[Uuid],
    ) -> impl std::future::Future<Output = Result<Vec<Identity>, RepositoryError>> + Send;

    /// Look up an identity and its stored password hash by email.
    fn get_by_email_with_hash(
        &self,
        email: &str,
    ) -> impl std::future::Future<Output = Result<Option<(Identity, String)>, RepositoryError>> + Send;

    /// Persist profile and contact edits (name, phone, bio, location, skills).
    fn update(
        &self,
        identity: &Identity,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Agronomist directory search: case-insensitive substring match of
    /// `query` over name/bio/skills and of `location` over location.
    fn search_agronomists(
        &self,
        query: Option<&str>,
        location: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Vec<Identity>, RepositoryError>> + Send;

    /// Atomically add `amount` (> 0) to the wallet. Returns the new balance.
    fn credit_balance(
        &self,
        identity_id: &Uuid,
        amount: i64,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    /// Atomically subtract `amount` if the balance covers it.
    ///
    /// Returns the new balance, or `None` when funds are insufficient
    /// (the balance is left unchanged).
    fn try_debit_balance(
        &self,
        identity_id: &Uuid,
        amount: i64,
    ) -> impl std::future::Future<Output = Result<Option<i64>, RepositoryError>> + Send;
}
