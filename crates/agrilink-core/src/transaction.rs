//! TransactionRepository trait definition.
//!
//! The transaction ledger is append-only; there is no update or delete.

use agrilink_types::error::RepositoryError;
use agrilink_types::transaction::Transaction;
use uuid::Uuid;

/// Repository trait for the audit ledger.
///
/// Implementations live in agrilink-infra (e.g., `SqliteTransactionRepository`).
pub trait TransactionRepository: Send + Sync {
    /// Append one ledger entry.
    fn record(
        &self,
        transaction: &Transaction,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List entries where the identity is payer or payee, newest first.
    fn list_for(
        &self,
        identity_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Transaction>, RepositoryError>> + Send;
}
