//! ChatRepository trait definition.
//!
//! The append path is the single authoritative write point per thread:
//! message insert, sender receipt, and activity bump commit together, so
//! fan-out order follows commit order.

use agrilink_types::chat::{ChatMessage, ChatThread};
use agrilink_types::error::RepositoryError;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Repository trait for chat thread and message persistence.
///
/// Implementations live in agrilink-infra (e.g., `SqliteChatRepository`).
pub trait ChatRepository: Send + Sync {
    /// Insert a new thread.
    ///
    /// Returns `RepositoryError::Conflict` when an active thread already
    /// exists for the consultation (the partial unique index decides
    /// concurrent creation races).
    fn create_thread(
        &self,
        thread: &ChatThread,
    ) -> impl std::future::Future<Output = Result<ChatThread, RepositoryError>> + Send;

    /// Find the active thread for a consultation, if any.
    fn find_active_thread(
        &self,
        consultation_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ChatThread>, RepositoryError>> + Send;

    /// Get a thread by its unique ID.
    fn get_thread(
        &self,
        thread_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ChatThread>, RepositoryError>> + Send;

    /// Active threads where the identity participates, most recent
    /// activity first.
    fn list_threads_for(
        &self,
        identity_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ChatThread>, RepositoryError>> + Send;

    /// Append a message (with its initial receipts) and bump the thread's
    /// activity timestamp, atomically.
    fn append_message(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Messages of a thread in append order, receipts populated.
    fn get_messages(
        &self,
        thread_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// The most recent message of a thread, receipts populated.
    fn get_last_message(
        &self,
        thread_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ChatMessage>, RepositoryError>> + Send;

    /// Add a receipt for `reader_id` to every message of the thread that
    /// lacks one. Idempotent; returns how many receipts were added.
    fn mark_read(
        &self,
        thread_id: &Uuid,
        reader_id: &Uuid,
        read_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
