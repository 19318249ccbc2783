//! SQLite chat repository implementation.
//!
//! Message insert, initial receipts, and the thread activity bump commit
//! in one writer transaction, so subscribers observe messages in commit
//! order. The partial unique index on active threads turns concurrent
//! find-or-create races into a `Conflict` for the loser.

use agrilink_core::chat::repository::ChatRepository;
use agrilink_types::chat::{ChatMessage, ChatThread, MessageType, ReadReceipt};
use agrilink_types::error::RepositoryError;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::collections::HashMap;
use uuid::Uuid;

use super::identity::{format_datetime, parse_datetime};
use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatRepository`.
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Receipts for a set of messages, grouped by message id.
    async fn receipts_for_thread(
        &self,
        thread_id: &Uuid,
    ) -> Result<HashMap<String, Vec<ReadReceipt>>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT mr.message_id, mr.reader_id, mr.read_at
               FROM message_reads mr
               JOIN chat_messages m ON m.id = mr.message_id
               WHERE m.thread_id = ?
               ORDER BY mr.read_at ASC"#,
        )
        .bind(thread_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut grouped: HashMap<String, Vec<ReadReceipt>> = HashMap::new();
        for row in &rows {
            let message_id: String = row
                .try_get("message_id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            grouped
                .entry(message_id)
                .or_default()
                .push(receipt_from_row(row)?);
        }
        Ok(grouped)
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ChatThreadRow {
    id: String,
    consultation_id: String,
    farmer_id: String,
    agronomist_id: String,
    is_active: i64,
    created_at: String,
    updated_at: String,
}

impl ChatThreadRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            consultation_id: row.try_get("consultation_id")?,
            farmer_id: row.try_get("farmer_id")?,
            agronomist_id: row.try_get("agronomist_id")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_thread(self) -> Result<ChatThread, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid thread id: {e}")))?;
        let consultation_id = Uuid::parse_str(&self.consultation_id)
            .map_err(|e| RepositoryError::Query(format!("invalid consultation_id: {e}")))?;
        let farmer_id = Uuid::parse_str(&self.farmer_id)
            .map_err(|e| RepositoryError::Query(format!("invalid farmer_id: {e}")))?;
        let agronomist_id = Uuid::parse_str(&self.agronomist_id)
            .map_err(|e| RepositoryError::Query(format!("invalid agronomist_id: {e}")))?;

        Ok(ChatThread {
            id,
            consultation_id,
            farmer_id,
            agronomist_id,
            is_active: self.is_active != 0,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

struct ChatMessageRow {
    id: String,
    thread_id: String,
    sender_id: String,
    content: String,
    message_type: String,
    file_ref: Option<String>,
    created_at: String,
}

impl ChatMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            thread_id: row.try_get("thread_id")?,
            sender_id: row.try_get("sender_id")?,
            content: row.try_get("content")?,
            message_type: row.try_get("message_type")?,
            file_ref: row.try_get("file_ref")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self, read_by: Vec<ReadReceipt>) -> Result<ChatMessage, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let thread_id = Uuid::parse_str(&self.thread_id)
            .map_err(|e| RepositoryError::Query(format!("invalid thread_id: {e}")))?;
        let sender_id = Uuid::parse_str(&self.sender_id)
            .map_err(|e| RepositoryError::Query(format!("invalid sender_id: {e}")))?;
        let message_type: MessageType = self
            .message_type
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ChatMessage {
            id,
            thread_id,
            sender_id,
            content: self.content,
            message_type,
            file_ref: self.file_ref,
            created_at: parse_datetime(&self.created_at)?,
            read_by,
        })
    }
}

fn receipt_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<ReadReceipt, RepositoryError> {
    let reader_id: String = row
        .try_get("reader_id")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    let read_at: String = row
        .try_get("read_at")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;
    Ok(ReadReceipt {
        reader_id: Uuid::parse_str(&reader_id)
            .map_err(|e| RepositoryError::Query(format!("invalid reader_id: {e}")))?,
        read_at: parse_datetime(&read_at)?,
    })
}

fn map_unique_violation(e: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return RepositoryError::Conflict(
                "active thread already exists for consultation".to_string(),
            );
        }
    }
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// ChatRepository implementation
// ---------------------------------------------------------------------------

impl ChatRepository for SqliteChatRepository {
    async fn create_thread(&self, thread: &ChatThread) -> Result<ChatThread, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO chat_threads (id, consultation_id, farmer_id, agronomist_id, is_active, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(thread.id.to_string())
        .bind(thread.consultation_id.to_string())
        .bind(thread.farmer_id.to_string())
        .bind(thread.agronomist_id.to_string())
        .bind(thread.is_active as i64)
        .bind(format_datetime(&thread.created_at))
        .bind(format_datetime(&thread.updated_at))
        .execute(&self.pool.writer)
        .await
        .map_err(map_unique_violation)?;

        Ok(thread.clone())
    }

    async fn find_active_thread(
        &self,
        consultation_id: &Uuid,
    ) -> Result<Option<ChatThread>, RepositoryError> {
        let row =
            sqlx::query("SELECT * FROM chat_threads WHERE consultation_id = ? AND is_active = 1")
                .bind(consultation_id.to_string())
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let thread_row = ChatThreadRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(thread_row.into_thread()?))
            }
            None => Ok(None),
        }
    }

    async fn get_thread(&self, thread_id: &Uuid) -> Result<Option<ChatThread>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chat_threads WHERE id = ?")
            .bind(thread_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let thread_row = ChatThreadRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(thread_row.into_thread()?))
            }
            None => Ok(None),
        }
    }

    async fn list_threads_for(
        &self,
        identity_id: &Uuid,
    ) -> Result<Vec<ChatThread>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM chat_threads
               WHERE is_active = 1 AND (farmer_id = ? OR agronomist_id = ?)
               ORDER BY updated_at DESC"#,
        )
        .bind(identity_id.to_string())
        .bind(identity_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut threads = Vec::with_capacity(rows.len());
        for row in &rows {
            let thread_row =
                ChatThreadRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            threads.push(thread_row.into_thread()?);
        }
        Ok(threads)
    }

    async fn append_message(&self, message: &ChatMessage) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO chat_messages (id, thread_id, sender_id, content, message_type, file_ref, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.thread_id.to_string())
        .bind(message.sender_id.to_string())
        .bind(&message.content)
        .bind(message.message_type.to_string())
        .bind(&message.file_ref)
        .bind(format_datetime(&message.created_at))
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        for receipt in &message.read_by {
            sqlx::query(
                "INSERT OR IGNORE INTO message_reads (message_id, reader_id, read_at) VALUES (?, ?, ?)",
            )
            .bind(message.id.to_string())
            .bind(receipt.reader_id.to_string())
            .bind(format_datetime(&receipt.read_at))
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        }

        sqlx::query("UPDATE chat_threads SET updated_at = ? WHERE id = ?")
            .bind(format_datetime(&message.created_at))
            .bind(message.thread_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }

    async fn get_messages(&self, thread_id: &Uuid) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_messages WHERE thread_id = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(thread_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut receipts = self.receipts_for_thread(thread_id).await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let message_row =
                ChatMessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            let read_by = receipts.remove(&message_row.id).unwrap_or_default();
            messages.push(message_row.into_message(read_by)?);
        }
        Ok(messages)
    }

    async fn get_last_message(
        &self,
        thread_id: &Uuid,
    ) -> Result<Option<ChatMessage>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM chat_messages WHERE thread_id = ? ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .bind(thread_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let message_row =
            ChatMessageRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;

        let receipt_rows = sqlx::query(
            "SELECT reader_id, read_at FROM message_reads WHERE message_id = ? ORDER BY read_at ASC",
        )
        .bind(message_row.id.clone())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut read_by = Vec::with_capacity(receipt_rows.len());
        for row in &receipt_rows {
            read_by.push(receipt_from_row(row)?);
        }

        Ok(Some(message_row.into_message(read_by)?))
    }

    async fn mark_read(
        &self,
        thread_id: &Uuid,
        reader_id: &Uuid,
        read_at: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"INSERT OR IGNORE INTO message_reads (message_id, reader_id, read_at)
               SELECT id, ?, ? FROM chat_messages WHERE thread_id = ?"#,
        )
        .bind(reader_id.to_string())
        .bind(format_datetime(&read_at))
        .bind(thread_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::consultation::tests::{make_consultation, seed_parties};
    use crate::sqlite::consultation::SqliteConsultationRepository;
    use crate::sqlite::identity::SqliteIdentityRepository;
    use crate::sqlite::pool::tests::test_pool;
    use agrilink_core::chat::binder::ThreadBinder;
    use agrilink_core::consultation::repository::ConsultationRepository;

    async fn seed_thread(pool: &DatabasePool) -> (ChatThread, Uuid, Uuid) {
        let (farmer, agronomist) = seed_parties(pool).await;
        let consultations = SqliteConsultationRepository::new(pool.clone());
        let consultation = make_consultation(farmer, agronomist);
        consultations.create(&consultation).await.unwrap();

        let now = Utc::now();
        let thread = ChatThread {
            id: Uuid::now_v7(),
            consultation_id: consultation.id,
            farmer_id: farmer,
            agronomist_id: agronomist,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let repo = SqliteChatRepository::new(pool.clone());
        repo.create_thread(&thread).await.unwrap();
        (thread, farmer, agronomist)
    }

    fn make_message(thread_id: Uuid, sender_id: Uuid, content: &str) -> ChatMessage {
        let now = Utc::now();
        ChatMessage {
            id: Uuid::now_v7(),
            thread_id,
            sender_id,
            content: content.to_string(),
            message_type: MessageType::Text,
            file_ref: None,
            created_at: now,
            read_by: vec![ReadReceipt {
                reader_id: sender_id,
                read_at: now,
            }],
        }
    }

    #[tokio::test]
    async fn test_second_active_thread_is_conflict() {
        let pool = test_pool().await;
        let repo = SqliteChatRepository::new(pool.clone());
        let (thread, farmer, agronomist) = seed_thread(&pool).await;

        let duplicate = ChatThread {
            id: Uuid::now_v7(),
            farmer_id: farmer,
            agronomist_id: agronomist,
            ..thread.clone()
        };
        let err = repo.create_thread(&duplicate).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let found = repo
            .find_active_thread(&thread.consultation_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, thread.id);
    }

    #[tokio::test]
    async fn test_append_and_fetch_in_order_with_receipts() {
        let pool = test_pool().await;
        let repo = SqliteChatRepository::new(pool.clone());
        let (thread, farmer, agronomist) = seed_thread(&pool).await;

        repo.append_message(&make_message(thread.id, farmer, "hello"))
            .await
            .unwrap();
        repo.append_message(&make_message(thread.id, agronomist, "hi, what's wrong?"))
            .await
            .unwrap();

        let messages = repo.get_messages(&thread.id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[0].sender_id, farmer);
        assert!(messages[0].is_read_by(&farmer));
        assert!(!messages[0].is_read_by(&agronomist));
        assert_eq!(messages[1].content, "hi, what's wrong?");

        // Appends bump the thread's activity timestamp.
        let stored = repo.get_thread(&thread.id).await.unwrap().unwrap();
        assert!(stored.updated_at >= thread.updated_at);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent() {
        let pool = test_pool().await;
        let repo = SqliteChatRepository::new(pool.clone());
        let (thread, farmer, agronomist) = seed_thread(&pool).await;

        repo.append_message(&make_message(thread.id, farmer, "one"))
            .await
            .unwrap();
        repo.append_message(&make_message(thread.id, farmer, "two"))
            .await
            .unwrap();

        let added = repo
            .mark_read(&thread.id, &agronomist, Utc::now())
            .await
            .unwrap();
        assert_eq!(added, 2);
        let added_again = repo
            .mark_read(&thread.id, &agronomist, Utc::now())
            .await
            .unwrap();
        assert_eq!(added_again, 0);

        let messages = repo.get_messages(&thread.id).await.unwrap();
        for message in &messages {
            assert_eq!(message.read_by.len(), 2);
            assert!(message.is_read_by(&farmer));
            assert!(message.is_read_by(&agronomist));
        }
    }

    #[tokio::test]
    async fn test_last_message_and_listing_order() {
        let pool = test_pool().await;
        let repo = SqliteChatRepository::new(pool.clone());

        let (first, farmer, _) = seed_thread(&pool).await;
        assert!(repo.get_last_message(&first.id).await.unwrap().is_none());

        repo.append_message(&make_message(first.id, farmer, "older"))
            .await
            .unwrap();
        repo.append_message(&make_message(first.id, farmer, "newest"))
            .await
            .unwrap();

        let last = repo.get_last_message(&first.id).await.unwrap().unwrap();
        assert_eq!(last.content, "newest");

        let listed = repo.list_threads_for(&farmer).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, first.id);
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_yields_one_thread() {
        let pool = test_pool().await;
        let (farmer, agronomist) = seed_parties(&pool).await;
        let consultations = SqliteConsultationRepository::new(pool.clone());
        let consultation = make_consultation(farmer, agronomist);
        consultations.create(&consultation).await.unwrap();
        let consultation_id = consultation.id;

        let spawn_binder = |caller: Uuid| {
            let pool = pool.clone();
            tokio::spawn(async move {
                let binder = ThreadBinder::new(
                    SqliteConsultationRepository::new(pool.clone()),
                    SqliteChatRepository::new(pool.clone()),
                    SqliteIdentityRepository::new(pool),
                );
                binder
                    .get_or_create_thread(&consultation_id, &caller)
                    .await
                    .unwrap()
            })
        };

        let (first, second) =
            tokio::join!(spawn_binder(farmer), spawn_binder(agronomist));
        let first = first.unwrap();
        let second = second.unwrap();

        assert_eq!(first.thread.id, second.thread.id);

        let repo = SqliteChatRepository::new(pool.clone());
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM chat_threads WHERE consultation_id = ?")
                .bind(consultation_id.to_string())
                .fetch_one(&repo.pool.reader)
                .await
                .unwrap();
        assert_eq!(count.0, 1);
    }
}
