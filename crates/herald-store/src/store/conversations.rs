//! Conversation and message persistence.
//!
//! Conversations are append-only: created lazily the first time a transport
//! thread is seen, then only touched for timestamps. Messages are soft-deleted
//! by external retention jobs, never by the core.

use super::Store;
use chrono::Utc;
use herald_core::{error::HeraldError, message::Role};
use uuid::Uuid;

impl Store {
    /// Get or create the conversation for a user + transport thread.
    pub async fn find_or_create_conversation(
        &self,
        user_id: &str,
        thread_id: &str,
    ) -> Result<String, HeraldError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT id FROM conversations WHERE thread_id = ?")
                .bind(thread_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| HeraldError::Storage(format!("query failed: {e}")))?;

        if let Some((id,)) = row {
            sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
                .bind(Utc::now().to_rfc3339())
                .bind(&id)
                .execute(&self.pool)
                .await
                .map_err(|e| HeraldError::Storage(format!("update failed: {e}")))?;
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO conversations (id, user_id, thread_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(user_id)
        .bind(thread_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Storage(format!("insert failed: {e}")))?;

        Ok(id)
    }

    /// Append one message to a conversation. Returns the message id.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: &str,
        tokens_used: Option<i64>,
    ) -> Result<String, HeraldError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, role, content, tokens_used, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(conversation_id)
        .bind(role.as_str())
        .bind(content)
        .bind(tokens_used)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Storage(format!("insert failed: {e}")))?;

        Ok(id)
    }

    /// The most recent messages of a conversation, oldest first.
    ///
    /// Soft-deleted rows are excluded.
    pub async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: i64,
    ) -> Result<Vec<(Role, String)>, HeraldError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT role, content FROM messages \
             WHERE conversation_id = ? AND deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(conversation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| HeraldError::Storage(format!("query failed: {e}")))?;

        let mut messages: Vec<(Role, String)> = rows
            .into_iter()
            .map(|(role, content)| (Role::parse(&role), content))
            .collect();
        messages.reverse();
        Ok(messages)
    }
}
