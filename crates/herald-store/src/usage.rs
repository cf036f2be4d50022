//! Usage log — an append-only audit trail of significant operations.

use herald_core::error::HeraldError;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// An entry to write to the usage log.
pub struct UsageEntry {
    /// Resolved user, or `None` when the failure happened before resolution.
    pub user_id: Option<String>,
    /// Free-form tag ("auth", "completion", "execution", "credential_update", ...).
    pub operation_type: String,
    pub tokens_used: Option<i64>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Usage logger backed by SQLite, sharing the store's pool.
#[derive(Clone)]
pub struct UsageLogger {
    pool: SqlitePool,
}

impl UsageLogger {
    /// Create a new usage logger sharing the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write an entry to the usage log.
    pub async fn log(&self, entry: &UsageEntry) -> Result<(), HeraldError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO usage_log (id, user_id, operation_type, tokens_used, success, error_message) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&entry.user_id)
        .bind(&entry.operation_type)
        .bind(entry.tokens_used)
        .bind(entry.success as i64)
        .bind(&entry.error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Storage(format!("usage log write failed: {e}")))?;

        debug!(
            "usage: {} user={} ok={}",
            entry.operation_type,
            entry.user_id.as_deref().unwrap_or("-"),
            entry.success
        );

        Ok(())
    }
}
