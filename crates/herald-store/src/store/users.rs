//! User lifecycle and the enumerated mutation commands.
//!
//! Every mutation is an explicit, named operation — there is no generic
//! field-spread update, so no unvalidated field can be overwritten.

use super::Store;
use chrono::{DateTime, Duration, Utc};
use herald_core::{
    error::HeraldError,
    user::{Tier, User},
};
use uuid::Uuid;

/// How long a quota window lasts before `message_count` resets.
const QUOTA_WINDOW_DAYS: i64 = 30;

type UserRow = (
    String,         // id
    String,         // external_id
    Option<String>, // display_name
    String,         // tier
    i64,            // message_count
    i64,            // message_quota
    String,         // quota_reset_date
    Option<i64>,    // is_active
    Option<String>, // completion_credential
    Option<String>, // execution_credential
    String,         // created_at
    String,         // updated_at
);

fn row_into_user(row: UserRow) -> Result<User, HeraldError> {
    let (
        id,
        external_id,
        display_name,
        tier,
        message_count,
        message_quota,
        quota_reset_date,
        is_active,
        completion_credential,
        execution_credential,
        created_at,
        updated_at,
    ) = row;

    Ok(User {
        id,
        external_id,
        display_name,
        tier: Tier::parse(&tier),
        message_count,
        message_quota,
        quota_reset_date: parse_ts(&quota_reset_date)?,
        is_active: is_active.map(|v| v != 0),
        completion_credential,
        execution_credential,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, HeraldError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| HeraldError::Storage(format!("invalid timestamp '{raw}': {e}")))
}

const USER_COLUMNS: &str = "id, external_id, display_name, tier, message_count, message_quota, \
     quota_reset_date, is_active, completion_credential, execution_credential, \
     created_at, updated_at";

impl Store {
    /// Look up a user by their stable chat-platform identity.
    pub async fn find_user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, HeraldError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE external_id = ?"))
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| HeraldError::Storage(format!("query failed: {e}")))?;

        row.map(row_into_user).transpose()
    }

    /// Fetch a user by internal id.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, HeraldError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| HeraldError::Storage(format!("query failed: {e}")))?;

        row.map(row_into_user).transpose()
    }

    /// Create a new active user on the given tier with a fresh quota window.
    pub async fn create_user(
        &self,
        external_id: &str,
        display_name: Option<&str>,
        tier: Tier,
    ) -> Result<User, HeraldError> {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            external_id: external_id.to_string(),
            display_name: display_name.map(str::to_string),
            tier,
            message_count: 0,
            message_quota: tier.message_quota(),
            quota_reset_date: now + Duration::days(QUOTA_WINDOW_DAYS),
            is_active: Some(true),
            completion_credential: None,
            execution_credential: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO users (id, external_id, display_name, tier, message_count, \
             message_quota, quota_reset_date, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, 0, ?, ?, 1, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.external_id)
        .bind(&user.display_name)
        .bind(user.tier.as_str())
        .bind(user.message_quota)
        .bind(user.quota_reset_date.to_rfc3339())
        .bind(user.created_at.to_rfc3339())
        .bind(user.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Storage(format!("insert failed: {e}")))?;

        Ok(user)
    }

    /// Atomically consume one message from the user's quota.
    ///
    /// The increment happens in SQL so concurrent messages for the same user
    /// never lose updates.
    pub async fn increment_message_count(&self, user_id: &str) -> Result<(), HeraldError> {
        sqlx::query(
            "UPDATE users SET message_count = message_count + 1, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Storage(format!("update failed: {e}")))?;

        Ok(())
    }

    /// Touch the activity timestamp, refreshing the display name when given.
    pub async fn touch_activity(
        &self,
        user_id: &str,
        display_name: Option<&str>,
    ) -> Result<(), HeraldError> {
        sqlx::query(
            "UPDATE users SET updated_at = ?, display_name = COALESCE(?, display_name) \
             WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(display_name)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Storage(format!("update failed: {e}")))?;

        Ok(())
    }

    /// Change a user's tier. The quota ceiling follows the new tier.
    pub async fn set_tier(&self, user_id: &str, tier: Tier) -> Result<(), HeraldError> {
        sqlx::query("UPDATE users SET tier = ?, message_quota = ?, updated_at = ? WHERE id = ?")
            .bind(tier.as_str())
            .bind(tier.message_quota())
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| HeraldError::Storage(format!("update failed: {e}")))?;

        Ok(())
    }

    /// Activate or deactivate an account.
    pub async fn set_active(&self, user_id: &str, active: bool) -> Result<(), HeraldError> {
        sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active as i64)
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| HeraldError::Storage(format!("update failed: {e}")))?;

        Ok(())
    }

    /// Store an encrypted completion-provider credential blob.
    pub async fn set_completion_credential(
        &self,
        user_id: &str,
        blob: &str,
    ) -> Result<(), HeraldError> {
        sqlx::query("UPDATE users SET completion_credential = ?, updated_at = ? WHERE id = ?")
            .bind(blob)
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| HeraldError::Storage(format!("update failed: {e}")))?;

        Ok(())
    }

    /// Store an encrypted execution-service credential blob.
    pub async fn set_execution_credential(
        &self,
        user_id: &str,
        blob: &str,
    ) -> Result<(), HeraldError> {
        sqlx::query("UPDATE users SET execution_credential = ?, updated_at = ? WHERE id = ?")
            .bind(blob)
            .bind(Utc::now().to_rfc3339())
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| HeraldError::Storage(format!("update failed: {e}")))?;

        Ok(())
    }

    /// Revoke both stored credential blobs.
    pub async fn clear_credentials(&self, user_id: &str) -> Result<(), HeraldError> {
        sqlx::query(
            "UPDATE users SET completion_credential = NULL, execution_credential = NULL, \
             updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Storage(format!("update failed: {e}")))?;

        Ok(())
    }

    /// Start a fresh quota window: zero the counter and advance the reset date.
    pub async fn reset_quota_window(&self, user_id: &str) -> Result<DateTime<Utc>, HeraldError> {
        let next_reset = Utc::now() + Duration::days(QUOTA_WINDOW_DAYS);
        sqlx::query(
            "UPDATE users SET message_count = 0, quota_reset_date = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(next_reset.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| HeraldError::Storage(format!("update failed: {e}")))?;

        Ok(next_reset)
    }
}
