use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier determining the monthly message quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Basic,
    Pro,
}

impl Tier {
    /// Monthly message quota for this tier.
    pub fn message_quota(&self) -> i64 {
        match self {
            Self::Free => 100,
            Self::Basic => 500,
            Self::Pro => 1000,
        }
    }

    /// Database string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Pro => "pro",
        }
    }

    /// Parse the database string form. Unknown values map to `Free`.
    pub fn parse(s: &str) -> Self {
        match s {
            "basic" => Self::Basic,
            "pro" => Self::Pro,
            _ => Self::Free,
        }
    }
}

/// A persisted user keyed by their chat-platform identity.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    /// Stable external chat identity (unique).
    pub external_id: String,
    pub display_name: Option<String>,
    pub tier: Tier,
    /// Messages consumed in the current quota window. Only increases between resets.
    pub message_count: i64,
    pub message_quota: i64,
    pub quota_reset_date: DateTime<Utc>,
    /// Tri-state activation: `None` (never set) is treated as active.
    /// Only an explicit `false` blocks the account.
    pub is_active: Option<bool>,
    /// Encrypted completion-provider credential, if the user set one.
    pub completion_credential: Option<String>,
    /// Encrypted execution-service credential, if the user set one.
    pub execution_credential: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the account is deactivated. Only an explicit `false` blocks;
    /// a never-set flag means active.
    pub fn is_deactivated(&self) -> bool {
        self.is_active == Some(false)
    }
}
