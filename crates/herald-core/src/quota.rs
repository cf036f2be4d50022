//! Quota evaluation — pure computation over a user snapshot.

use crate::user::User;

/// Snapshot of a user's quota standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    /// True iff at least one message remains in the window.
    pub allowed: bool,
    pub used: i64,
    pub total: i64,
    pub remaining: i64,
}

/// Evaluate the quota for a user snapshot. Never mutates state.
///
/// Activation is a separate, earlier-checked condition — a deactivated user
/// is an authorization failure, not a quota failure.
pub fn evaluate(user: &User) -> QuotaStatus {
    let used = user.message_count;
    let total = user.message_quota;
    let remaining = (total - used).max(0);
    QuotaStatus {
        allowed: total - used > 0,
        used,
        total,
        remaining,
    }
}
