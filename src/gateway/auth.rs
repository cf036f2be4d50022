//! Authentication and quota gating for inbound messages.
//!
//! Per inbound message the gate walks a small state machine:
//! unresolved → {new user, active, inactive, quota exceeded} → proceed or
//! blocked. Exactly one of {account creation, deactivation notice, quota
//! notice, proceed} happens per message, and the quota counter is consumed
//! only on the proceed path, after every other gate has passed.

use herald_core::{
    config::GateConfig,
    error::HeraldError,
    quota,
    user::{Tier, User},
};
use herald_store::{Store, UsageEntry, UsageLogger};
use tracing::{error, info, warn};

/// Outcome of gating one inbound message.
pub enum GateOutcome {
    /// All gates passed; the message goes on to the orchestrator.
    Proceed {
        user: User,
        /// Messages left in the window after this one.
        remaining: i64,
    },
    /// The message is not processed further; `notice` goes back to the sender.
    Blocked { notice: String },
}

/// Resolves a chat identity to a user record and enforces the
/// activation/quota invariants before anything expensive runs.
pub struct AuthenticationGate {
    store: Store,
    usage: UsageLogger,
    config: GateConfig,
}

impl AuthenticationGate {
    pub fn new(store: Store, usage: UsageLogger, config: GateConfig) -> Self {
        Self {
            store,
            usage,
            config,
        }
    }

    /// Gate one inbound message.
    ///
    /// Store failures never escape: they are logged, audited where possible,
    /// and downgraded to a generic retry notice.
    pub async fn authenticate(
        &self,
        external_id: &str,
        display_name: Option<&str>,
    ) -> GateOutcome {
        match self.gate(external_id, display_name).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("gate failure for {external_id}: {e}");
                let _ = self
                    .usage
                    .log(&UsageEntry {
                        user_id: None,
                        operation_type: "auth".into(),
                        tokens_used: None,
                        success: false,
                        error_message: Some(e.to_string()),
                    })
                    .await;
                GateOutcome::Blocked {
                    notice: "Something went wrong while checking your account. Please try again."
                        .into(),
                }
            }
        }
    }

    async fn gate(
        &self,
        external_id: &str,
        display_name: Option<&str>,
    ) -> Result<GateOutcome, HeraldError> {
        let user = match self.store.find_user_by_external_id(external_id).await? {
            Some(user) => user,
            None => {
                // First contact: create the account and welcome the sender.
                // The triggering message itself is not processed further.
                let user = self
                    .store
                    .create_user(external_id, display_name, Tier::Free)
                    .await?;
                info!("new user {} created for {external_id}", user.id);
                let _ = self
                    .usage
                    .log(&UsageEntry {
                        user_id: Some(user.id),
                        operation_type: "signup".into(),
                        tokens_used: None,
                        success: true,
                        error_message: None,
                    })
                    .await;
                return Ok(GateOutcome::Blocked {
                    notice: self.config.welcome_message.clone(),
                });
            }
        };

        // Strictly `Some(false)` blocks; a never-set flag means active.
        if user.is_deactivated() {
            warn!("deactivated account {} tried to send", user.id);
            let _ = self
                .usage
                .log(&UsageEntry {
                    user_id: Some(user.id),
                    operation_type: "auth".into(),
                    tokens_used: None,
                    success: false,
                    error_message: Some("account deactivated".into()),
                })
                .await;
            return Ok(GateOutcome::Blocked {
                notice: self.config.deactivated_message.clone(),
            });
        }

        // Roll the quota window over when its reset date has passed.
        let user = if user.quota_reset_date <= chrono::Utc::now() {
            let next_reset = self.store.reset_quota_window(&user.id).await?;
            User {
                message_count: 0,
                quota_reset_date: next_reset,
                ..user
            }
        } else {
            user
        };

        let status = quota::evaluate(&user);
        if !status.allowed {
            let notice = format!(
                "You've used {}/{} messages for this period. Your quota resets on {}. \
                 Upgrade your tier for a higher limit.",
                status.used,
                status.total,
                user.quota_reset_date.format("%Y-%m-%d"),
            );
            let _ = self
                .usage
                .log(&UsageEntry {
                    user_id: Some(user.id),
                    operation_type: "auth".into(),
                    tokens_used: None,
                    success: false,
                    error_message: Some("quota exceeded".into()),
                })
                .await;
            return Ok(GateOutcome::Blocked { notice });
        }

        // All gates passed: consume one message from the quota. The increment
        // is atomic in the store, so concurrent messages never lose updates.
        self.store.touch_activity(&user.id, display_name).await?;
        self.store.increment_message_count(&user.id).await?;

        let _ = self
            .usage
            .log(&UsageEntry {
                user_id: Some(user.id.clone()),
                operation_type: "auth".into(),
                tokens_used: None,
                success: true,
                error_message: None,
            })
            .await;

        let mut user = user;
        user.message_count += 1;
        Ok(GateOutcome::Proceed {
            remaining: status.remaining - 1,
            user,
        })
    }
}
