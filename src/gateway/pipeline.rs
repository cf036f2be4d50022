//! Message processing pipeline — gate, then the conversation round trip.
//!
//! A proceeding message flows: validate → deny-list screen → resolve
//! conversation and credentials → completion call → execute any requested
//! operations → at most one follow-up completion round → persist → reply.

use super::Gateway;
use herald_core::{
    context::{Context, ContextEntry},
    error::HeraldError,
    guard,
    message::{IncomingMessage, Role},
    ops::CompletionStatus,
    user::User,
};
use herald_store::UsageEntry;
use tracing::{error, info, warn};

/// Hard ceiling on inbound message length.
const MAX_MESSAGE_CHARS: usize = 8000;

/// Reply sent when an unrecoverable failure happens downstream. Raw error
/// detail stays in the logs, never in the chat.
const GENERIC_ERROR_REPLY: &str = "Something went wrong on my side. Please try again.";

/// Instructions for the operation protocol the provider must follow.
const SYSTEM_PROMPT: &str = "You are Herald, a relay assistant with access to a remote sandbox. \
Answer in plain prose when no side effects are needed. When the request requires running \
commands, reading or writing files, or driving a browser, reply ONLY with a JSON envelope: \
{\"status\": \"in_progress\", \"operations\": [...]} where each operation is one of \
{\"type\": \"terminal_command\", \"command\": ...}, \
{\"type\": \"write_file\", \"path\": ..., \"content\": ...}, \
{\"type\": \"read_file\", \"path\": ...}, or \
{\"type\": \"browser_action\", \"action\": ..., \"url\": ..., \"selector\": ..., \"text\": ...}. \
After the operations run you will receive their results and must answer with a plain-prose \
summary of what happened.";

impl Gateway {
    /// Process a single incoming message through the full pipeline.
    pub(crate) async fn handle_message(&self, incoming: IncomingMessage) {
        let preview = if incoming.text.chars().count() > 60 {
            let truncated: String = incoming.text.chars().take(60).collect();
            format!("{truncated}...")
        } else {
            incoming.text.clone()
        };
        info!(
            "[{}] {} says: {}",
            incoming.channel,
            incoming.sender_name.as_deref().unwrap_or("unknown"),
            preview
        );

        let outcome = self
            .gate
            .authenticate(&incoming.sender_id, incoming.sender_name.as_deref())
            .await;

        match outcome {
            super::GateOutcome::Blocked { notice } => {
                self.send_text(&incoming, &notice).await;
            }
            super::GateOutcome::Proceed { user, remaining } => {
                info!(
                    "[{}] user {} authenticated, {} messages remaining",
                    incoming.channel, user.id, remaining
                );

                if let (Some(channel), Some(target)) =
                    (self.channels.get(&incoming.channel), &incoming.reply_target)
                {
                    let _ = channel.send_typing(target).await;
                }

                let reply = self.orchestrate(&incoming, &user).await;
                self.send_text(&incoming, &reply).await;
            }
        }
    }

    /// Run the conversation round trip, mapping every failure to a reply.
    async fn orchestrate(&self, incoming: &IncomingMessage, user: &User) -> String {
        if incoming.text.trim().is_empty() {
            return "I got an empty message — send some text and I'll get to work.".into();
        }
        if incoming.text.chars().count() > MAX_MESSAGE_CHARS {
            return format!(
                "That message is too long (over {MAX_MESSAGE_CHARS} characters). \
                 Please split it into smaller parts."
            );
        }

        if let Some(reason) = guard::screen(&incoming.text) {
            warn!("input guard blocked message from {}: {reason}", user.id);
            let _ = self
                .usage
                .log(&UsageEntry {
                    user_id: Some(user.id.clone()),
                    operation_type: "input_guard".into(),
                    tokens_used: None,
                    success: false,
                    error_message: Some(reason.to_string()),
                })
                .await;
            return format!("I can't help with that — the request looks destructive ({reason}).");
        }

        match self.run_conversation(incoming, user).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("conversation failed for user {}: {e}", user.id);
                let operation_type = match e {
                    HeraldError::Executor(_) => "execution",
                    _ => "completion",
                };
                let _ = self
                    .usage
                    .log(&UsageEntry {
                        user_id: Some(user.id.clone()),
                        operation_type: operation_type.into(),
                        tokens_used: None,
                        success: false,
                        error_message: Some(e.to_string()),
                    })
                    .await;
                GENERIC_ERROR_REPLY.into()
            }
        }
    }

    async fn run_conversation(
        &self,
        incoming: &IncomingMessage,
        user: &User,
    ) -> Result<String, HeraldError> {
        let thread_id = format!(
            "{}:{}",
            incoming.channel,
            incoming
                .reply_target
                .as_deref()
                .unwrap_or(&incoming.sender_id)
        );
        let conversation_id = self
            .store
            .find_or_create_conversation(&user.id, &thread_id)
            .await?;

        let credentials = self.credentials.resolve(user).await;

        let history = match self
            .store
            .recent_messages(&conversation_id, self.history_limit as i64)
            .await
        {
            Ok(messages) => messages
                .into_iter()
                .map(|(role, content)| ContextEntry {
                    role: role.as_str().to_string(),
                    content,
                })
                .collect(),
            Err(e) => {
                // History is an enhancement; the turn proceeds without it.
                error!("failed to load history for {conversation_id}: {e}");
                Vec::new()
            }
        };

        // The user's turn is persisted regardless of what happens downstream.
        if let Err(e) = self
            .store
            .append_message(&conversation_id, Role::User, &incoming.text, None)
            .await
        {
            error!("failed to persist user message: {e}");
        }

        let context = Context {
            system_prompt: SYSTEM_PROMPT.to_string(),
            history,
            current_message: incoming.text.clone(),
        };

        let first = self
            .provider
            .converse(&context, &credentials.completion)
            .await?;
        let mut tokens_total = first.tokens_used.unwrap_or(0);

        let final_text = if first.operations.is_empty() {
            first.text
        } else {
            info!(
                "[{}] provider requested {} operations",
                incoming.channel,
                first.operations.len()
            );

            let outcomes = self
                .executor
                .run(&first.operations, &credentials.execution)
                .await?;

            let failed = outcomes.iter().filter(|o| !o.success).count();
            let _ = self
                .usage
                .log(&UsageEntry {
                    user_id: Some(user.id.clone()),
                    operation_type: "execution".into(),
                    tokens_used: None,
                    success: failed == 0,
                    error_message: (failed > 0)
                        .then(|| format!("{failed}/{} operations failed", outcomes.len())),
                })
                .await;

            if first.status == CompletionStatus::InProgress {
                // One follow-up round only: hand the results back and ask for
                // the final summary. Partial failures ride along for the
                // provider to explain.
                let results_json = serde_json::to_string_pretty(&outcomes)?;
                let mut followup_history = context.history.clone();
                followup_history.push(ContextEntry::user(incoming.text.clone()));
                followup_history.push(ContextEntry::assistant(first.text.clone()));

                let followup = Context {
                    system_prompt: context.system_prompt.clone(),
                    history: followup_history,
                    current_message: format!("[Operation results]\n{results_json}"),
                };

                let second = self
                    .provider
                    .converse(&followup, &credentials.completion)
                    .await?;
                tokens_total += second.tokens_used.unwrap_or(0);
                second.text
            } else {
                first.text
            }
        };

        let final_text = if final_text.trim().is_empty() {
            "I don't have an answer for that one.".to_string()
        } else {
            final_text
        };

        // Persistence failures don't block the reply; the user still gets
        // their answer.
        if let Err(e) = self
            .store
            .append_message(
                &conversation_id,
                Role::Assistant,
                &final_text,
                Some(tokens_total as i64),
            )
            .await
        {
            error!("failed to persist assistant reply: {e}");
        }

        let _ = self
            .usage
            .log(&UsageEntry {
                user_id: Some(user.id.clone()),
                operation_type: "completion".into(),
                tokens_used: Some(tokens_total as i64),
                success: true,
                error_message: None,
            })
            .await;

        Ok(final_text)
    }
}
