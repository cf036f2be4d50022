use crate::{
    context::Context,
    error::HeraldError,
    message::{IncomingMessage, OutgoingMessage},
    ops::{Completion, Operation, OperationOutcome},
};
use async_trait::async_trait;

/// Completion provider trait — the brain.
///
/// Every AI backend implements this trait to provide a uniform interface.
/// The API credential is passed per call because each user may carry their
/// own key.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Send a conversation context to the provider and get a structured
    /// completion back. Transient failures are retried internally before
    /// an error surfaces.
    async fn converse(&self, context: &Context, credential: &str)
        -> Result<Completion, HeraldError>;
}

/// Remote execution trait — runs operation batches in an isolated context.
///
/// Implementations own provisioning and teardown of the context per call;
/// teardown happens on every exit path and its failures are logged, never
/// surfaced. A failing operation does not abort the rest of the batch.
#[async_trait]
pub trait OperationExecutor: Send + Sync {
    /// Human-readable executor name.
    fn name(&self) -> &str;

    /// Run a batch of operations, returning one outcome per operation.
    async fn run(
        &self,
        operations: &[Operation],
        credential: &str,
    ) -> Result<Vec<OperationOutcome>, HeraldError>;
}

/// Messaging Channel trait — the nervous system.
///
/// Every messaging platform implements this trait to receive and send
/// messages.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Start listening for incoming messages.
    /// Returns a receiver that yields incoming messages.
    async fn start(&self) -> Result<tokio::sync::mpsc::Receiver<IncomingMessage>, HeraldError>;

    /// Send a response back through this channel.
    async fn send(&self, message: OutgoingMessage) -> Result<(), HeraldError>;

    /// Send a typing indicator to show the bot is processing.
    async fn send_typing(&self, _target: &str) -> Result<(), HeraldError> {
        Ok(())
    }

    /// Graceful shutdown.
    async fn stop(&self) -> Result<(), HeraldError>;
}
