//! Gateway — the main event loop connecting channels, storage, the
//! completion provider, and the remote executor.
//!
//! Includes: the authentication/quota gate, credential resolution, the
//! conversation pipeline, and graceful shutdown.

mod auth;
mod credentials;
mod pipeline;


pub use auth::{AuthenticationGate, GateOutcome};
pub use credentials::{CredentialResolver, ResolvedCredentials};

use herald_core::{
    config::{ApiConfig, GateConfig},
    message::{IncomingMessage, MessageMetadata, OutgoingMessage},
    traits::{Channel, CompletionProvider, OperationExecutor},
};
use herald_store::{Store, UsageLogger};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// The central gateway that routes messages between channels and the
/// completion/execution services.
pub struct Gateway {
    pub(crate) provider: Arc<dyn CompletionProvider>,
    pub(crate) executor: Arc<dyn OperationExecutor>,
    pub(crate) channels: HashMap<String, Arc<dyn Channel>>,
    pub(crate) store: Store,
    pub(crate) usage: UsageLogger,
    pub(crate) credentials: Arc<CredentialResolver>,
    pub(crate) gate: AuthenticationGate,
    pub(crate) api_config: ApiConfig,
    /// How many recent messages to replay as conversation history.
    pub(crate) history_limit: usize,
    pub(crate) uptime: Instant,
}

impl Gateway {
    /// Create a new gateway.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        executor: Arc<dyn OperationExecutor>,
        channels: HashMap<String, Arc<dyn Channel>>,
        store: Store,
        credentials: Arc<CredentialResolver>,
        gate_config: GateConfig,
        api_config: ApiConfig,
        history_limit: usize,
    ) -> Self {
        let usage = UsageLogger::new(store.pool().clone());
        let gate = AuthenticationGate::new(store.clone(), usage.clone(), gate_config);
        Self {
            provider,
            executor,
            channels,
            store,
            usage,
            credentials,
            gate,
            api_config,
            history_limit,
            uptime: Instant::now(),
        }
    }

    /// Run the main event loop.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        info!(
            "Herald gateway running | provider: {} | executor: {} | channels: {}",
            self.provider.name(),
            self.executor.name(),
            self.channels.keys().cloned().collect::<Vec<_>>().join(", "),
        );

        let (tx, mut rx) = mpsc::channel::<IncomingMessage>(256);

        for (name, channel) in &self.channels {
            let mut channel_rx = channel
                .start()
                .await
                .map_err(|e| anyhow::anyhow!("failed to start channel {name}: {e}"))?;
            let tx = tx.clone();
            let channel_name = name.clone();

            tokio::spawn(async move {
                while let Some(msg) = channel_rx.recv().await {
                    if tx.send(msg).await.is_err() {
                        info!("gateway receiver dropped, stopping {channel_name} forwarder");
                        break;
                    }
                }
            });

            info!("Channel started: {name}");
        }

        drop(tx);

        // Spawn admin HTTP API server.
        let api_handle = if self.api_config.enabled {
            let state = crate::api::ApiState::new(
                self.store.clone(),
                self.credentials.clone(),
                self.usage.clone(),
                self.api_config.api_key.clone(),
                self.uptime,
            );
            let cfg = self.api_config.clone();
            Some(tokio::spawn(async move {
                crate::api::serve(cfg, state).await;
            }))
        } else {
            None
        };

        // Main event loop with graceful shutdown. Each inbound message is an
        // independent unit of work.
        loop {
            tokio::select! {
                Some(incoming) = rx.recv() => {
                    let gw = self.clone();
                    tokio::spawn(async move {
                        gw.handle_message(incoming).await;
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        if let Some(h) = api_handle {
            h.abort();
        }

        // Stop all channels.
        for (name, channel) in &self.channels {
            if let Err(e) = channel.stop().await {
                warn!("failed to stop channel {name}: {e}");
            }
        }

        info!("Shutdown complete.");
        Ok(())
    }

    /// Send a plain text message back to the sender.
    pub(crate) async fn send_text(&self, incoming: &IncomingMessage, text: &str) {
        let msg = OutgoingMessage {
            text: text.to_string(),
            metadata: MessageMetadata::default(),
            reply_target: incoming.reply_target.clone(),
        };

        if let Some(channel) = self.channels.get(&incoming.channel) {
            if let Err(e) = channel.send(msg).await {
                error!("failed to send message: {e}");
            }
        } else {
            error!("no channel found for '{}'", incoming.channel);
        }
    }
}
