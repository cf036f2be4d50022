//! # herald-exec
//!
//! Remote sandbox execution client for Herald.
//!
//! Every [`OperationExecutor::run`] call provisions an isolated execution
//! context on the remote service, runs the batch inside it, and tears the
//! context down on every exit path. Teardown failures are logged, never
//! surfaced. A failing operation does not abort the rest of the batch; its
//! failure is recorded in the outcome and execution continues.

use async_trait::async_trait;
use herald_core::{
    config::ExecutorConfig,
    error::HeraldError,
    ops::{Operation, OperationOutcome},
    traits::OperationExecutor,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client for a remote sandbox execution service.
pub struct RemoteExecutor {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SessionHandle {
    session_id: String,
}

impl RemoteExecutor {
    /// Create from config values.
    pub fn from_config(config: &ExecutorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Provision an isolated execution context for one batch.
    async fn provision(&self, credential: &str) -> Result<String, HeraldError> {
        let url = format!("{}/sessions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| HeraldError::Executor(format!("session provisioning failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(HeraldError::Executor(format!(
                "session provisioning returned {status}: {text}"
            )));
        }

        let handle: SessionHandle = resp
            .json()
            .await
            .map_err(|e| HeraldError::Executor(format!("invalid session response: {e}")))?;

        debug!("provisioned execution session {}", handle.session_id);
        Ok(handle.session_id)
    }

    /// Run a single operation inside a session.
    async fn execute_one(
        &self,
        session_id: &str,
        operation: &Operation,
        credential: &str,
    ) -> Result<OperationOutcome, HeraldError> {
        let url = format!("{}/sessions/{session_id}/operations", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(credential)
            .json(operation)
            .send()
            .await
            .map_err(|e| HeraldError::Executor(format!("operation request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(HeraldError::Executor(format!(
                "operation returned {status}: {text}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| HeraldError::Executor(format!("invalid operation response: {e}")))
    }

    /// Tear down a session. Failures here are the caller's to log, not to surface.
    async fn teardown(&self, session_id: &str, credential: &str) -> Result<(), HeraldError> {
        let url = format!("{}/sessions/{session_id}", self.base_url);
        let resp = self
            .client
            .delete(&url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| HeraldError::Executor(format!("session teardown failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(HeraldError::Executor(format!(
                "session teardown returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    /// Run every operation in the batch, converting per-operation errors into
    /// failed outcomes so the rest of the batch still executes.
    async fn run_batch(
        &self,
        session_id: &str,
        operations: &[Operation],
        credential: &str,
    ) -> Vec<OperationOutcome> {
        let mut outcomes = Vec::with_capacity(operations.len());
        for operation in operations {
            match self.execute_one(session_id, operation, credential).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!("operation {} failed: {e}", operation.kind());
                    outcomes.push(failure_outcome(operation, &e.to_string()));
                }
            }
        }
        outcomes
    }
}

/// Build a failed outcome for an operation that never produced a result.
fn failure_outcome(operation: &Operation, error: &str) -> OperationOutcome {
    OperationOutcome {
        operation_type: operation.kind().to_string(),
        success: false,
        output: None,
        content: None,
        error: Some(error.to_string()),
    }
}

#[async_trait]
impl OperationExecutor for RemoteExecutor {
    fn name(&self) -> &str {
        "remote-sandbox"
    }

    async fn run(
        &self,
        operations: &[Operation],
        credential: &str,
    ) -> Result<Vec<OperationOutcome>, HeraldError> {
        if credential.is_empty() {
            return Err(HeraldError::Executor(
                "no execution credential available".into(),
            ));
        }

        let session_id = self.provision(credential).await?;

        // The batch result is held until teardown has run; teardown happens
        // whether the batch succeeded or not.
        let outcomes = self.run_batch(&session_id, operations, credential).await;

        if let Err(e) = self.teardown(&session_id, credential).await {
            warn!("execution session {session_id} teardown failed: {e}");
        }

        Ok(outcomes)
    }
}
