//! Google Gemini API provider.
//!
//! Calls the Gemini `generateContent` endpoint. Auth via URL query param,
//! with the credential supplied per call so each user's own key can be used.

use crate::envelope::parse_operation_envelope;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use herald_core::{
    config::GeminiConfig,
    context::Context,
    error::HeraldError,
    ops::{Completion, CompletionStatus},
    traits::CompletionProvider,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    model: String,
    retry: RetryPolicy,
}

impl GeminiProvider {
    /// Create from config values.
    pub fn from_config(config: &GeminiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            model: config.model.clone(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    total_token_count: u64,
}

/// Internal call failure classification driving the retry loop.
enum CallError {
    Transient(String),
    Fatal(String),
}

/// Whether an HTTP status is worth retrying.
fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS
}

fn build_request(context: &Context) -> GeminiRequest {
    let (system, api_messages) = context.to_api_messages();

    let system_instruction = if system.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart { text: system }],
        })
    };

    let contents: Vec<GeminiContent> = api_messages
        .iter()
        .map(|m| {
            let role = if m.role == "assistant" {
                "model"
            } else {
                "user"
            };
            GeminiContent {
                role: Some(role.to_string()),
                parts: vec![GeminiPart {
                    text: m.content.clone(),
                }],
            }
        })
        .collect();

    GeminiRequest {
        contents,
        system_instruction,
    }
}

impl GeminiProvider {
    async fn call(
        &self,
        body: &GeminiRequest,
        credential: &str,
    ) -> Result<GeminiResponse, CallError> {
        let url = format!(
            "{GEMINI_BASE_URL}/models/{}:generateContent?key={credential}",
            self.model
        );
        debug!("gemini: POST models/{}:generateContent", self.model);

        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CallError::Transient(format!("gemini request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let detail = format!("gemini returned {status}: {text}");
            return if is_transient_status(status) {
                Err(CallError::Transient(detail))
            } else {
                Err(CallError::Fatal(detail))
            };
        }

        resp.json()
            .await
            .map_err(|e| CallError::Fatal(format!("gemini: failed to parse response: {e}")))
    }
}

#[async_trait]
impl CompletionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn converse(
        &self,
        context: &Context,
        credential: &str,
    ) -> Result<Completion, HeraldError> {
        if credential.is_empty() {
            return Err(HeraldError::Provider("gemini: no API key available".into()));
        }

        let body = build_request(context);

        let mut attempt = 1u32;
        let parsed = loop {
            match self.call(&body, credential).await {
                Ok(resp) => break resp,
                Err(CallError::Fatal(detail)) => {
                    return Err(HeraldError::Provider(detail));
                }
                Err(CallError::Transient(detail)) => {
                    if !self.retry.should_retry(attempt) {
                        return Err(HeraldError::Provider(detail));
                    }
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "gemini attempt {attempt}/{} failed, retrying in {delay:?}: {detail}",
                        self.retry.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        };

        let text = parsed
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.clone())
            .unwrap_or_default();

        let tokens = parsed.usage_metadata.as_ref().map(|u| u.total_token_count);

        let (text, operations, status) = match parse_operation_envelope(&text) {
            Some(envelope) => (text, envelope.operations, envelope.status),
            None => (text, Vec::new(), CompletionStatus::Complete),
        };

        Ok(Completion {
            text,
            operations,
            status,
            tokens_used: tokens,
            model: Some(self.model.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::context::ContextEntry;

    fn provider() -> GeminiProvider {
        GeminiProvider::from_config(&GeminiConfig::default())
    }

    #[test]
    fn test_gemini_provider_name() {
        assert_eq!(provider().name(), "gemini");
    }

    #[test]
    fn test_gemini_request_serialization() {
        let ctx = Context {
            system_prompt: "Be helpful.".into(),
            history: Vec::new(),
            current_message: "Hello".into(),
        };
        let body = build_request(&ctx);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("systemInstruction").is_some());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Hello");
    }

    #[test]
    fn test_gemini_request_no_system() {
        let body = build_request(&Context::new("Hello"));
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_gemini_role_mapping() {
        let ctx = Context {
            system_prompt: String::new(),
            history: vec![ContextEntry::user("Hi"), ContextEntry::assistant("Hello!")],
            current_message: "How are you?".into(),
        };
        let body = build_request(&ctx);
        assert_eq!(body.contents[0].role, Some("user".into()));
        assert_eq!(body.contents[1].role, Some("model".into()));
        assert_eq!(body.contents[2].role, Some("user".into()));
    }

    #[test]
    fn test_gemini_response_parsing() {
        let json = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hi there!"}]}}],"usageMetadata":{"totalTokenCount":25}}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        let text = resp
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.clone());
        assert_eq!(text, Some("Hi there!".into()));
        assert_eq!(
            resp.usage_metadata.as_ref().map(|u| u.total_token_count),
            Some(25)
        );
    }

    #[test]
    fn test_transient_status_classification() {
        assert!(is_transient_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient_status(reqwest::StatusCode::BAD_GATEWAY));
        assert!(is_transient_status(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert!(!is_transient_status(reqwest::StatusCode::BAD_REQUEST));
        assert!(!is_transient_status(reqwest::StatusCode::UNAUTHORIZED));
    }
}
