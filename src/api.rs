//! Admin HTTP API.
//!
//! Bearer-token-protected endpoints for credential activation/revocation and
//! a health check. Spawned as a background task in the gateway. Credential
//! plaintext lives only in the request body; it is encrypted before it
//! touches the store and the resolver cache is invalidated write-through.

use crate::gateway::CredentialResolver;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use herald_core::config::ApiConfig;
use herald_store::{Store, UsageEntry, UsageLogger};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    store: Store,
    credentials: Arc<CredentialResolver>,
    usage: UsageLogger,
    api_key: Option<String>,
    uptime: Instant,
}

impl ApiState {
    pub fn new(
        store: Store,
        credentials: Arc<CredentialResolver>,
        usage: UsageLogger,
        api_key: String,
        uptime: Instant,
    ) -> Self {
        Self {
            store,
            credentials,
            usage,
            api_key: (!api_key.is_empty()).then_some(api_key),
            uptime,
        }
    }
}

/// Request body for credential activation.
#[derive(Debug, Deserialize)]
struct CredentialUpdate {
    completion_key: Option<String>,
    execution_key: Option<String>,
}

/// Constant-time string comparison to prevent timing attacks on token validation.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check bearer token auth. Returns `None` if authorized, `Some(response)` if rejected.
fn check_auth(headers: &HeaderMap, api_key: &Option<String>) -> Option<(StatusCode, Json<Value>)> {
    let key = match api_key {
        Some(k) => k,
        None => return None, // No auth configured — allow all.
    };

    let header = match headers.get("authorization") {
        Some(h) => h,
        None => {
            return Some((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "missing Authorization header"})),
            ));
        }
    };

    let value = match header.to_str() {
        Ok(v) => v,
        Err(_) => {
            return Some((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid Authorization header"})),
            ));
        }
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if constant_time_eq(token, key) => None, // Authorized.
        _ => Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid token"})),
        )),
    }
}

/// `GET /api/health` — store reachability, db size, cache size, uptime.
async fn health(
    headers: HeaderMap,
    State(state): State<ApiState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let (store_status, db_bytes) = match state.store.db_size().await {
        Ok(bytes) => ("ok", Some(bytes)),
        Err(e) => {
            error!("health check: store unavailable: {e}");
            ("error", None)
        }
    };

    Ok(Json(json!({
        "status": if store_status == "ok" { "ok" } else { "degraded" },
        "uptime_secs": state.uptime.elapsed().as_secs(),
        "store": store_status,
        "db_bytes": db_bytes,
        "credential_cache_entries": state.credentials.cached_entries().await,
    })))
}

/// `GET /api/users/{external_id}/credentials` — activation status.
async fn credential_status(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(external_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let user = state
        .store
        .find_user_by_external_id(&external_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(unknown_user)?;

    Ok(Json(json!({
        "external_id": user.external_id,
        "completion": user.completion_credential.is_some(),
        "execution": user.execution_credential.is_some(),
        "updated_at": user.updated_at.to_rfc3339(),
    })))
}

/// `POST /api/users/{external_id}/credentials` — activate personal credentials.
async fn set_credentials(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(external_id): Path<String>,
    Json(body): Json<CredentialUpdate>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    if body.completion_key.is_none() && body.execution_key.is_none() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "provide completion_key and/or execution_key"})),
        ));
    }

    let user = state
        .store
        .find_user_by_external_id(&external_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(unknown_user)?;

    if let Some(ref key) = body.completion_key {
        let blob = state
            .credentials
            .vault()
            .encrypt(key)
            .map_err(|e| (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()}))))?;
        state
            .store
            .set_completion_credential(&user.id, &blob)
            .await
            .map_err(internal_error)?;
    }

    if let Some(ref key) = body.execution_key {
        let blob = state
            .credentials
            .vault()
            .encrypt(key)
            .map_err(|e| (StatusCode::BAD_REQUEST, Json(json!({"error": e.to_string()}))))?;
        state
            .store
            .set_execution_credential(&user.id, &blob)
            .await
            .map_err(internal_error)?;
    }

    // Write-through invalidation: the next message re-resolves.
    state.credentials.invalidate(&user.id).await;

    let _ = state
        .usage
        .log(&UsageEntry {
            user_id: Some(user.id.clone()),
            operation_type: "credential_update".into(),
            tokens_used: None,
            success: true,
            error_message: None,
        })
        .await;

    Ok(Json(json!({
        "status": "ok",
        "completion": body.completion_key.is_some(),
        "execution": body.execution_key.is_some(),
    })))
}

/// `DELETE /api/users/{external_id}/credentials` — revoke personal credentials.
async fn revoke_credentials(
    headers: HeaderMap,
    State(state): State<ApiState>,
    Path(external_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if let Some(err) = check_auth(&headers, &state.api_key) {
        return Err(err);
    }

    let user = state
        .store
        .find_user_by_external_id(&external_id)
        .await
        .map_err(internal_error)?
        .ok_or_else(unknown_user)?;

    state
        .store
        .clear_credentials(&user.id)
        .await
        .map_err(internal_error)?;
    state.credentials.invalidate(&user.id).await;

    let _ = state
        .usage
        .log(&UsageEntry {
            user_id: Some(user.id.clone()),
            operation_type: "credential_revoke".into(),
            tokens_used: None,
            success: true,
            error_message: None,
        })
        .await;

    Ok(Json(json!({"status": "revoked"})))
}

fn internal_error(e: herald_core::error::HeraldError) -> (StatusCode, Json<Value>) {
    error!("admin api store failure: {e}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": "storage unavailable"})),
    )
}

fn unknown_user() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "unknown user"})),
    )
}

/// Build the admin router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/users/{external_id}/credentials",
            get(credential_status)
                .post(set_credentials)
                .delete(revoke_credentials),
        )
        .with_state(state)
}

/// Serve the admin API until the task is aborted.
pub async fn serve(config: ApiConfig, state: ApiState) {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("admin api failed to bind {addr}: {e}");
            return;
        }
    };

    info!("Admin API listening on {addr}");
    if let Err(e) = axum::serve(listener, router(state)).await {
        error!("admin api server error: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ResolvedCredentials;
    use axum::body::Body;
    use axum::http::Request;
    use herald_core::user::Tier;
    use herald_core::vault::CredentialVault;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn test_state(api_key: &str) -> (ApiState, Store) {
        let store = Store::open_in_memory().await.unwrap();
        let vault = CredentialVault::from_passphrase("api-test-passphrase").unwrap();
        let resolver = Arc::new(CredentialResolver::new(
            vault,
            ResolvedCredentials {
                completion: "default-c".into(),
                execution: "default-e".into(),
            },
            Duration::from_secs(600),
        ));
        let usage = UsageLogger::new(store.pool().clone());
        let state = ApiState::new(
            store.clone(),
            resolver,
            usage,
            api_key.to_string(),
            Instant::now(),
        );
        (state, store)
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_without_auth_configured() {
        let (state, _store) = test_state("").await;
        let resp = router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["store"], "ok");
    }

    #[tokio::test]
    async fn test_bad_token_rejected() {
        let (state, _store) = test_state("secret-token").await;
        let resp = router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header("authorization", "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_user_is_404() {
        let (state, _store) = test_state("").await;
        let resp = router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/users/999/credentials")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_credential_activate_status_revoke_flow() {
        let (state, store) = test_state("").await;
        store.create_user("123", None, Tier::Free).await.unwrap();
        let app = router(state);

        // Activate a completion credential.
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/users/123/credentials")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"completion_key":"user-gemini-key"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        // Status reflects it; the stored blob is encrypted, not plaintext.
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/users/123/credentials")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["completion"], true);
        assert_eq!(json["execution"], false);

        let user = store
            .find_user_by_external_id("123")
            .await
            .unwrap()
            .unwrap();
        let blob = user.completion_credential.unwrap();
        assert!(blob.starts_with("enc:v1:"));
        assert!(!blob.contains("user-gemini-key"));

        // Revoke clears both.
        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/users/123/credentials")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let user = store
            .find_user_by_external_id("123")
            .await
            .unwrap()
            .unwrap();
        assert!(user.completion_credential.is_none());
    }

    #[tokio::test]
    async fn test_set_requires_a_key() {
        let (state, store) = test_state("").await;
        store.create_user("123", None, Tier::Free).await.unwrap();
        let resp = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/users/123/credentials")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
    }
}
