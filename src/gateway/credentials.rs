//! Per-user credential resolution with a TTL cache.
//!
//! On a cache miss the user's encrypted credential fields are decrypted via
//! the vault; a present-but-undecryptable blob is treated the same as an
//! absent one (fall back to the process-wide defaults) and logged at warn
//! level, since it indicates corruption or a key-rotation mismatch.
//!
//! Cache entries are invalidated explicitly whenever a user's credentials
//! change (write-through invalidation) and are never trusted past their TTL.

use herald_core::{user::User, vault::CredentialVault};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::warn;

/// The plaintext credentials a conversation runs with.
#[derive(Clone)]
pub struct ResolvedCredentials {
    pub completion: String,
    pub execution: String,
}

impl std::fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResolvedCredentials([REDACTED])")
    }
}

struct CacheEntry {
    credentials: ResolvedCredentials,
    inserted_at: Instant,
}

/// Merges default system credentials with user-specific decrypted overrides.
pub struct CredentialResolver {
    vault: CredentialVault,
    defaults: ResolvedCredentials,
    ttl: Duration,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl CredentialResolver {
    pub fn new(vault: CredentialVault, defaults: ResolvedCredentials, ttl: Duration) -> Self {
        Self {
            vault,
            defaults,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the credentials for a user, consulting the cache first.
    pub async fn resolve(&self, user: &User) -> ResolvedCredentials {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&user.id) {
                if entry.inserted_at.elapsed() < self.ttl {
                    return entry.credentials.clone();
                }
            }
        }

        let completion = self
            .decrypt_field(user, user.completion_credential.as_deref(), "completion")
            .unwrap_or_else(|| self.defaults.completion.clone());
        let execution = self
            .decrypt_field(user, user.execution_credential.as_deref(), "execution")
            .unwrap_or_else(|| self.defaults.execution.clone());

        let credentials = ResolvedCredentials {
            completion,
            execution,
        };

        let mut cache = self.cache.write().await;
        cache.insert(
            user.id.clone(),
            CacheEntry {
                credentials: credentials.clone(),
                inserted_at: Instant::now(),
            },
        );

        credentials
    }

    fn decrypt_field(&self, user: &User, blob: Option<&str>, label: &str) -> Option<String> {
        let blob = blob?;
        match self.vault.decrypt(blob) {
            Some(plaintext) => Some(plaintext),
            None => {
                warn!(
                    "stored {label} credential for user {} failed to decrypt; using default",
                    user.id
                );
                None
            }
        }
    }

    /// Drop the cached entry for a user. Called whenever their credentials
    /// are updated or revoked, so a revoke is never served from cache.
    pub async fn invalidate(&self, user_id: &str) {
        self.cache.write().await.remove(user_id);
    }

    /// The vault used for credential encryption (shared with the admin API).
    pub fn vault(&self) -> &CredentialVault {
        &self.vault
    }

    /// Number of live cache entries (for the health endpoint).
    pub async fn cached_entries(&self) -> usize {
        self.cache.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use herald_core::user::Tier;

    fn vault() -> CredentialVault {
        CredentialVault::from_passphrase("resolver-test-passphrase").unwrap()
    }

    fn resolver(vault: CredentialVault, ttl: Duration) -> CredentialResolver {
        CredentialResolver::new(
            vault,
            ResolvedCredentials {
                completion: "default-completion-key".into(),
                execution: "default-execution-key".into(),
            },
            ttl,
        )
    }

    fn user(completion: Option<String>, execution: Option<String>) -> User {
        User {
            id: "u1".into(),
            external_id: "123".into(),
            display_name: None,
            tier: Tier::Free,
            message_count: 0,
            message_quota: 100,
            quota_reset_date: Utc::now(),
            is_active: Some(true),
            completion_credential: completion,
            execution_credential: execution,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_personal_credentials_win_over_defaults() {
        let v = vault();
        let blob = v.encrypt("user-gemini-key").unwrap();
        let resolver = resolver(v, Duration::from_secs(600));

        let creds = resolver.resolve(&user(Some(blob), None)).await;
        assert_eq!(creds.completion, "user-gemini-key");
        // No personal execution credential — default fills in.
        assert_eq!(creds.execution, "default-execution-key");
    }

    #[tokio::test]
    async fn test_corrupt_blob_falls_back_to_default() {
        let resolver = resolver(vault(), Duration::from_secs(600));

        let creds = resolver
            .resolve(&user(Some("enc:v1:not-really-a-blob".into()), None))
            .await;
        assert_eq!(creds.completion, "default-completion-key");
    }

    #[tokio::test]
    async fn test_cache_serves_until_invalidated() {
        let v = vault();
        let old_blob = v.encrypt("old-key").unwrap();
        let new_blob = v.encrypt("new-key").unwrap();
        let resolver = resolver(v, Duration::from_secs(600));

        let creds = resolver.resolve(&user(Some(old_blob), None)).await;
        assert_eq!(creds.completion, "old-key");

        // Same user id with a changed blob: cache still answers.
        let creds = resolver.resolve(&user(Some(new_blob.clone()), None)).await;
        assert_eq!(creds.completion, "old-key");

        // After write-through invalidation the new blob is decrypted.
        resolver.invalidate("u1").await;
        let creds = resolver.resolve(&user(Some(new_blob), None)).await;
        assert_eq!(creds.completion, "new-key");
    }

    #[tokio::test]
    async fn test_expired_entries_are_not_trusted() {
        let v = vault();
        let old_blob = v.encrypt("old-key").unwrap();
        let new_blob = v.encrypt("new-key").unwrap();
        let resolver = resolver(v, Duration::ZERO);

        let creds = resolver.resolve(&user(Some(old_blob), None)).await;
        assert_eq!(creds.completion, "old-key");

        // TTL of zero: the next resolve re-reads the snapshot.
        let creds = resolver.resolve(&user(Some(new_blob), None)).await;
        assert_eq!(creds.completion, "new-key");
    }

    #[tokio::test]
    async fn test_cached_entries_counts() {
        let resolver = resolver(vault(), Duration::from_secs(600));
        assert_eq!(resolver.cached_entries().await, 0);
        resolver.resolve(&user(None, None)).await;
        assert_eq!(resolver.cached_entries().await, 1);
        resolver.invalidate("u1").await;
        assert_eq!(resolver.cached_entries().await, 0);
    }
}
