mod defaults;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::HeraldError;
use defaults::*;

/// Top-level Herald configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub herald: HeraldConfig,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub vault: VaultConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

/// General agent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for HeraldConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Authentication-gate notices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// One-time notice sent when an account is created on first contact.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,
    /// Notice sent to explicitly deactivated accounts.
    #[serde(default = "default_deactivated_message")]
    pub deactivated_message: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            welcome_message: default_welcome_message(),
            deactivated_message: default_deactivated_message(),
        }
    }
}

/// Completion-provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub gemini: GeminiConfig,
}

/// Google Gemini API provider config. `api_key` is the process-wide default
/// credential; users may override it with their own via the admin API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_model")]
    pub model: String,
    /// Per-call timeout in seconds.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_gemini_model(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

/// Remote execution service config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_executor_base_url")]
    pub base_url: String,
    /// Process-wide default execution credential.
    #[serde(default)]
    pub api_key: String,
    /// Per-call timeout in seconds.
    #[serde(default = "default_executor_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: default_executor_base_url(),
            api_key: String::new(),
            timeout_secs: default_executor_timeout_secs(),
        }
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelConfig {
    pub telegram: Option<TelegramConfig>,
}

/// Telegram bot config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: String,
}

/// Persistence config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// How many recent messages to replay as conversation history.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            history_limit: default_history_limit(),
        }
    }
}

/// Credential-vault config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Passphrase from which the encryption key is derived. Required at
    /// startup; may also come from the `HERALD_VAULT_KEY` env var.
    #[serde(default)]
    pub passphrase: String,
    /// TTL for the decrypted-credential cache, in minutes.
    #[serde(default = "default_credential_cache_minutes")]
    pub cache_ttl_minutes: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            passphrase: String::new(),
            cache_ttl_minutes: default_credential_cache_minutes(),
        }
    }
}

/// Admin HTTP API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Bearer token for API authentication. Empty = no auth (local-only use).
    #[serde(default)]
    pub api_key: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_api_host(),
            port: default_api_port(),
            api_key: String::new(),
        }
    }
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. Secrets left empty in
/// the file are filled from the environment (`HERALD_VAULT_KEY`,
/// `TELEGRAM_BOT_TOKEN`, `GEMINI_API_KEY`, `HERALD_EXEC_API_KEY`).
pub fn load(path: &str) -> Result<Config, HeraldError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HeraldError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| HeraldError::Config(format!("failed to parse config: {e}")))?
    } else {
        tracing::info!("Config file not found at {}, using defaults", path.display());
        Config::default()
    };

    env_fallback(&mut config.vault.passphrase, "HERALD_VAULT_KEY");
    env_fallback(&mut config.provider.gemini.api_key, "GEMINI_API_KEY");
    env_fallback(&mut config.executor.api_key, "HERALD_EXEC_API_KEY");
    if let Some(ref mut tg) = config.channel.telegram {
        env_fallback(&mut tg.bot_token, "TELEGRAM_BOT_TOKEN");
    }

    Ok(config)
}

fn env_fallback(field: &mut String, var: &str) {
    if field.is_empty() {
        if let Ok(value) = std::env::var(var) {
            *field = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.herald.name, "Herald");
        assert_eq!(cfg.store.history_limit, 20);
        assert_eq!(cfg.provider.gemini.timeout_secs, 30);
        assert_eq!(cfg.vault.cache_ttl_minutes, 30);
        assert!(!cfg.api.enabled);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
            [herald]
            name = "Herald Test"

            [channel.telegram]
            bot_token = "123:abc"

            [vault]
            passphrase = "local-dev-passphrase"
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.herald.name, "Herald Test");
        assert_eq!(cfg.herald.log_level, "info");
        let tg = cfg.channel.telegram.unwrap();
        assert!(tg.enabled);
        assert_eq!(tg.bot_token, "123:abc");
        assert_eq!(cfg.vault.passphrase, "local-dev-passphrase");
    }

    #[test]
    fn test_shellexpand_home() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(shellexpand("~/x/y.db"), "/home/tester/x/y.db");
        assert_eq!(shellexpand("/abs/path"), "/abs/path");
    }
}
