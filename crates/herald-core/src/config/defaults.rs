//! Default value functions used by serde for config deserialization.

pub fn default_name() -> String {
    "Herald".to_string()
}

pub fn default_data_dir() -> String {
    "~/.herald".to_string()
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_welcome_message() -> String {
    "Welcome! Your account has been created on the free tier (100 messages per month). \
     Send your message again and I'll get to work."
        .to_string()
}

pub fn default_deactivated_message() -> String {
    "Your account is deactivated. Contact support to restore access.".to_string()
}

pub fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

pub fn default_provider_timeout_secs() -> u64 {
    30
}

pub fn default_executor_base_url() -> String {
    "http://localhost:8700".to_string()
}

pub fn default_executor_timeout_secs() -> u64 {
    30
}

pub fn default_db_path() -> String {
    "~/.herald/data/herald.db".to_string()
}

pub fn default_history_limit() -> usize {
    20
}

pub fn default_credential_cache_minutes() -> u64 {
    30
}

pub fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

pub fn default_api_port() -> u16 {
    3000
}
