//! Server configuration.
//!
//! Non-secret settings come from an optional TOML file with every section
//! defaulted, then environment overrides. Secrets (admin token, encryption
//! key, OAuth client secret) are read from the environment only.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Complete drivegate configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DriveGateConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Largest accepted upload request body
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Browser origin allowed to call the API; no CORS headers when unset
    #[serde(default)]
    pub cors_origin: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_upload_bytes: default_max_upload_bytes(),
            cors_origin: None,
        }
    }
}

/// OAuth provider and drive API endpoints
#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Base for metadata calls, e.g. `https://www.googleapis.com/drive/v3`
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Base for media uploads, e.g. `https://www.googleapis.com/upload/drive/v3`
    #[serde(default = "default_upload_base")]
    pub upload_base: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub client_id: String,
    /// Only ever set from the environment
    #[serde(skip)]
    pub client_secret: String,
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_api_base() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}

fn default_upload_base() -> String {
    "https://www.googleapis.com/upload/drive/v3".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["https://www.googleapis.com/auth/drive".to_string()]
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            api_base: default_api_base(),
            upload_base: default_upload_base(),
            scopes: default_scopes(),
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("api_base", &self.api_base)
            .field("upload_base", &self.upload_base)
            .field("scopes", &self.scopes)
            .field("client_id", &self.client_id)
            .field("client_secret_set", &!self.client_secret.is_empty())
            .finish()
    }
}

impl ProviderConfig {
    /// True when the OAuth client credentials are present
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

/// Consent flow configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    /// Public base URL the provider redirects back to
    #[serde(default = "default_callback_base_url")]
    pub callback_base_url: String,
    /// How long a consent state stays valid
    #[serde(default = "default_state_expiry")]
    pub state_expiry_seconds: i64,
    #[serde(default = "default_state_cleanup_interval")]
    pub state_cleanup_interval_seconds: u64,
}

fn default_callback_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_state_expiry() -> i64 {
    600
}

fn default_state_cleanup_interval() -> u64 {
    60
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            callback_base_url: default_callback_base_url(),
            state_expiry_seconds: default_state_expiry(),
            state_cleanup_interval_seconds: default_state_cleanup_interval(),
        }
    }
}

/// Credential database location
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "drive_credentials.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Upper bound for any single provider call
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

/// Secrets read from the environment only.
#[derive(Clone, Default)]
pub struct Secrets {
    /// Required value of the `x-admin-token` header. None rejects all admin calls.
    pub admin_token: Option<String>,
    /// Base64 32-byte key for sealing refresh tokens. None stores plaintext.
    pub encryption_key: Option<String>,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("admin_token_set", &self.admin_token.is_some())
            .field("encryption_key_set", &self.encryption_key.is_some())
            .finish()
    }
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            admin_token: non_empty_env("DRIVEGATE_ADMIN_TOKEN"),
            encryption_key: non_empty_env("DRIVEGATE_ENCRYPTION_KEY"),
        }
    }
}

impl DriveGateConfig {
    /// Loads the TOML file at `path` (when given) and applies env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => load_config(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies overrides from a variable lookup. Unparseable numbers are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DRIVEGATE_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(n) = get("DRIVEGATE_MAX_UPLOAD_BYTES").and_then(|v| v.parse().ok()) {
            self.server.max_upload_bytes = n;
        }
        if let Some(v) = get("DRIVEGATE_CORS_ORIGIN") {
            self.server.cors_origin = Some(v);
        }
        if let Some(v) = get("DRIVEGATE_DB_PATH") {
            self.storage.db_path = v;
        }
        if let Some(v) = get("DRIVEGATE_CALLBACK_BASE_URL") {
            self.oauth.callback_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(n) = get("DRIVEGATE_STATE_EXPIRY_SECONDS").and_then(|v| v.parse().ok()) {
            self.oauth.state_expiry_seconds = n;
        }
        if let Some(n) =
            get("DRIVEGATE_STATE_CLEANUP_INTERVAL_SECONDS").and_then(|v| v.parse().ok())
        {
            self.oauth.state_cleanup_interval_seconds = n;
        }
        if let Some(v) = get("DRIVEGATE_GOOGLE_CLIENT_ID") {
            self.provider.client_id = v;
        }
        if let Some(v) = get("DRIVEGATE_GOOGLE_CLIENT_SECRET") {
            self.provider.client_secret = v;
        }
        if let Some(v) = get("DRIVEGATE_TOKEN_URL") {
            self.provider.token_url = v;
        }
        if let Some(v) = get("DRIVEGATE_DRIVE_API_BASE") {
            self.provider.api_base = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("DRIVEGATE_DRIVE_UPLOAD_BASE") {
            self.provider.upload_base = v.trim_end_matches('/').to_string();
        }
        if let Some(n) = get("DRIVEGATE_HTTP_TIMEOUT_SECONDS").and_then(|v| v.parse().ok()) {
            self.http.timeout_seconds = n;
        }
        if let Some(n) = get("DRIVEGATE_HTTP_CONNECT_TIMEOUT_SECONDS").and_then(|v| v.parse().ok())
        {
            self.http.connect_timeout_seconds = n;
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Load configuration from TOML file
pub fn load_config(path: &Path) -> Result<DriveGateConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&contents).context("Failed to parse config file")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = DriveGateConfig::default();
        assert_eq!(config.server.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.http.timeout_seconds, 30);
        assert_eq!(config.oauth.state_expiry_seconds, 600);
        assert_eq!(config.provider.token_url, "https://oauth2.googleapis.com/token");
        assert!(!config.provider.is_configured());
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [server]
            bind_addr = "127.0.0.1:8080"
            max_upload_bytes = 1048576

            [provider]
            client_id = "abc.apps.googleusercontent.com"
            scopes = ["https://www.googleapis.com/auth/drive.file"]

            [oauth]
            callback_base_url = "https://portal.example.com"
            state_expiry_seconds = 300

            [storage]
            db_path = "/var/lib/drivegate/credentials.db"

            [http]
            timeout_seconds = 15
        "#;

        let config: DriveGateConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.server.max_upload_bytes, 1_048_576);
        assert_eq!(config.provider.client_id, "abc.apps.googleusercontent.com");
        assert_eq!(config.provider.scopes.len(), 1);
        assert_eq!(config.oauth.state_expiry_seconds, 300);
        assert_eq!(config.storage.db_path, "/var/lib/drivegate/credentials.db");
        assert_eq!(config.http.timeout_seconds, 15);
        assert_eq!(config.http.connect_timeout_seconds, 10);
    }

    #[test]
    fn test_client_secret_ignored_in_file() {
        let toml = r#"
            [provider]
            client_secret = "should-not-load"
        "#;
        let config: DriveGateConfig = toml::from_str(toml).unwrap();
        assert!(config.provider.client_secret.is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DRIVEGATE_BIND_ADDR", "127.0.0.1:9000"),
            ("DRIVEGATE_GOOGLE_CLIENT_ID", "id"),
            ("DRIVEGATE_GOOGLE_CLIENT_SECRET", "secret"),
            ("DRIVEGATE_CALLBACK_BASE_URL", "https://portal.example.com/"),
            ("DRIVEGATE_HTTP_TIMEOUT_SECONDS", "not-a-number"),
            ("DRIVEGATE_HTTP_CONNECT_TIMEOUT_SECONDS", "3"),
            ("DRIVEGATE_STATE_CLEANUP_INTERVAL_SECONDS", "15"),
        ]
        .into_iter()
        .collect();

        let mut config = DriveGateConfig::default();
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert!(config.provider.is_configured());
        assert_eq!(config.oauth.callback_base_url, "https://portal.example.com");
        // Unparseable values keep the default
        assert_eq!(config.http.timeout_seconds, 30);
        assert_eq!(config.http.connect_timeout_seconds, 3);
        assert_eq!(config.oauth.state_cleanup_interval_seconds, 15);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let mut config = DriveGateConfig::default();
        config.provider.client_secret = "super-secret".to_string();
        assert!(!format!("{:?}", config).contains("super-secret"));

        let secrets = Secrets {
            admin_token: Some("admin-secret".to_string()),
            encryption_key: None,
        };
        assert!(!format!("{:?}", secrets).contains("admin-secret"));
    }
}
