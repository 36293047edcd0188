//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Content store configuration.
    pub storage: StorageSettings,
}

/// Server configuration.
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token required on every admin route.
    pub admin_token: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("admin_token", &"<redacted>")
            .finish()
    }
}

/// GitHub content store configuration.
///
/// Files live in `<owner>/<repo>` and are served from
/// `https://<cdn_host>/gh/<owner>/<repo>/...`.
#[derive(Clone, Deserialize)]
pub struct StorageSettings {
    /// Personal access token used as the bearer token on the contents API.
    pub token: String,
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Base URL of the contents API.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// CDN host serving the repository.
    #[serde(default = "default_cdn_host")]
    pub cdn_host: String,
    /// Committer name recorded on every write.
    #[serde(default = "default_committer_name")]
    pub committer_name: String,
    /// Committer email recorded on every write.
    #[serde(default = "default_committer_email")]
    pub committer_email: String,
    /// Maximum upload size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Lowercase file extensions accepted for upload.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Retry settings for outbound calls.
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_cdn_host() -> String {
    "cdn.jsdelivr.net".to_string()
}

fn default_committer_name() -> String {
    "IFMSA Brazil Admin".to_string()
}

fn default_committer_email() -> String {
    "admin@ifmsabrazil.org".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_allowed_extensions() -> Vec<String> {
    ["png", "jpg", "jpeg", "gif", "webp", "svg", "md", "pdf"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSettings")
            .field("token", &"<redacted>")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .field("cdn_host", &self.cdn_host)
            .field("committer_name", &self.committer_name)
            .field("committer_email", &self.committer_email)
            .field("max_file_size", &self.max_file_size)
            .field("allowed_extensions", &self.allowed_extensions)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Retry settings for the resilient HTTP client.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    /// Total attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Factor applied to the delay after each further failure.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, later ones overriding earlier ones: `config/default`,
    /// `config/{RUN_MODE}`, then `IFMSA__*` environment variables
    /// (`IFMSA__STORAGE__TOKEN`, `IFMSA__SERVER__PORT`, ...).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("IFMSA")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("storage.allowed_extensions")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
