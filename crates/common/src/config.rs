//! Application configuration.

use serde::Deserialize;
use std::path::PathBuf;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Redis configuration (only needed by the redis cache backend).
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    /// Page cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Pagination configuration.
    #[serde(default)]
    pub pagination: PaginationConfig,
    /// Media storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Administrator accounts.
    #[serde(default)]
    pub admin: AdminConfig,
    /// Outgoing mail.
    #[serde(default)]
    pub email: EmailConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Redis configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL.
    pub url: String,
    /// Key prefix for all Redis keys.
    #[serde(default = "default_redis_prefix")]
    pub prefix: String,
}

/// Which store backs the page cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// In-process map, per server instance.
    #[default]
    Memory,
    /// Shared Redis store.
    Redis,
}

/// Page cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Cache backend.
    #[serde(default)]
    pub backend: CacheBackend,
    /// How long the index page stays cached, in seconds.
    #[serde(default = "default_index_ttl_secs")]
    pub index_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            index_ttl_secs: default_index_ttl_secs(),
        }
    }
}

/// Pagination configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    /// Number of posts on every paginated list page.
    #[serde(default = "default_posts_per_page")]
    pub posts_per_page: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            posts_per_page: default_posts_per_page(),
        }
    }
}

/// Media storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory uploaded images are written to.
    #[serde(default = "default_storage_path")]
    pub base_path: PathBuf,
    /// URL prefix uploaded images are served under.
    #[serde(default = "default_storage_url")]
    pub base_url: String,
    /// Maximum accepted request body for uploads, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_storage_path(),
            base_url: default_storage_url(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Which transport delivers outgoing mail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailBackend {
    /// Write each message as an `.eml` file under `file_path`.
    #[default]
    File,
    /// Relay through an SMTP server.
    Smtp,
}

/// Outgoing mail configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Mail transport.
    #[serde(default)]
    pub backend: EmailBackend,
    /// Sender mailbox, e.g. `Inkwell <noreply@example.com>`.
    #[serde(default = "default_from_address")]
    pub from_address: String,
    /// Directory the file backend writes messages to.
    #[serde(default = "default_email_path")]
    pub file_path: PathBuf,
    /// SMTP relay host.
    #[serde(default)]
    pub smtp_host: Option<String>,
    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// SMTP username.
    #[serde(default)]
    pub smtp_username: Option<String>,
    /// SMTP password.
    #[serde(default)]
    pub smtp_password: Option<String>,
    /// How long a password reset link stays valid, in seconds.
    #[serde(default = "default_password_reset_timeout_secs")]
    pub password_reset_timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            backend: EmailBackend::default(),
            from_address: default_from_address(),
            file_path: default_email_path(),
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            password_reset_timeout_secs: default_password_reset_timeout_secs(),
        }
    }
}

/// Administrator configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Usernames granted administrator rights at signup.
    #[serde(default)]
    pub usernames: Vec<String>,
}

impl AdminConfig {
    /// Whether `username` is a configured administrator (case-insensitive).
    #[must_use]
    pub fn is_admin(&self, username: &str) -> bool {
        self.usernames
            .iter()
            .any(|name| name.eq_ignore_ascii_case(username))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    8000
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_redis_prefix() -> String {
    "inkwell".to_string()
}

const fn default_index_ttl_secs() -> u64 {
    20
}

const fn default_posts_per_page() -> u64 {
    10
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./media")
}

fn default_storage_url() -> String {
    "/media".to_string()
}

const fn default_max_upload_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_from_address() -> String {
    "Inkwell <noreply@inkwell.local>".to_string()
}

fn default_email_path() -> PathBuf {
    PathBuf::from("./sent_emails")
}

const fn default_smtp_port() -> u16 {
    587
}

const fn default_password_reset_timeout_secs() -> u64 {
    3 * 24 * 60 * 60
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present, into the process environment)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `INKWELL_ENV`)
    /// 4. Environment variables with `INKWELL__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();
        let env = std::env::var("INKWELL_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("INKWELL")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("admin.usernames")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
