//! Listings configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TRADEPOST_DATABASE_URL` - Realtime database base URL (e.g., `https://my-app.firebaseio.com`)
//! - `TRADEPOST_STORAGE_BUCKET` - Blob storage bucket name (e.g., `my-app.appspot.com`)
//!
//! ## Optional
//! - `TRADEPOST_AUTH_TOKEN` - ID token of the signed-in user, sent with every store request
//! - `TRADEPOST_STORAGE_URL` - Blob storage API base (default: `https://firebasestorage.googleapis.com`)
//! - `TRADEPOST_GEOCODER_URL` - Geocoding API base (default: `https://nominatim.openstreetmap.org`)
//! - `TRADEPOST_USER_AGENT` - User agent for outbound requests (default: `tradepost/<version>`)
//! - `TRADEPOST_LOG_JSON` - Emit JSON logs when set to `1` or `true`
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_STORAGE_URL: &str = "https://firebasestorage.googleapis.com";
const DEFAULT_GEOCODER_URL: &str = "https://nominatim.openstreetmap.org";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Listings configuration.
#[derive(Debug, Clone)]
pub struct ListingsConfig {
    /// Realtime database settings
    pub database: DatabaseConfig,
    /// Blob storage settings
    pub storage: StorageConfig,
    /// Geocoding API base URL
    pub geocoder_url: Url,
    /// User agent sent with outbound requests
    pub user_agent: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Realtime database configuration.
///
/// Implements `Debug` manually to redact the auth token.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Base URL of the database
    pub url: Url,
    /// ID token of the signed-in user
    pub auth_token: Option<SecretString>,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_str())
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Blob storage configuration.
///
/// Implements `Debug` manually to redact the auth token.
#[derive(Clone)]
pub struct StorageConfig {
    /// Base URL of the storage API
    pub url: Url,
    /// Bucket holding product images
    pub bucket: String,
    /// ID token of the signed-in user
    pub auth_token: Option<SecretString>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("url", &self.url.as_str())
            .field("bucket", &self.bucket)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl ListingsConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or a URL is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let auth_token = get_optional_env("TRADEPOST_AUTH_TOKEN").map(SecretString::from);

        let database = DatabaseConfig {
            url: parse_url("TRADEPOST_DATABASE_URL", &get_required_env("TRADEPOST_DATABASE_URL")?)?,
            auth_token: auth_token.clone(),
        };
        let storage = StorageConfig {
            url: parse_url(
                "TRADEPOST_STORAGE_URL",
                &get_env_or_default("TRADEPOST_STORAGE_URL", DEFAULT_STORAGE_URL),
            )?,
            bucket: get_required_env("TRADEPOST_STORAGE_BUCKET")?,
            auth_token,
        };
        let geocoder_url = parse_url(
            "TRADEPOST_GEOCODER_URL",
            &get_env_or_default("TRADEPOST_GEOCODER_URL", DEFAULT_GEOCODER_URL),
        )?;
        let user_agent = get_optional_env("TRADEPOST_USER_AGENT").unwrap_or_else(default_user_agent);
        let log_json = parse_flag(get_optional_env("TRADEPOST_LOG_JSON").as_deref());

        Ok(Self {
            database,
            storage,
            geocoder_url,
            user_agent,
            log_json,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

/// User agent identifying this crate and version.
#[must_use]
pub fn default_user_agent() -> String {
    format!("tradepost/{}", env!("CARGO_PKG_VERSION"))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse a base URL, normalising it to end with a slash so `Url::join` appends.
fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_flag(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "TRUE" | "yes"))
}
