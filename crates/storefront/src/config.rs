//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BAZAAR_DATABASE_URL` - `SQLite` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `BAZAAR_HOST` - Bind address (default: 127.0.0.1)
//! - `BAZAAR_PORT` - Listen port (default: 3000)
//! - `BAZAAR_BASE_URL` - Public URL; `https://` enables secure cookies
//!   (default: <http://localhost:3000>)
//! - `BAZAAR_UPLOAD_DIR` - Directory for product images (default: uploads)
//! - `BAZAAR_MAX_UPLOAD_BYTES` - Request body limit for uploads (default: 5 MiB)
//! - `BAZAAR_IMAGE_EXTENSIONS` - Comma-separated image extensions (default: png,jpg,jpeg)
//! - `BAZAAR_RECENT_PRODUCTS` - Products on the landing page (default: 10)
//! - `BAZAAR_LOG_JSON` - Emit JSON logs when set
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_IMAGE_EXTENSIONS: &str = "png,jpg,jpeg";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `SQLite` database connection URL
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Product image upload settings
    pub uploads: UploadConfig,
    /// Number of products listed on the landing page
    pub recent_products: u32,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production")
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Product image upload configuration.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory stored images are written to and served from
    pub dir: PathBuf,
    /// Maximum accepted request body size for uploads
    pub max_bytes: usize,
    /// Allowed file extensions, lowercase without the leading dot
    pub allowed_extensions: Vec<String>,
}

impl UploadConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dir: PathBuf::from(get_env_or_default("BAZAAR_UPLOAD_DIR", "uploads")),
            max_bytes: parse_env_or_default("BAZAAR_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            allowed_extensions: parse_extensions(&get_env_or_default(
                "BAZAAR_IMAGE_EXTENSIONS",
                DEFAULT_IMAGE_EXTENSIONS,
            ))
            .map_err(|e| ConfigError::InvalidEnvVar("BAZAAR_IMAGE_EXTENSIONS".to_string(), e))?,
        })
    }

    /// Upload settings rooted at `dir` with the default limits.
    #[must_use]
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: DEFAULT_IMAGE_EXTENSIONS
                .split(',')
                .map(str::to_owned)
                .collect(),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("BAZAAR_DATABASE_URL")?;
        let host = parse_env_or_default("BAZAAR_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = parse_env_or_default("BAZAAR_PORT", 3000_u16)?;
        let base_url = get_env_or_default("BAZAAR_BASE_URL", "http://localhost:3000");
        let uploads = UploadConfig::from_env()?;

        let recent_products = parse_env_or_default("BAZAAR_RECENT_PRODUCTS", 10_u32)?;
        if recent_products == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "BAZAAR_RECENT_PRODUCTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            uploads,
            recent_products,
            log_json: get_optional_env("BAZAAR_LOG_JSON").is_some(),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or_default("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: parse_env_or_default("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
        })
    }

    /// Configuration for a local instance backed by `database_url`, with
    /// every optional setting at its default.
    #[must_use]
    pub fn local(database_url: SecretString, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            database_url,
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            uploads: UploadConfig::in_dir(upload_dir),
            recent_products: 10,
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies must carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Parse a comma-separated extension list such as `"png, .JPG,jpeg"`.
fn parse_extensions(raw: &str) -> Result<Vec<String>, String> {
    let mut extensions: Vec<String> = Vec::new();

    for item in raw.split(',') {
        let ext = item.trim().trim_start_matches('.').to_ascii_lowercase();
        if ext.is_empty() {
            continue;
        }
        if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("invalid extension '{ext}'"));
        }
        if !extensions.contains(&ext) {
            extensions.push(ext);
        }
    }

    if extensions.is_empty() {
        return Err("at least one extension is required".to_string());
    }

    Ok(extensions)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extensions_normalizes() {
        let exts = parse_extensions("png, .JPG,jpeg,png").unwrap();
        assert_eq!(exts, vec!["png", "jpg", "jpeg"]);
    }

    #[test]
    fn test_parse_extensions_rejects_empty_list() {
        assert!(parse_extensions(" , ").is_err());
        assert!(parse_extensions("").is_err());
    }

    #[test]
    fn test_parse_extensions_rejects_path_characters() {
        assert!(parse_extensions("png,../sh").is_err());
    }

    #[test]
    fn test_default_upload_config() {
        let uploads = UploadConfig::in_dir("/tmp/up");
        assert_eq!(uploads.allowed_extensions, vec!["png", "jpg", "jpeg"]);
        assert_eq!(uploads.max_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig::local(SecretString::from("sqlite::memory:"), "uploads");

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_secure_cookies_follow_base_url() {
        let mut config =
            StorefrontConfig::local(SecretString::from("sqlite::memory:"), "uploads");
        assert!(!config.secure_cookies());

        config.base_url = "https://bazaar.example".to_string();
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_config_debug_redacts_database_url() {
        let config = StorefrontConfig::local(
            SecretString::from("sqlite:///srv/secret-location.db"),
            "uploads",
        );

        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("secret-location"));
        assert!(debug_output.contains("127.0.0.1"));
    }
}
