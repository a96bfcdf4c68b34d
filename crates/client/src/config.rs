//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CLOUDBERRY_API_BASE_URL` - Base URL of the storefront REST backend
//! - `CLOUDBERRY_STORAGE_DIR` - Directory for the persistent local channel
//!
//! ## Optional
//! - `CLOUDBERRY_API_TOKEN` - Bearer token attached to backend requests
//! - `CLOUDBERRY_SNAPSHOT_TTL_DAYS` - Snapshot time-to-live (default: 20)
//! - `CLOUDBERRY_COOKIE_BYTE_CEILING` - Per-entry byte ceiling of the
//!   size-capped channel (default: 4000)
//! - `CLOUDBERRY_SEARCH_PATH` - Request path the search observer watches
//!   (default: /api/search)

use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Default snapshot time-to-live in days.
pub const DEFAULT_SNAPSHOT_TTL_DAYS: i64 = 20;

/// Default per-entry byte ceiling of the size-capped channel.
pub const DEFAULT_COOKIE_BYTE_CEILING: usize = 4000;

/// Default request path the search observer watches.
pub const DEFAULT_SEARCH_PATH: &str = "/api/search";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the storefront REST backend
    pub api_base_url: Url,
    /// Bearer token attached to backend requests, if any
    pub api_token: Option<SecretString>,
    /// Directory backing the persistent local channel
    pub storage_dir: PathBuf,
    /// Age in days past which a persisted snapshot is treated as absent
    pub snapshot_ttl_days: i64,
    /// Hard per-entry byte ceiling of the size-capped channel
    pub cookie_byte_ceiling: usize,
    /// Request path prefix the search observer treats as a search
    pub search_path: String,
}

impl ClientConfig {
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

        let api_base_url = get_required_env("CLOUDBERRY_API_BASE_URL")?
            .parse::<Url>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CLOUDBERRY_API_BASE_URL".to_string(), e.to_string())
            })?;
        let api_token = get_optional_env("CLOUDBERRY_API_TOKEN").map(SecretString::from);
        let storage_dir = PathBuf::from(get_required_env("CLOUDBERRY_STORAGE_DIR")?);
        let snapshot_ttl_days = parse_env_or_default(
            "CLOUDBERRY_SNAPSHOT_TTL_DAYS",
            DEFAULT_SNAPSHOT_TTL_DAYS,
        )?;
        let cookie_byte_ceiling = parse_env_or_default(
            "CLOUDBERRY_COOKIE_BYTE_CEILING",
            DEFAULT_COOKIE_BYTE_CEILING,
        )?;
        let search_path = get_env_or_default("CLOUDBERRY_SEARCH_PATH", DEFAULT_SEARCH_PATH);

        Ok(Self {
            api_base_url,
            api_token,
            storage_dir,
            snapshot_ttl_days,
            cookie_byte_ceiling,
            search_path,
        })
    }

    /// Build a configuration programmatically with the documented defaults.
    ///
    /// Useful for hosts that manage their own settings and for tests.
    #[must_use]
    pub fn new(api_base_url: Url, storage_dir: PathBuf) -> Self {
        Self {
            api_base_url,
            api_token: None,
            storage_dir,
            snapshot_ttl_days: DEFAULT_SNAPSHOT_TTL_DAYS,
            cookie_byte_ceiling: DEFAULT_COOKIE_BYTE_CEILING,
            search_path: DEFAULT_SEARCH_PATH.to_string(),
        }
    }
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
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable into `T`, falling back to a default when
/// the variable is unset.
fn parse_env_or_default<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}
