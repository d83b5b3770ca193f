use std::env;
use std::path::PathBuf;

use chrono::Utc;

use crate::auth::{ttl_delta, SessionConfig};

/// Minimum length of the session signing secret
const MIN_SECRET_LEN: usize = 32;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Bind address (0.0.0.0 for LAN, 127.0.0.1 for localhost)
    pub bind_addr: String,
    /// PostgreSQL database URL; in-memory stores are used when unset
    pub database_url: Option<String>,
    /// Name of the session cookie
    pub session_cookie_name: String,
    /// Key for signing session cookies
    pub session_secret: String,
    /// Server-side session lifetime in seconds (0 = until logout)
    pub session_ttl_seconds: u64,
    /// Mark the session cookie `Secure`
    pub session_cookie_secure: bool,
    /// Role matrix file; enables role enforcement when set
    pub role_matrix_path: Option<PathBuf>,
    /// Accounts may be created without a password
    pub allow_passwordless_accounts: bool,
    /// Unknown accounts are provisioned by `/sessions/register`
    pub allow_self_registration: bool,
    /// CORS allowed origins (comma-separated in env var)
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str, default: bool| {
            lookup(key)
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(default)
        };

        let session_secret = lookup("SESSION_SECRET")
            .ok_or_else(|| ConfigError::MissingEnvVar("SESSION_SECRET".to_string()))?;

        if session_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "SESSION_SECRET must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        let session_ttl_seconds: u64 = match lookup("SESSION_TTL_SECONDS") {
            Some(v) => v.parse().map_err(|_| {
                ConfigError::InvalidValue(
                    "SESSION_TTL_SECONDS must be a number of seconds".to_string(),
                )
            })?,
            None => 0,
        };

        // Expiry timestamps must stay representable
        let ttl_in_range = session_ttl_seconds == 0
            || ttl_delta(session_ttl_seconds)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                .is_some();
        if !ttl_in_range {
            return Err(ConfigError::InvalidValue(format!(
                "SESSION_TTL_SECONDS is out of range: {}",
                session_ttl_seconds
            )));
        }

        Ok(Self {
            port: lookup("ADMINS_PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            bind_addr: lookup("ADMINS_BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            session_cookie_name: lookup("SESSION_COOKIE_NAME")
                .unwrap_or_else(|| "admins_session".to_string()),
            session_secret,
            session_ttl_seconds,
            session_cookie_secure: flag("SESSION_COOKIE_SECURE", false),
            role_matrix_path: lookup("ROLE_MATRIX_PATH")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            allow_passwordless_accounts: flag("ALLOW_PASSWORDLESS_ACCOUNTS", true),
            allow_self_registration: flag("ALLOW_SELF_REGISTRATION", false),
            cors_origins: lookup("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]),
        })
    }

    /// Get the full bind address (addr:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            cookie_name: self.session_cookie_name.clone(),
            secret: self.session_secret.as_bytes().to_vec(),
            ttl_seconds: self.session_ttl_seconds,
            secure_cookie: self.session_cookie_secure,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
