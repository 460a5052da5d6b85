//! API Configuration Module
//!
//! Server, CORS and record-store settings loaded from environment variables
//! with defaults suitable for local development.

use crate::error::{ApiError, ApiResult};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// STORE SELECTION
// ============================================================================

/// Which record store backs the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    /// PostgreSQL via deadpool (default)
    #[default]
    Postgres,
    /// Process-local tables; data is lost on restart
    Memory,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Postgres => "postgres",
            StoreKind::Memory => "memory",
        }
    }
}

impl FromStr for StoreKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StoreKind::Postgres),
            "memory" | "in-memory" | "mem" => Ok(StoreKind::Memory),
            other => Err(ApiError::invalid_input(format!(
                "Unknown SIRIUS_STORE '{}', expected postgres or memory",
                other
            ))),
        }
    }
}

// ============================================================================
// API CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Interface to bind (default: 0.0.0.0)
    pub bind_host: String,

    /// Listening port (default: 3000)
    pub port: u16,

    /// Allowed CORS origins. Empty means allow all origins (dev mode).
    pub cors_origins: Vec<String>,

    pub cors_allow_credentials: bool,

    /// Max age for CORS preflight cache in seconds.
    pub cors_max_age_secs: u64,

    /// Upper bound on a single request, store and cache calls included.
    pub request_timeout: Duration,

    pub store: StoreKind,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 3000,
            cors_origins: Vec::new(),
            cors_allow_credentials: false,
            cors_max_age_secs: 86400,
            request_timeout: Duration::from_secs(30),
            store: StoreKind::default(),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SIRIUS_API_BIND`: bind host (default: 0.0.0.0)
    /// - `PORT` or `SIRIUS_API_PORT`: port (default: 3000)
    /// - `SIRIUS_CORS_ORIGINS`: comma-separated allowed origins (empty = allow all)
    /// - `SIRIUS_CORS_ALLOW_CREDENTIALS`: "true" or "false" (default: false)
    /// - `SIRIUS_CORS_MAX_AGE_SECS`: preflight cache duration (default: 86400)
    /// - `SIRIUS_REQUEST_TIMEOUT_SECS`: per-request timeout (default: 30)
    /// - `SIRIUS_STORE`: `postgres` | `memory` (default: postgres)
    pub fn from_env() -> ApiResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> ApiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_host = lookup("SIRIUS_API_BIND")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.bind_host);

        let port = match lookup("PORT").or_else(|| lookup("SIRIUS_API_PORT")) {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                ApiError::invalid_input(format!("Invalid port '{}'", raw))
            })?,
            None => defaults.port,
        };

        let cors_origins = lookup("SIRIUS_CORS_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let cors_allow_credentials = lookup("SIRIUS_CORS_ALLOW_CREDENTIALS")
            .map(|s| s.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let cors_max_age_secs = lookup("SIRIUS_CORS_MAX_AGE_SECS")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(defaults.cors_max_age_secs);

        let request_timeout = lookup("SIRIUS_REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let store = match lookup("SIRIUS_STORE") {
            Some(raw) if !raw.trim().is_empty() => raw.parse()?,
            _ => defaults.store,
        };

        Ok(Self {
            bind_host,
            port,
            cors_origins,
            cors_allow_credentials,
            cors_max_age_secs,
            request_timeout,
            store,
        })
    }

    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let ip: IpAddr = self.bind_host.parse().map_err(|_| {
            ApiError::invalid_input(format!("Invalid bind address '{}'", self.bind_host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Strict CORS is in effect.
    pub fn is_production(&self) -> bool {
        !self.cors_origins.is_empty()
    }
}
