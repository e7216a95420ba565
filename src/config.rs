// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! typed configuration loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `GATEWAYS` | Comma-separated gateway base URLs | see [`DEFAULT_GATEWAYS`] |
//! | `GATEWAY_TIMEOUT_MS` | Timeout for a single gateway attempt | `10000` |
//! | `FETCH_ROUNDS` | Full passes over the gateway list per recovery | `2` |
//! | `FETCH_RETRY_BACKOFF_MS` | Pause between passes | `500` |
//! | `TLS_CERT_PATH` | PEM certificate chain; enables HTTPS with `TLS_KEY_PATH` | unset |
//! | `TLS_KEY_PATH` | PEM private key | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const GATEWAYS_ENV: &str = "GATEWAYS";
pub const GATEWAY_TIMEOUT_MS_ENV: &str = "GATEWAY_TIMEOUT_MS";
pub const FETCH_ROUNDS_ENV: &str = "FETCH_ROUNDS";
pub const FETCH_RETRY_BACKOFF_MS_ENV: &str = "FETCH_RETRY_BACKOFF_MS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Public gateways tried when `GATEWAYS` is unset, in this order.
pub const DEFAULT_GATEWAYS: &[&str] = &[
    "https://gateway.pinata.cloud/ipfs/",
    "https://ipfs.io/ipfs/",
    "https://dweb.link/ipfs/",
    "https://w3s.link/ipfs/",
];

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_FETCH_ROUNDS: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got `{value}`")]
    InvalidValue {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("invalid gateway URL `{url}`: {reason}")]
    InvalidGateway { url: String, reason: String },

    #[error("{0} is set but {1} is not")]
    IncompleteTls(&'static str, &'static str),
}

/// Settings for the recovery pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryConfig {
    /// Gateway base URLs in declaration order, each ending with `/`.
    pub gateways: Vec<String>,
    pub attempt_timeout: Duration,
    /// Number of full passes over the gateway list (at least 1).
    pub fetch_rounds: u32,
    pub retry_backoff: Duration,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            gateways: DEFAULT_GATEWAYS.iter().map(|g| g.to_string()).collect(),
            attempt_timeout: DEFAULT_GATEWAY_TIMEOUT,
            fetch_rounds: DEFAULT_FETCH_ROUNDS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl RecoveryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_optional)
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let gateways = match lookup(GATEWAYS_ENV) {
            Some(raw) => {
                let gateways = parse_gateways(&raw)?;
                if gateways.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        name: GATEWAYS_ENV,
                        value: raw,
                        expected: "at least one gateway URL",
                    });
                }
                gateways
            }
            None => defaults.gateways,
        };

        let attempt_timeout = match lookup(GATEWAY_TIMEOUT_MS_ENV) {
            Some(raw) => Duration::from_millis(parse_positive(GATEWAY_TIMEOUT_MS_ENV, &raw)?),
            None => defaults.attempt_timeout,
        };

        let fetch_rounds = match lookup(FETCH_ROUNDS_ENV) {
            Some(raw) => {
                let rounds = parse_positive(FETCH_ROUNDS_ENV, &raw)?;
                u32::try_from(rounds).map_err(|_| ConfigError::InvalidValue {
                    name: FETCH_ROUNDS_ENV,
                    value: raw.clone(),
                    expected: "a positive 32-bit integer",
                })?
            }
            None => defaults.fetch_rounds,
        };

        let retry_backoff = match lookup(FETCH_RETRY_BACKOFF_MS_ENV) {
            Some(raw) => Duration::from_millis(raw.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue {
                    name: FETCH_RETRY_BACKOFF_MS_ENV,
                    value: raw.clone(),
                    expected: "a non-negative integer",
                }
            })?),
            None => defaults.retry_backoff,
        };

        Ok(Self {
            gateways,
            attempt_timeout,
            fetch_rounds,
            retry_backoff,
        })
    }
}

/// PEM file locations for the HTTPS listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsPaths>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_optional)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: PORT_ENV,
                value: raw.clone(),
                expected: "a TCP port",
            })?,
            None => DEFAULT_PORT,
        };

        let tls = match (lookup(TLS_CERT_PATH_ENV), lookup(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (Some(_), None) => {
                return Err(ConfigError::IncompleteTls(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV))
            }
            (None, Some(_)) => {
                return Err(ConfigError::IncompleteTls(TLS_KEY_PATH_ENV, TLS_CERT_PATH_ENV))
            }
            (None, None) => None,
        };

        Ok(Self { host, port, tls })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a comma-separated gateway list.
///
/// Entries are trimmed, blank entries skipped, a trailing `/` appended when
/// missing and duplicates dropped (first occurrence wins).
pub fn parse_gateways(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut gateways: Vec<String> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let normalized = normalize_gateway(entry)?;
        if !gateways.contains(&normalized) {
            gateways.push(normalized);
        }
    }
    Ok(gateways)
}

fn normalize_gateway(entry: &str) -> Result<String, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidGateway {
        url: entry.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(entry).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("query strings and fragments are not allowed"));
    }

    let mut normalized = url.to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Ok(normalized)
}

fn parse_positive(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_string(),
            expected: "a positive integer",
        }),
    }
}

/// Read an environment variable, treating blank values as unset.
pub fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
