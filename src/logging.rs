// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tracing subscriber setup.
//!
//! `RUST_LOG` selects levels (default `info,tower_http=debug`), `LOG_FORMAT`
//! selects `json` or `pretty` output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{env_optional, ConfigError, LOG_FORMAT_ENV};

pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Unset means pretty output. Anything other than `json` or `pretty`
    /// (case-insensitive) is rejected.
    pub fn parse(value: Option<&str>) -> Result<Self, ConfigError> {
        let Some(raw) = value else {
            return Ok(LogFormat::Pretty);
        };
        match raw.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(ConfigError::InvalidValue {
                name: LOG_FORMAT_ENV,
                value: raw.to_string(),
                expected: "`json` or `pretty`",
            }),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::parse(env_optional(LOG_FORMAT_ENV).as_deref())
    }
}

/// Install the global subscriber. A subscriber that is already set is kept.
pub fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(false))
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
