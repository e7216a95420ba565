// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recovery error taxonomy and its HTTP mapping.
//!
//! | Error | Status | `error_code` |
//! |-------|--------|--------------|
//! | invalid content address | 400 | `invalid_content_address` |
//! | every gateway failed | 502 | `fetch_failure` |
//! | envelope fails validation | 422 | `malformed_envelope` |
//! | cipher rejected the password | 401 | `wrong_password_or_corrupt_data` |
//! | request abandoned on shutdown | 503 | `cancelled` |
//! | impossible state reached | 500 | `internal_invariant_violation` |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::crypto::{DecryptError, EnvelopeDefect};
use crate::gateway::{FetchError, GatewayAttemptError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecoveryError {
    /// The content address is empty, too long or not alphanumeric.
    #[error("invalid content address: {0}")]
    InvalidContentAddress(&'static str),

    /// Every gateway failed in every round.
    #[error("content could not be fetched from any gateway ({} attempt(s) in the last round)", .0.len())]
    FetchFailure(Vec<GatewayAttemptError>),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(EnvelopeDefect),

    #[error("incorrect password or corrupted data")]
    WrongPasswordOrCorruptData,

    #[error("recovery was cancelled")]
    Cancelled,

    #[error("internal invariant violated: {0}")]
    InternalInvariantViolation(String),
}

/// One failed gateway attempt as reported to API clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GatewayAttemptView {
    pub gateway: String,
    pub error: String,
}

/// JSON error body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// Stable machine-readable code.
    pub error_code: String,
    /// Per-gateway failures, present for `fetch_failure`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<GatewayAttemptView>,
}

impl RecoveryError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            RecoveryError::InvalidContentAddress(_) => "invalid_content_address",
            RecoveryError::FetchFailure(_) => "fetch_failure",
            RecoveryError::MalformedEnvelope(_) => "malformed_envelope",
            RecoveryError::WrongPasswordOrCorruptData => "wrong_password_or_corrupt_data",
            RecoveryError::Cancelled => "cancelled",
            RecoveryError::InternalInvariantViolation(_) => "internal_invariant_violation",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RecoveryError::InvalidContentAddress(_) => StatusCode::BAD_REQUEST,
            RecoveryError::FetchFailure(_) => StatusCode::BAD_GATEWAY,
            RecoveryError::MalformedEnvelope(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RecoveryError::WrongPasswordOrCorruptData => StatusCode::UNAUTHORIZED,
            RecoveryError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            RecoveryError::InternalInvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether asking the user again (or retrying later) can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RecoveryError::FetchFailure(_)
                | RecoveryError::WrongPasswordOrCorruptData
                | RecoveryError::Cancelled
        )
    }
}

impl From<DecryptError> for RecoveryError {
    fn from(error: DecryptError) -> Self {
        match error {
            DecryptError::MalformedEnvelope(defect) => RecoveryError::MalformedEnvelope(defect),
            DecryptError::WrongPasswordOrCorruptData => RecoveryError::WrongPasswordOrCorruptData,
        }
    }
}

impl From<FetchError> for RecoveryError {
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::FetchFailure(attempts) => RecoveryError::FetchFailure(attempts),
            FetchError::Cancelled => RecoveryError::Cancelled,
        }
    }
}

impl IntoResponse for RecoveryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let attempts = match &self {
            RecoveryError::FetchFailure(attempts) => attempts
                .iter()
                .map(|attempt| GatewayAttemptView {
                    gateway: attempt.gateway.clone(),
                    error: attempt.reason.to_string(),
                })
                .collect(),
            _ => Vec::new(),
        };
        let body = Json(ErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
            attempts,
        });
        (status, body).into_response()
    }
}
