// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All types derive
//! `ToSchema` for OpenAPI documentation.
//!
//! ## Recovery Results
//!
//! [`RecoveryResponse`] is tagged by `status`:
//!
//! | `status` | Meaning |
//! |----------|---------|
//! | `plain_text` | Body was not JSON (or could not be repaired) |
//! | `plain_json` | Unencrypted JSON document |
//! | `needs_password` | Encrypted; resubmit with a password |
//! | `decrypted` | Decrypted content |
//!
//! Every variant carries [`ProvenanceView`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::content::Fixup;
use crate::gateway::GatewayEndpoint;
use crate::recovery::{Provenance, RecoveredContent, Recovery};

// =============================================================================
// Requests
// =============================================================================

/// Body of `POST /v1/reports/{hash}/recover`.
///
/// Intentionally not `Debug`: the password must never reach a log line.
#[derive(Default, Deserialize, ToSchema)]
pub struct RecoverRequest {
    /// Password for encrypted reports. Omit to learn whether one is needed.
    #[serde(default)]
    pub password: Option<String>,
}

// =============================================================================
// Responses
// =============================================================================

/// An embedded field that was re-escaped during repair.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct FixupView {
    pub field: String,
    /// 1-based line of the opening marker.
    pub open_line: usize,
    /// 1-based line of the closing marker.
    pub close_line: usize,
}

impl From<Fixup> for FixupView {
    fn from(fixup: Fixup) -> Self {
        Self {
            field: fixup.field,
            open_line: fixup.open_line,
            close_line: fixup.close_line,
        }
    }
}

/// Where the content came from and what was done to it.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct ProvenanceView {
    /// Gateway base URL that served the body.
    pub gateway: String,
    pub latency_ms: u64,
    /// Whether malformed embedded JSON was repaired.
    pub repaired: bool,
    pub fixups: Vec<FixupView>,
    /// Fetch round that succeeded (1-based).
    pub rounds: u32,
}

impl From<Provenance> for ProvenanceView {
    fn from(provenance: Provenance) -> Self {
        Self {
            gateway: provenance.gateway,
            latency_ms: u64::try_from(provenance.latency.as_millis()).unwrap_or(u64::MAX),
            repaired: provenance.repaired,
            fixups: provenance.fixups.into_iter().map(FixupView::from).collect(),
            rounds: provenance.rounds,
        }
    }
}

/// Result of a recovery.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecoveryResponse {
    PlainText {
        text: String,
        provenance: ProvenanceView,
    },
    PlainJson {
        #[schema(value_type = Object)]
        document: Value,
        provenance: ProvenanceView,
    },
    NeedsPassword {
        algorithm: String,
        timestamp: String,
        version: String,
        /// True when the envelope is embedded in an outer report.
        nested: bool,
        /// Plaintext fields of the outer report (nested envelopes only).
        #[serde(skip_serializing_if = "Option::is_none")]
        #[schema(value_type = Option<Object>)]
        sidecar: Option<Map<String, Value>>,
        provenance: ProvenanceView,
    },
    Decrypted {
        /// Decrypted document, or a string when the plaintext is not JSON.
        #[schema(value_type = Object)]
        content: Value,
        parsed_as_json: bool,
        provenance: ProvenanceView,
    },
}

impl From<Recovery> for RecoveryResponse {
    fn from(recovery: Recovery) -> Self {
        let provenance = ProvenanceView::from(recovery.provenance);
        match recovery.content {
            RecoveredContent::PlainText(text) => RecoveryResponse::PlainText { text, provenance },
            RecoveredContent::PlainJson(document) => RecoveryResponse::PlainJson {
                document,
                provenance,
            },
            RecoveredContent::NeedsPassword(prompt) => RecoveryResponse::NeedsPassword {
                algorithm: prompt.algorithm,
                timestamp: prompt.timestamp,
                version: prompt.version,
                nested: prompt.nested,
                sidecar: prompt.sidecar,
                provenance,
            },
            RecoveredContent::Decrypted {
                content,
                parsed_as_json,
            } => RecoveryResponse::Decrypted {
                content,
                parsed_as_json,
                provenance,
            },
        }
    }
}

/// Health of the configured gateways, in configuration order.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GatewaysResponse {
    pub gateways: Vec<GatewayEndpoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::PasswordPrompt;
    use serde_json::json;
    use std::time::Duration;

    fn provenance() -> Provenance {
        Provenance {
            gateway: "https://ipfs.io/ipfs/".to_string(),
            latency: Duration::from_millis(42),
            repaired: true,
            fixups: vec![Fixup {
                field: "contenido_cifrado".to_string(),
                open_line: 3,
                close_line: 11,
            }],
            rounds: 1,
        }
    }

    #[test]
    fn needs_password_serializes_with_status_tag() {
        let mut sidecar = Map::new();
        sidecar.insert("tipo".to_string(), json!("acoso_escolar"));
        let response = RecoveryResponse::from(Recovery {
            content: RecoveredContent::NeedsPassword(PasswordPrompt {
                algorithm: "AES-256-CBC".to_string(),
                timestamp: "2025-03-14T10:00:00.000Z".to_string(),
                version: "1.0".to_string(),
                nested: true,
                sidecar: Some(sidecar),
            }),
            provenance: provenance(),
        });

        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({
                "status": "needs_password",
                "algorithm": "AES-256-CBC",
                "timestamp": "2025-03-14T10:00:00.000Z",
                "version": "1.0",
                "nested": true,
                "sidecar": {"tipo": "acoso_escolar"},
                "provenance": {
                    "gateway": "https://ipfs.io/ipfs/",
                    "latency_ms": 42,
                    "repaired": true,
                    "fixups": [{"field": "contenido_cifrado", "open_line": 3, "close_line": 11}],
                    "rounds": 1
                }
            })
        );
    }

    #[test]
    fn plain_text_and_decrypted_tags() {
        let text = RecoveryResponse::from(Recovery {
            content: RecoveredContent::PlainText("hola".to_string()),
            provenance: provenance(),
        });
        let value = serde_json::to_value(&text).unwrap();
        assert_eq!(value["status"], "plain_text");
        assert_eq!(value["text"], "hola");

        let decrypted = RecoveryResponse::from(Recovery {
            content: RecoveredContent::Decrypted {
                content: json!({"tipo": "x"}),
                parsed_as_json: true,
            },
            provenance: provenance(),
        });
        let value = serde_json::to_value(&decrypted).unwrap();
        assert_eq!(value["status"], "decrypted");
        assert_eq!(value["content"], json!({"tipo": "x"}));
        assert_eq!(value["parsed_as_json"], true);
    }

    #[test]
    fn request_password_is_optional() {
        let empty: RecoverRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.password.is_none());

        let null: RecoverRequest = serde_json::from_str(r#"{"password":null}"#).unwrap();
        assert!(null.password.is_none());

        let set: RecoverRequest = serde_json::from_str(r#"{"password":"clave"}"#).unwrap();
        assert_eq!(set.password.as_deref(), Some("clave"));
    }
}
