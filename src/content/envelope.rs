// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encrypted envelope wire type.
//!
//! Envelopes are produced upstream by the report submission flow; this crate
//! only consumes them. The wire shape is:
//!
//! ```text
//! { "version": "1.0", "encrypted": true, "algorithm": "AES-256-CBC",
//!   "data": "<base64>", "salt": "<hex>", "iv": "<hex>",
//!   "timestamp": "<ISO-8601>" }
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

/// Field of an outer report object that carries a JSON-encoded envelope.
pub const EMBEDDED_CIPHERTEXT_FIELD: &str = "contenido_cifrado";

/// An encrypted payload description.
///
/// Only `encrypted`, `algorithm` and `data` decide whether a JSON object is an
/// envelope at all. `salt` and `iv` are validated later, by the decryption
/// step, so a structurally broken envelope surfaces as `MalformedEnvelope`
/// instead of silently being shown as plain JSON. The remaining metadata is
/// informational and read leniently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncryptedEnvelope {
    pub version: String,
    pub encrypted: bool,
    pub algorithm: String,
    /// Base64 ciphertext.
    pub data: String,
    /// Hex-encoded KDF salt.
    pub salt: String,
    /// Hex-encoded CBC initialization vector.
    pub iv: String,
    pub timestamp: String,
}

impl EncryptedEnvelope {
    /// Envelope predicate: `encrypted === true` and non-empty `algorithm` and `data`.
    pub fn is_valid(&self) -> bool {
        self.encrypted && !self.algorithm.trim().is_empty() && !self.data.trim().is_empty()
    }

    /// Interpret an arbitrary JSON value as an envelope.
    ///
    /// Returns `None` for non-objects, objects whose `algorithm` or `data` is
    /// missing or not a string, and objects that fail [`is_valid`](Self::is_valid).
    /// Other fields never disqualify an object: non-strings are stringified
    /// and `null` or absent values read as empty.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().and_then(Self::from_map)
    }

    /// Same as [`from_value`](Self::from_value) for an already-unwrapped object.
    pub fn from_map(object: &Map<String, Value>) -> Option<Self> {
        // Plain reports stop here.
        if object.get("encrypted").and_then(Value::as_bool) != Some(true) {
            return None;
        }
        let envelope = EncryptedEnvelope {
            version: lenient_string(object.get("version")),
            encrypted: true,
            algorithm: object.get("algorithm")?.as_str()?.to_string(),
            data: object.get("data")?.as_str()?.to_string(),
            salt: lenient_string(object.get("salt")),
            iv: lenient_string(object.get("iv")),
            timestamp: lenient_string(object.get("timestamp")),
        };
        envelope.is_valid().then_some(envelope)
    }
}

fn lenient_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
