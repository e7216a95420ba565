// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Envelope detection.
//!
//! Classifies fetched text into exactly one of four shapes. Detection is pure:
//! it performs no I/O, never mutates its input and never fails.

use serde_json::{Map, Value};

use super::envelope::{EncryptedEnvelope, EMBEDDED_CIPHERTEXT_FIELD};

/// Result of classifying a report body.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// Not a JSON document (plain text, or a bare JSON scalar).
    NotJson,
    /// A JSON object or array that is not encrypted. Final content as-is.
    PlainJson(Value),
    /// The whole document is an envelope.
    Envelope(EncryptedEnvelope),
    /// An outer report object whose embedded ciphertext field holds a
    /// JSON-encoded envelope.
    NestedEnvelope {
        envelope: EncryptedEnvelope,
        outer: Map<String, Value>,
    },
}

impl Detection {
    /// Short label for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Detection::NotJson => "not_json",
            Detection::PlainJson(_) => "plain_json",
            Detection::Envelope(_) => "envelope",
            Detection::NestedEnvelope { .. } => "nested_envelope",
        }
    }

    /// The identified envelope, if any.
    pub fn envelope(&self) -> Option<&EncryptedEnvelope> {
        match self {
            Detection::Envelope(envelope) | Detection::NestedEnvelope { envelope, .. } => {
                Some(envelope)
            }
            Detection::NotJson | Detection::PlainJson(_) => None,
        }
    }
}

/// Plaintext fields of an outer report, without the embedded ciphertext.
pub fn sidecar_fields(outer: &Map<String, Value>) -> Map<String, Value> {
    outer
        .iter()
        .filter(|(key, _)| key.as_str() != EMBEDDED_CIPHERTEXT_FIELD)
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Classify `text`.
///
/// Only objects and arrays count as JSON documents; a body such as `42` or
/// `"hello"` is reported as [`Detection::NotJson`] and later shown as text.
pub fn detect(text: &str) -> Detection {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => return Detection::NotJson,
    };

    match value {
        Value::Object(outer) => classify_object(outer),
        Value::Array(_) => Detection::PlainJson(value),
        _ => Detection::NotJson,
    }
}

fn classify_object(outer: Map<String, Value>) -> Detection {
    if let Some(envelope) = EncryptedEnvelope::from_map(&outer) {
        return Detection::Envelope(envelope);
    }

    let inner = outer
        .get(EMBEDDED_CIPHERTEXT_FIELD)
        .and_then(Value::as_str)
        .and_then(|encoded| serde_json::from_str::<Value>(encoded).ok())
        .and_then(|inner| EncryptedEnvelope::from_value(&inner));

    match inner {
        Some(envelope) => Detection::NestedEnvelope { envelope, outer },
        None => Detection::PlainJson(Value::Object(outer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope_json() -> Value {
        json!({
            "version": "1.0",
            "encrypted": true,
            "algorithm": "AES-256-CBC",
            "data": "c2VjcmV0",
            "salt": "00112233445566778899aabbccddeeff",
            "iv": "ffeeddccbbaa99887766554433221100",
            "timestamp": "2025-03-14T10:00:00.000Z"
        })
    }

    #[test]
    fn plain_text_is_not_json() {
        assert_eq!(detect("Hola, esto es un reporte."), Detection::NotJson);
        assert_eq!(detect(""), Detection::NotJson);
    }

    #[test]
    fn scalars_are_not_json_documents() {
        assert_eq!(detect("42"), Detection::NotJson);
        assert_eq!(detect("\"hello\""), Detection::NotJson);
        assert_eq!(detect("null"), Detection::NotJson);
    }

    #[test]
    fn plain_object_is_returned_whole() {
        let body = json!({ "tipo": "acoso_escolar", "descripcion": "texto" });
        assert_eq!(detect(&body.to_string()), Detection::PlainJson(body));
    }

    #[test]
    fn arrays_are_plain_json() {
        let body = json!([{ "a": 1 }]);
        assert_eq!(detect(&body.to_string()), Detection::PlainJson(body));
    }

    #[test]
    fn direct_envelope_detected() {
        let detection = detect(&envelope_json().to_string());
        assert_eq!(detection.kind(), "envelope");
        assert_eq!(detection.envelope().map(|e| e.data.as_str()), Some("c2VjcmV0"));
    }

    #[test]
    fn nested_envelope_keeps_outer_object() {
        let outer = json!({
            "tipo": "acoso_escolar",
            "contenido_cifrado": envelope_json().to_string(),
            "fecha": "2025-03-14"
        });

        match detect(&outer.to_string()) {
            Detection::NestedEnvelope { envelope, outer } => {
                assert_eq!(envelope.algorithm, "AES-256-CBC");
                assert_eq!(outer.get("tipo"), Some(&json!("acoso_escolar")));
                let sidecar = sidecar_fields(&outer);
                assert!(sidecar.get(EMBEDDED_CIPHERTEXT_FIELD).is_none());
                assert_eq!(sidecar.len(), 2);
            }
            other => panic!("expected nested envelope, got {other:?}"),
        }
    }

    #[test]
    fn loosely_typed_envelope_metadata_is_still_detected() {
        let mut direct = envelope_json();
        direct["version"] = json!(2);
        direct["timestamp"] = Value::Null;
        let detection = detect(&direct.to_string());
        assert_eq!(detection.kind(), "envelope");
        assert_eq!(detection.envelope().map(|e| e.version.as_str()), Some("2"));

        let outer = json!({
            "tipo": "acoso_escolar",
            "contenido_cifrado": direct.to_string()
        });
        assert_eq!(detect(&outer.to_string()).kind(), "nested_envelope");
    }

    #[test]
    fn embedded_field_with_non_envelope_json_is_plain() {
        let outer = json!({
            "tipo": "otro",
            "contenido_cifrado": "{\"encrypted\": false}"
        });
        assert_eq!(detect(&outer.to_string()).kind(), "plain_json");
    }

    #[test]
    fn embedded_field_with_garbage_is_plain() {
        let outer = json!({ "contenido_cifrado": "{not json" });
        assert_eq!(detect(&outer.to_string()).kind(), "plain_json");
    }

    #[test]
    fn embedded_field_as_object_is_not_unwrapped() {
        let outer = json!({ "contenido_cifrado": envelope_json() });
        assert_eq!(detect(&outer.to_string()).kind(), "plain_json");
    }

    #[test]
    fn detect_is_total_on_odd_inputs() {
        for input in ["{", "}", "[", "\u{feff}{}", "{\"a\":}", "\0", "🙂", "{}"] {
            let _ = detect(input).kind();
        }
        assert_eq!(detect("{}"), Detection::PlainJson(json!({})));
    }
}
