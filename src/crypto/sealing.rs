// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Test-only envelope producer and fixtures.

use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};

use super::decrypt::{derive_key, IV_LEN, SALT_LEN};
use super::password::Password;
use crate::content::EncryptedEnvelope;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

pub const FIXTURE_PASSWORD: &str = "clave-secreta-2025";
pub const FIXTURE_PLAINTEXT: &str = r#"{"tipo":"acoso_escolar","descripcion":"Un companero me molesta en el recreo.","fecha":"2025-03-14"}"#;
const FIXTURE_SALT: &str = "8f3b1c2d4e5f60718293a4b5c6d7e8f9";
const FIXTURE_IV: &str = "0a1b2c3d4e5f60718293a4b5c6d7e8f9";
/// FIXTURE_PLAINTEXT under FIXTURE_PASSWORD, produced by an independent
/// PBKDF2-SHA256 / AES-256-CBC implementation.
const FIXTURE_DATA: &str = "zUrbdzhBv8IJJTZtJOrF/XErSilSh6gvTM7BJmVcQWFJIJpN/MhokyouLUH47dhIHMZZ5C0cNmGMHCB6ERvY97PMl+gMwZ9CQpi5cASfcMKWFdIioPYED9FeCJlqVy61zbAobKh7L/FsqI9ydAuQrw==";
const FIXTURE_TIMESTAMP: &str = "2025-03-14T10:00:00.000Z";

/// Known-answer envelope.
pub fn fixture_envelope() -> EncryptedEnvelope {
    EncryptedEnvelope {
        version: "1.0".to_string(),
        encrypted: true,
        algorithm: "AES-256-CBC".to_string(),
        data: FIXTURE_DATA.to_string(),
        salt: FIXTURE_SALT.to_string(),
        iv: FIXTURE_IV.to_string(),
        timestamp: FIXTURE_TIMESTAMP.to_string(),
    }
}

/// The fixture envelope JSON-encoded inside an outer report, as uploaded.
pub fn fixture_nested_report() -> Value {
    let envelope = serde_json::to_string_pretty(&fixture_envelope()).unwrap();
    json!({
        "tipo": "acoso_escolar",
        "contenido_cifrado": envelope,
        "fecha": "2025-03-14"
    })
}

/// The nested report as malformed uploads stored it: the envelope pasted
/// unescaped across several lines.
pub fn fixture_malformed_report() -> String {
    let envelope = serde_json::to_string_pretty(&fixture_envelope()).unwrap();
    let inner = envelope.strip_prefix('{').unwrap();
    let inner = inner.strip_suffix('}').unwrap();
    format!(
        "{{\n  \"tipo\": \"acoso_escolar\",\n  \"contenido_cifrado\": \"{{{inner}}}\",\n  \"fecha\": \"2025-03-14\"\n}}"
    )
}

/// The malformed report with the outer object and the envelope opened on
/// a single line, as some uploads stored it.
pub fn fixture_inline_malformed_report() -> String {
    let envelope = serde_json::to_string_pretty(&fixture_envelope()).unwrap();
    let inner = envelope.strip_prefix('{').unwrap();
    let inner = inner.strip_suffix('}').unwrap();
    format!("{{\"tipo\":\"acoso_escolar\",\"contenido_cifrado\":\"{{{inner}}}\",\n\"fecha\":\"2025-03-14\"}}")
}

/// Encrypt `plaintext` the way the upload flow does.
pub fn seal(
    plaintext: &str,
    password: &str,
    salt: [u8; SALT_LEN],
    iv: [u8; IV_LEN],
) -> EncryptedEnvelope {
    let key = derive_key(&Password::from(password), &salt);
    let ciphertext = Aes256CbcEnc::new_from_slices(key.as_slice(), &iv)
        .unwrap()
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    EncryptedEnvelope {
        version: "1.0".to_string(),
        encrypted: true,
        algorithm: "AES-256-CBC".to_string(),
        data: BASE64.encode(ciphertext),
        salt: hex::encode(salt),
        iv: hex::encode(iv),
        timestamp: FIXTURE_TIMESTAMP.to_string(),
    }
}
