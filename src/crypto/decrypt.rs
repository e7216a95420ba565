// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Envelope decryption.
//!
//! Steps run in a fixed order: validate algorithm, decode salt/iv, derive the
//! key, decode the ciphertext, decrypt and unpad, decode UTF-8, then try a
//! best-effort JSON parse. The function is deterministic and keeps no state.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use base64ct::{Base64, Encoding};
use pbkdf2::pbkdf2_hmac;
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use super::password::Password;
use crate::content::EncryptedEnvelope;

/// PBKDF2 iteration count used by the producing side.
pub const PBKDF2_ITERATIONS: u32 = 100_000;
/// AES-256 key length.
pub const KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 16;
pub const IV_LEN: usize = 16;
/// Accepted `algorithm` values (case-insensitive).
pub const SUPPORTED_ALGORITHMS: &[&str] = &["AES-256-CBC", "AES-CBC"];

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Structural problem with an envelope, detected before any decryption.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeDefect {
    #[error("unsupported algorithm `{0}`")]
    UnsupportedAlgorithm(String),

    #[error("`{field}` is not valid hex")]
    InvalidHex { field: &'static str },

    #[error("`{field}` decodes to {actual} bytes, expected {expected}")]
    InvalidLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("`data` is not valid base64")]
    InvalidBase64,
}

impl EnvelopeDefect {
    /// Name of the validation step that failed.
    pub fn step(&self) -> &'static str {
        match self {
            EnvelopeDefect::UnsupportedAlgorithm(_) => "algorithm",
            EnvelopeDefect::InvalidHex { field } | EnvelopeDefect::InvalidLength { field, .. } => {
                *field
            }
            EnvelopeDefect::InvalidBase64 => "data",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecryptError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] EnvelopeDefect),

    /// The only signal a cipher rejection produces. Wrong password and
    /// corrupted ciphertext are deliberately not distinguished.
    #[error("wrong password or corrupt data")]
    WrongPasswordOrCorruptData,
}

/// Decrypted report body.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedContent {
    pub plaintext: String,
    /// Present when `plaintext` parsed as JSON.
    pub parsed: Option<Value>,
}

impl DecryptedContent {
    pub fn parsed_as_json(&self) -> bool {
        self.parsed.is_some()
    }
}

/// Decrypt `envelope` with `password`.
pub fn decrypt(
    envelope: &EncryptedEnvelope,
    password: &Password,
) -> Result<DecryptedContent, DecryptError> {
    check_algorithm(&envelope.algorithm)?;

    let salt: [u8; SALT_LEN] = decode_hex_field("salt", &envelope.salt)?;
    let iv: [u8; IV_LEN] = decode_hex_field("iv", &envelope.iv)?;

    let key = derive_key(password, &salt);

    let ciphertext = Base64::decode_vec(envelope.data.trim())
        .map_err(|_| DecryptError::MalformedEnvelope(EnvelopeDefect::InvalidBase64))?;

    let cipher = Aes256CbcDec::new_from_slices(key.as_slice(), &iv)
        .map_err(|_| DecryptError::WrongPasswordOrCorruptData)?;
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| {
            debug!(step = "unpad", "Envelope decryption rejected");
            DecryptError::WrongPasswordOrCorruptData
        })?;

    let plaintext = String::from_utf8(plaintext).map_err(|e| {
        let mut bytes = e.into_bytes();
        bytes.zeroize();
        debug!(step = "utf8", "Envelope decryption rejected");
        DecryptError::WrongPasswordOrCorruptData
    })?;

    let parsed = serde_json::from_str::<Value>(&plaintext).ok();
    Ok(DecryptedContent { plaintext, parsed })
}

/// PBKDF2-HMAC-SHA256 into a zeroizing 256-bit key.
pub(crate) fn derive_key(password: &Password, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, key.as_mut_slice());
    key
}

fn check_algorithm(algorithm: &str) -> Result<(), EnvelopeDefect> {
    let algorithm = algorithm.trim();
    if SUPPORTED_ALGORITHMS
        .iter()
        .any(|supported| supported.eq_ignore_ascii_case(algorithm))
    {
        Ok(())
    } else {
        Err(EnvelopeDefect::UnsupportedAlgorithm(algorithm.to_string()))
    }
}

fn decode_hex_field<const N: usize>(
    field: &'static str,
    encoded: &str,
) -> Result<[u8; N], EnvelopeDefect> {
    let bytes = hex::decode(encoded.trim()).map_err(|_| EnvelopeDefect::InvalidHex { field })?;
    let actual = bytes.len();
    bytes.try_into().map_err(|_| EnvelopeDefect::InvalidLength {
        field,
        expected: N,
        actual,
    })
}
