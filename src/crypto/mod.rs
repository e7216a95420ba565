// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Envelope Cryptography
//!
//! Password-based decryption of report envelopes.
//!
//! ## Parameters
//!
//! The producing side uses WebCrypto with fixed parameters; these must match
//! exactly, since any mismatch is indistinguishable from a wrong password:
//!
//! | Step | Algorithm |
//! |------|-----------|
//! | Key derivation | PBKDF2-HMAC-SHA256, 100 000 iterations, 32-byte key |
//! | Cipher | AES-256-CBC, PKCS#7 padding |
//! | Salt / IV | 16 bytes each, hex-encoded |
//! | Ciphertext | standard base64 |
//!
//! ## Security
//!
//! - Passwords and derived keys are held in zeroizing buffers
//! - Neither is ever logged or included in an error
//! - Wrong password and corrupt ciphertext produce the same error

pub mod decrypt;
pub mod password;

#[cfg(test)]
pub(crate) mod sealing;

pub use decrypt::{decrypt, DecryptError, DecryptedContent, EnvelopeDefect};
pub use password::Password;
