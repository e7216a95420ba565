// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Report Content Handling
//!
//! Pure, synchronous processing of fetched report bodies:
//!
//! - `envelope` - encrypted envelope wire type and validity predicate
//! - `detect` - plain text / plain JSON / envelope / nested envelope
//! - `repair` - normalizer for unescaped embedded envelopes

pub mod detect;
pub mod envelope;
pub mod repair;

pub use detect::{detect, sidecar_fields, Detection};
pub use envelope::{EncryptedEnvelope, EMBEDDED_CIPHERTEXT_FIELD};
pub use repair::{repair, Fixup, RepairFailure, RepairResult, RepairStatus};
