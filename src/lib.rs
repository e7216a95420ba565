// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Report Recovery - Content Recovery Service for Sensitive Reports
//!
//! Reports are stored on a content-addressed network and optionally
//! encrypted with a user password. This crate fetches a report through
//! unreliable public gateways, repairs bodies whose embedded JSON was stored
//! unescaped, detects encrypted envelopes and decrypts them.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `content` - envelope detection and malformed-JSON repair
//! - `crypto` - password-based envelope decryption
//! - `gateway` - gateway fallback and health tracking
//! - `recovery` - the end-to-end recovery pipeline

pub mod api;
pub mod config;
pub mod content;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod models;
pub mod recovery;
pub mod state;
