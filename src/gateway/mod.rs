// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Gateway Retrieval
//!
//! Report bodies live on a content-addressed network and are read through
//! third-party HTTP gateways (`GET <base><hash>`). Gateways are unreliable,
//! so retrieval falls back through a configured list, healthiest first.
//!
//! - `fetcher` - sequential fallback with per-attempt timeout and cancellation
//! - `health` - shared health records with an injectable clock

pub mod fetcher;
pub mod health;

#[cfg(test)]
pub(crate) mod testing;

pub use fetcher::{AttemptFailure, FetchError, GatewayAttemptError, GatewayFetcher, RawContent};
pub use health::{Clock, GatewayEndpoint, GatewayHealthStore, SystemClock};
