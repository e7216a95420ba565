// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::RecoveryConfig;
use crate::gateway::{GatewayFetcher, GatewayHealthStore};
use crate::recovery::RecoveryService;

#[derive(Clone)]
pub struct AppState {
    pub recovery: RecoveryService,
    /// Cancelled on shutdown; each request derives a child token from it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(recovery: RecoveryService, shutdown: CancellationToken) -> Self {
        Self { recovery, shutdown }
    }

    /// Production wiring: fresh health store, default HTTP client.
    pub fn from_config(
        config: RecoveryConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, reqwest::Error> {
        let fetcher = GatewayFetcher::new(Arc::new(GatewayHealthStore::new()))?;
        Ok(Self::new(RecoveryService::new(fetcher, config), shutdown))
    }
}

#[cfg(test)]
impl AppState {
    /// State over `gateways` with a proxy-free client and one fetch round.
    pub(crate) fn for_gateways(gateways: Vec<String>) -> Self {
        use std::time::Duration;

        let fetcher = GatewayFetcher::with_client(
            crate::gateway::testing::local_client(),
            Arc::new(GatewayHealthStore::new()),
        );
        let config = RecoveryConfig {
            gateways,
            attempt_timeout: Duration::from_secs(5),
            fetch_rounds: 1,
            retry_backoff: Duration::ZERO,
        };
        Self::new(RecoveryService::new(fetcher, config), CancellationToken::new())
    }
}
