// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sequential gateway fallback.
//!
//! One pass over the gateway list, one attempt per gateway, one request in
//! flight at a time. The first 2xx response wins. Whether to run another pass
//! is decided by the caller.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::health::GatewayHealthStore;

/// Report body as served by a gateway.
#[derive(Debug, Clone)]
pub struct RawContent {
    pub text: String,
    /// Base URL of the gateway that answered.
    pub gateway: String,
    pub latency: Duration,
}

/// Why a single gateway attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttemptFailure {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("body is not valid UTF-8")]
    InvalidUtf8,
}

/// One failed attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayAttemptError {
    pub gateway: String,
    pub reason: AttemptFailure,
}

impl std::fmt::Display for GatewayAttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.gateway, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Every gateway failed, or none were given.
    #[error("all {} gateway(s) failed", .0.len())]
    FetchFailure(Vec<GatewayAttemptError>),

    #[error("fetch cancelled")]
    Cancelled,
}

/// HTTP retrieval across candidate gateways with health tracking.
#[derive(Clone)]
pub struct GatewayFetcher {
    http: Client,
    health: Arc<GatewayHealthStore>,
}

impl GatewayFetcher {
    pub fn new(health: Arc<GatewayHealthStore>) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("report-recovery/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, health))
    }

    /// Use a preconfigured HTTP client (proxy, TLS roots, user agent).
    pub fn with_client(http: Client, health: Arc<GatewayHealthStore>) -> Self {
        Self { http, health }
    }

    pub fn health(&self) -> &Arc<GatewayHealthStore> {
        &self.health
    }

    /// Fetch `hash` from the first gateway that answers with 2xx.
    ///
    /// Gateways are tried healthy-first. A cancelled attempt is abandoned
    /// without touching that gateway's health.
    pub async fn fetch(
        &self,
        hash: &str,
        gateways: &[String],
        attempt_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RawContent, FetchError> {
        let mut failures = Vec::new();

        for gateway in self.health.order(gateways) {
            let url = format!("{gateway}{hash}");
            let started = Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(gateway = %gateway, "Gateway fetch cancelled");
                    return Err(FetchError::Cancelled);
                }
                outcome = self.attempt(&url, attempt_timeout) => outcome,
            };
            let latency = started.elapsed();

            match outcome {
                Ok(text) => {
                    self.health.record_success(&gateway);
                    info!(
                        gateway = %gateway,
                        latency_ms = latency.as_millis() as u64,
                        bytes = text.len(),
                        "Gateway fetch succeeded"
                    );
                    return Ok(RawContent {
                        text,
                        gateway,
                        latency,
                    });
                }
                Err(reason) => {
                    self.health.record_failure(&gateway, reason.to_string());
                    warn!(
                        gateway = %gateway,
                        latency_ms = latency.as_millis() as u64,
                        error = %reason,
                        "Gateway fetch failed"
                    );
                    failures.push(GatewayAttemptError { gateway, reason });
                }
            }
        }

        debug!(attempts = failures.len(), "All gateways exhausted");
        Err(FetchError::FetchFailure(failures))
    }

    async fn attempt(&self, url: &str, timeout: Duration) -> Result<String, AttemptFailure> {
        let response = self
            .http
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptFailure::Status(status.as_u16()));
        }

        // A gateway serving a mangled body counts as failed; the next one may not.
        let body = response.bytes().await.map_err(classify)?;
        String::from_utf8(body.to_vec()).map_err(|_| AttemptFailure::InvalidUtf8)
    }
}

fn classify(error: reqwest::Error) -> AttemptFailure {
    if error.is_timeout() {
        AttemptFailure::Timeout
    } else {
        AttemptFailure::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::health::FixedClock;
    use crate::gateway::testing::{local_client, refused_gateway, FakeGateway};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn fetcher() -> GatewayFetcher {
        GatewayFetcher::with_client(local_client(), Arc::new(GatewayHealthStore::new()))
    }

    #[tokio::test]
    async fn falls_back_to_next_gateway() {
        let a = FakeGateway::status(500).await;
        let b = FakeGateway::serving("report body").await;
        let fetcher = fetcher();
        let list = vec![a.base_url.clone(), b.base_url.clone()];

        let raw = fetcher
            .fetch("QmHash", &list, TIMEOUT, &CancellationToken::new())
            .await
            .expect("B serves the body");

        assert_eq!(raw.text, "report body");
        assert_eq!(raw.gateway, b.base_url);
        assert!(!fetcher.health().is_healthy(&a.base_url));
        assert!(fetcher.health().is_healthy(&b.base_url));
        assert_eq!(a.hits(), 1);
        assert_eq!(b.hits(), 1);
    }

    #[tokio::test]
    async fn non_utf8_body_fails_the_attempt() {
        let a = FakeGateway::serving_bytes(vec![0xff, 0xfe, b'{', b'}']).await;
        let b = FakeGateway::serving("report body").await;
        let fetcher = fetcher();

        let err = fetcher
            .fetch("QmHash", &[a.base_url.clone()], TIMEOUT, &CancellationToken::new())
            .await
            .unwrap_err();
        let FetchError::FetchFailure(attempts) = err else {
            panic!("expected a fetch failure");
        };
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].reason, AttemptFailure::InvalidUtf8);
        assert!(!fetcher.health().is_healthy(&a.base_url));

        let list = vec![a.base_url.clone(), b.base_url.clone()];
        let raw = fetcher
            .fetch("QmHash", &list, TIMEOUT, &CancellationToken::new())
            .await
            .expect("B serves the body");
        assert_eq!(raw.text, "report body");
        assert_eq!(raw.gateway, b.base_url);
    }

    #[tokio::test]
    async fn first_success_ends_the_pass() {
        let a = FakeGateway::serving("from a").await;
        let b = FakeGateway::serving("from b").await;
        let list = vec![a.base_url.clone(), b.base_url.clone()];

        let raw = fetcher()
            .fetch("QmHash", &list, TIMEOUT, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(raw.text, "from a");
        assert_eq!(b.hits(), 0);
    }

    #[tokio::test]
    async fn requests_base_plus_hash() {
        let a = FakeGateway::serving("ok").await;
        fetcher()
            .fetch("bafyContentAddress", &[a.base_url.clone()], TIMEOUT, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(a.requested(), vec!["bafyContentAddress".to_string()]);
    }

    #[tokio::test]
    async fn empty_gateway_list_is_a_fetch_failure() {
        let err = fetcher()
            .fetch("QmHash", &[], TIMEOUT, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::FetchFailure(Vec::new()));
    }

    #[tokio::test]
    async fn all_failures_are_reported_per_gateway() {
        let a = FakeGateway::status(404).await;
        let b = refused_gateway().await;
        let list = vec![a.base_url.clone(), b.clone()];

        let err = fetcher()
            .fetch("QmHash", &list, TIMEOUT, &CancellationToken::new())
            .await
            .unwrap_err();

        let FetchError::FetchFailure(attempts) = err else {
            panic!("expected fetch failure");
        };
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].gateway, a.base_url);
        assert_eq!(attempts[0].reason, AttemptFailure::Status(404));
        assert_eq!(attempts[1].gateway, b);
        assert!(matches!(attempts[1].reason, AttemptFailure::Network(_)));
    }

    #[tokio::test]
    async fn slow_gateway_times_out_and_is_marked_unhealthy() {
        let slow = FakeGateway::delayed(Duration::from_secs(5), "late").await;
        let fast = FakeGateway::serving("fast").await;
        let fetcher = fetcher();
        let list = vec![slow.base_url.clone(), fast.base_url.clone()];

        let raw = fetcher
            .fetch("QmHash", &list, Duration::from_millis(200), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(raw.text, "fast");
        let snapshot = fetcher.health().snapshot(&list);
        assert!(!snapshot[0].healthy);
        assert_eq!(snapshot[0].last_error.as_deref(), Some("timed out"));
    }

    #[tokio::test]
    async fn unhealthy_gateways_are_tried_last_on_the_next_call() {
        let a = FakeGateway::status(502).await;
        let b = FakeGateway::serving("ok").await;
        let fetcher = fetcher();
        let list = vec![a.base_url.clone(), b.base_url.clone()];
        let cancel = CancellationToken::new();

        fetcher.fetch("h1", &list, TIMEOUT, &cancel).await.unwrap();
        fetcher.fetch("h2", &list, TIMEOUT, &cancel).await.unwrap();

        // Second call went straight to B.
        assert_eq!(a.hits(), 1);
        assert_eq!(b.hits(), 2);
    }

    #[tokio::test]
    async fn cancellation_leaves_health_untouched() {
        let clock = FixedClock::at("2025-03-14T10:00:00Z");
        let store = Arc::new(GatewayHealthStore::with_clock(clock));
        let fetcher = GatewayFetcher::with_client(local_client(), store.clone());
        let slow = FakeGateway::delayed(Duration::from_secs(10), "late").await;
        let list = vec![slow.base_url.clone()];

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = fetcher.fetch("QmHash", &list, TIMEOUT, &cancel).await.unwrap_err();
        assert_eq!(err, FetchError::Cancelled);

        let endpoint = &store.snapshot(&list)[0];
        assert!(endpoint.healthy);
        assert_eq!(endpoint.last_attempt, None);
        assert_eq!(endpoint.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn already_cancelled_token_attempts_nothing() {
        let a = FakeGateway::serving("ok").await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetcher()
            .fetch("QmHash", &[a.base_url.clone()], TIMEOUT, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Cancelled);
        assert_eq!(a.hits(), 0);
    }
}
