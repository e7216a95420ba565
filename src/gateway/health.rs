// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gateway health tracking.
//!
//! Health is the only process-wide mutable state of the recovery pipeline.
//! It is an ordering hint, never a gate: a gateway marked unhealthy is still
//! attempted on later calls, just after the healthy ones.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Time source for health timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Last known state of one gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GatewayEndpoint {
    /// Base URL; the content address is appended verbatim.
    pub base_url: String,
    /// Outcome of the most recent completed attempt (true if never attempted).
    pub healthy: bool,
    /// When the most recent attempt completed.
    pub last_attempt: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl GatewayEndpoint {
    fn untried(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            healthy: true,
            last_attempt: None,
            consecutive_failures: 0,
            last_error: None,
        }
    }
}

/// Shared, lock-guarded gateway health records.
pub struct GatewayHealthStore {
    endpoints: Mutex<HashMap<String, GatewayEndpoint>>,
    clock: Arc<dyn Clock>,
}

impl GatewayHealthStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            endpoints: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Poisoning is ignored; records stay usable after a panicking holder.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, GatewayEndpoint>> {
        self.endpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_healthy(&self, base_url: &str) -> bool {
        self.lock()
            .get(base_url)
            .map(|endpoint| endpoint.healthy)
            .unwrap_or(true)
    }

    /// Attempt order: healthy gateways first, ties kept in declaration order.
    pub fn order(&self, gateways: &[String]) -> Vec<String> {
        let endpoints = self.lock();
        let mut ordered: Vec<(bool, &String)> = gateways
            .iter()
            .map(|base| {
                let healthy = endpoints.get(base).map(|e| e.healthy).unwrap_or(true);
                (healthy, base)
            })
            .collect();
        // Stable sort keeps declaration order within each group.
        ordered.sort_by_key(|(healthy, _)| !healthy);
        ordered.into_iter().map(|(_, base)| base.clone()).collect()
    }

    pub fn record_success(&self, base_url: &str) {
        let now = self.clock.now();
        let mut endpoints = self.lock();
        let endpoint = endpoints
            .entry(base_url.to_string())
            .or_insert_with(|| GatewayEndpoint::untried(base_url));
        endpoint.healthy = true;
        endpoint.last_attempt = Some(now);
        endpoint.consecutive_failures = 0;
        endpoint.last_error = None;
    }

    pub fn record_failure(&self, base_url: &str, error: impl Into<String>) {
        let now = self.clock.now();
        let mut endpoints = self.lock();
        let endpoint = endpoints
            .entry(base_url.to_string())
            .or_insert_with(|| GatewayEndpoint::untried(base_url));
        endpoint.healthy = false;
        endpoint.last_attempt = Some(now);
        endpoint.consecutive_failures = endpoint.consecutive_failures.saturating_add(1);
        endpoint.last_error = Some(error.into());
    }

    /// Records for `gateways`, in the given order. Unknown gateways appear as untried.
    pub fn snapshot(&self, gateways: &[String]) -> Vec<GatewayEndpoint> {
        let endpoints = self.lock();
        gateways
            .iter()
            .map(|base| {
                endpoints
                    .get(base)
                    .cloned()
                    .unwrap_or_else(|| GatewayEndpoint::untried(base))
            })
            .collect()
    }
}

impl Default for GatewayHealthStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Clock frozen at a settable instant.
#[cfg(test)]
pub(crate) struct FixedClock(pub Mutex<DateTime<Utc>>);

#[cfg(test)]
impl FixedClock {
    pub fn at(rfc3339: &str) -> Arc<Self> {
        let instant = DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc);
        Arc::new(Self(Mutex::new(instant)))
    }

    pub fn set(&self, rfc3339: &str) {
        *self.0.lock().unwrap() = DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc);
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}
