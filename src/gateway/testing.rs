// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local fake gateways for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;

enum Behavior {
    Serve(String),
    /// Raw bytes, not necessarily UTF-8.
    Bytes(Vec<u8>),
    Status(u16),
    Delayed(Duration, String),
    /// 503 for the first `n` hits, then the body.
    Flaky(usize, String),
}

struct FakeState {
    behavior: Behavior,
    hits: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

/// An axum server on an ephemeral port that answers `GET /ipfs/{hash}`.
pub struct FakeGateway {
    pub base_url: String,
    state: Arc<FakeState>,
}

impl FakeGateway {
    pub async fn serving(body: impl Into<String>) -> Self {
        Self::spawn(Behavior::Serve(body.into())).await
    }

    pub async fn serving_bytes(body: Vec<u8>) -> Self {
        Self::spawn(Behavior::Bytes(body)).await
    }

    pub async fn status(code: u16) -> Self {
        Self::spawn(Behavior::Status(code)).await
    }

    pub async fn delayed(delay: Duration, body: impl Into<String>) -> Self {
        Self::spawn(Behavior::Delayed(delay, body.into())).await
    }

    pub async fn flaky(failures: usize, body: impl Into<String>) -> Self {
        Self::spawn(Behavior::Flaky(failures, body.into())).await
    }

    async fn spawn(behavior: Behavior) -> Self {
        let state = Arc::new(FakeState {
            behavior,
            hits: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/ipfs/{hash}", get(serve))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{addr}/ipfs/"),
            state,
        }
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn requested(&self) -> Vec<String> {
        self.state.requested.lock().unwrap().clone()
    }
}

async fn serve(State(state): State<Arc<FakeState>>, Path(hash): Path<String>) -> Response {
    let hit = state.hits.fetch_add(1, Ordering::SeqCst) + 1;
    state.requested.lock().unwrap().push(hash);
    match &state.behavior {
        Behavior::Serve(body) => body.clone().into_response(),
        Behavior::Bytes(body) => body.clone().into_response(),
        Behavior::Status(code) => StatusCode::from_u16(*code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        Behavior::Delayed(delay, body) => {
            tokio::time::sleep(*delay).await;
            body.clone().into_response()
        }
        Behavior::Flaky(failures, _) if hit <= *failures => {
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
        Behavior::Flaky(_, body) => body.clone().into_response(),
    }
}

/// HTTP client that ignores proxy settings from the environment.
pub fn local_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Base URL of a port nothing listens on.
pub async fn refused_gateway() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/ipfs/")
}
