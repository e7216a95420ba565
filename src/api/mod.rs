// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::Request,
    http::HeaderName,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    error::{ErrorBody, GatewayAttemptView},
    gateway::GatewayEndpoint,
    models::{FixupView, GatewaysResponse, ProvenanceView, RecoverRequest, RecoveryResponse},
    state::AppState,
};

pub mod health;
pub mod reports;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/reports/{hash}/recover", post(reports::recover_report))
        .route("/gateways", get(reports::list_gateways))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    // Paths only: query strings never reach the logs.
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let request_id = request
            .headers()
            .get(&REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id,
        )
    });

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(trace)
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        reports::recover_report,
        reports::list_gateways,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            RecoverRequest,
            RecoveryResponse,
            ProvenanceView,
            FixupView,
            GatewaysResponse,
            GatewayEndpoint,
            ErrorBody,
            GatewayAttemptView,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Reports", description = "Report retrieval, repair and decryption"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
