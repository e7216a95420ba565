// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::{Path, State},
    Json,
};

use crate::crypto::Password;
use crate::error::{ErrorBody, RecoveryError};
use crate::models::{GatewaysResponse, RecoverRequest, RecoveryResponse};
use crate::state::AppState;

/// Fetch a report and resolve it to displayable content.
///
/// Encrypted reports answer `needs_password` until a password is supplied.
/// An empty password counts as none.
#[utoipa::path(
    post,
    path = "/v1/reports/{hash}/recover",
    tag = "Reports",
    params(("hash" = String, Path, description = "Content address of the report")),
    request_body = RecoverRequest,
    responses(
        (status = 200, description = "Recovered content", body = RecoveryResponse),
        (status = 400, description = "Invalid content address", body = ErrorBody),
        (status = 401, description = "Incorrect password or corrupted data", body = ErrorBody),
        (status = 422, description = "Malformed envelope", body = ErrorBody),
        (status = 502, description = "No gateway could serve the report", body = ErrorBody),
        (status = 503, description = "Server is shutting down", body = ErrorBody)
    )
)]
pub async fn recover_report(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Json(request): Json<RecoverRequest>,
) -> Result<Json<RecoveryResponse>, RecoveryError> {
    let password = request
        .password
        .filter(|password| !password.is_empty())
        .map(Password::new);

    let cancel = state.shutdown.child_token();
    let recovery = state.recovery.recover(&hash, password, &cancel).await?;
    Ok(Json(RecoveryResponse::from(recovery)))
}

/// Health of every configured gateway.
#[utoipa::path(
    get,
    path = "/v1/gateways",
    tag = "Reports",
    responses(
        (status = 200, description = "Gateway health snapshot", body = GatewaysResponse)
    )
)]
pub async fn list_gateways(State(state): State<AppState>) -> Json<GatewaysResponse> {
    Json(GatewaysResponse {
        gateways: state.recovery.gateway_health(),
    })
}
