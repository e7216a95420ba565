// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, process::ExitCode, time::Duration};

use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use report_recovery_server::{
    api::router,
    config::{RecoveryConfig, ServerConfig},
    logging::{init_tracing, LogFormat},
    state::AppState,
};

/// Grace period for in-flight HTTPS connections after shutdown begins.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    let log_format = LogFormat::from_env();
    init_tracing(log_format.as_ref().copied().unwrap_or(LogFormat::Pretty));
    if let Err(e) = log_format {
        error!(error = %e, "Invalid logging configuration");
        return ExitCode::FAILURE;
    }

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        error!("Failed to install rustls crypto provider");
        return ExitCode::FAILURE;
    }

    let server_config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid server configuration");
            return ExitCode::FAILURE;
        }
    };
    let recovery_config = match RecoveryConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid recovery configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        gateways = ?recovery_config.gateways,
        attempt_timeout_ms = recovery_config.attempt_timeout.as_millis() as u64,
        fetch_rounds = recovery_config.fetch_rounds,
        "Recovery pipeline configured"
    );

    let shutdown = CancellationToken::new();
    let state = match AppState::from_config(recovery_config, shutdown.clone()) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to build gateway HTTP client");
            return ExitCode::FAILURE;
        }
    };
    let app = router(state);

    let addr: SocketAddr = match server_config.bind_address().parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!(error = %e, address = %server_config.bind_address(), "Invalid bind address");
            return ExitCode::FAILURE;
        }
    };

    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let served = match server_config.tls {
        Some(tls) => {
            let tls_config = match RustlsConfig::from_pem_file(&tls.cert, &tls.key).await {
                Ok(config) => config,
                Err(e) => {
                    error!(error = %e, cert = %tls.cert.display(), "Failed to load TLS certificate");
                    return ExitCode::FAILURE;
                }
            };

            let handle = axum_server::Handle::new();
            let graceful = handle.clone();
            let token = shutdown.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                graceful.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
            });

            info!(%addr, "Report recovery server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await
        }
        None => {
            let listener = match TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!(error = %e, %addr, "Failed to bind");
                    return ExitCode::FAILURE;
                }
            };

            info!(%addr, "Report recovery server listening on http (docs at /docs)");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown.clone().cancelled_owned())
                .await
        }
    };

    match served {
        Ok(()) => {
            info!("Server stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM.
async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}
