// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UI transport binding (spec §6.1): the Axum router and the shared state
//! it's built over.

pub mod state;
pub mod ws;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::transport::state::AppState;

/// Bind and serve the UI WebSocket router on `config.port`/`config.host`
/// and/or `config.socket`, returning once `state.shutdown` fires.
///
/// Grounded on `crates/cli/src/run.rs`'s TCP-and-Unix-socket dual bind
/// (spawn one server task per configured transport); axum 0.8's `serve`
/// accepts a `tokio::net::UnixListener` directly, so no extra hyper
/// plumbing is needed for the Unix-socket side.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let mut servers = Vec::new();

    if let Some(port) = state.config.port {
        let addr = format!("{}:{}", state.config.host, port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "UI WebSocket listening");
        let router = ws::router(Arc::clone(&state));
        let shutdown = state.shutdown.clone();
        servers.push(tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await
            {
                tracing::error!(%err, "UI HTTP server error");
            }
        }));
    }

    if let Some(ref socket_path) = state.config.socket {
        let _ = std::fs::remove_file(socket_path);
        let listener = tokio::net::UnixListener::bind(socket_path)?;
        tracing::info!(path = %socket_path, "UI WebSocket listening on Unix socket");
        let router = ws::router(Arc::clone(&state));
        let shutdown = state.shutdown.clone();
        servers.push(tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await
            {
                tracing::error!(%err, "UI Unix socket server error");
            }
        }));
    }

    for server in servers {
        let _ = server.await;
    }

    Ok(())
}
