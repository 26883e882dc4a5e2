// ABOUTME: HTTP server assembly - shared state, router, and graceful serve loop
// ABOUTME: Wires the upstream client into the route handlers and session machinery
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! Server assembly
//!
//! [`AppState`] carries the upstream capabilities as trait objects so tests
//! can swap any of them for in-memory doubles. Production wiring builds one
//! [`UpstreamClient`](crate::upstream::UpstreamClient) and shares it across
//! all four roles.

use crate::config::environment::{ServerConfig, SourceMode};
use crate::errors::AppResult;
use crate::relay::{EventSource, PullEventSource, PushEventSource};
use crate::routes;
use crate::upstream::{CredentialValidator, EventStore, OwnershipResolver, UpstreamClient};
use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Identity store
    pub credentials: Arc<dyn CredentialValidator>,
    /// Ownership store
    pub ownership: Arc<dyn OwnershipResolver>,
    /// Event store for point queries
    pub store: Arc<dyn EventStore>,
    /// Event source attached by stream sessions
    pub source: Arc<dyn EventSource>,
}

/// Build production state from configuration.
///
/// # Errors
///
/// Returns an error if the upstream HTTP client cannot be constructed.
pub fn build_state(config: ServerConfig) -> AppResult<AppState> {
    let client = Arc::new(UpstreamClient::new(&config.upstream)?);
    let source: Arc<dyn EventSource> = match config.relay.source_mode {
        SourceMode::Push => Arc::new(PushEventSource::new(client.clone(), &config.relay)),
        SourceMode::Pull => Arc::new(PullEventSource::new(client.clone(), &config.relay)),
    };

    Ok(AppState {
        config: Arc::new(config),
        credentials: client.clone(),
        ownership: client.clone(),
        store: client,
        source,
    })
}

/// Build the HTTP router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/stream/:slug", get(routes::stream::stream_events))
        .route("/api/requests/:slug", get(routes::requests::list_requests))
        .route("/health", get(routes::health::health))
        .route("/ready", get(routes::health::ready))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until shutdown.
///
/// # Errors
///
/// Returns an error if binding fails or the server loop fails.
pub async fn run(config: ServerConfig) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.http_port);
    info!("starting relay server: {}", config.summary());

    let state = build_state(config).context("failed to build server state")?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");
    info!("  GET /api/stream/{{slug}}   - SSE stream of captured requests");
    info!("  GET /api/requests/{{slug}} - one-shot request listing");
    info!("  GET /health, /ready      - monitoring");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => tracing::error!("failed to listen for shutdown signal: {e}"),
    }
}
