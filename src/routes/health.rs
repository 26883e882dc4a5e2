// ABOUTME: Health and readiness probe endpoints
// ABOUTME: Unauthenticated JSON responses for load balancers and orchestrators
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! Health probes

use axum::Json;
use serde_json::{json, Value};

/// `GET /health` - process liveness.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /ready` - readiness to accept streams.
pub async fn ready() -> Json<Value> {
    Json(json!({ "status": "ready" }))
}
