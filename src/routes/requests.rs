// ABOUTME: Captured-request listing endpoint
// ABOUTME: Authenticated point queries against the event store with limit and cursor filters
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! Request listing

use crate::errors::AppResult;
use crate::models::{CapturedRequest, CursorMillis};
use crate::routes::authorize_endpoint;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use serde::Deserialize;
use tracing::debug;

/// Query parameters for `GET /api/requests/{slug}`.
#[derive(Debug, Deserialize)]
pub struct ListRequestsQuery {
    /// Maximum number of events to return; clamped to the relay page cap
    pub limit: Option<usize>,
    /// Only events with `receivedAt` strictly after this epoch-millisecond
    /// cursor
    pub since: Option<CursorMillis>,
    /// Alias for `since`, kept for existing CLI consumers
    #[serde(rename = "afterTimestamp")]
    pub after_timestamp: Option<CursorMillis>,
}

/// `GET /api/requests/{slug}` - list captured requests for an owned endpoint.
pub async fn list_requests(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
    Query(query): Query<ListRequestsQuery>,
) -> AppResult<Json<Vec<CapturedRequest>>> {
    let endpoint = authorize_endpoint(&state, auth.as_ref(), &slug).await?;

    let page_cap = state.config.relay.page_cap;
    let limit = query.limit.unwrap_or(page_cap).min(page_cap);
    let since = query.since.or(query.after_timestamp).unwrap_or(0);

    debug!(slug = %slug, limit, since, "listing captured requests");
    let events = state.store.list_requests(&endpoint.id, since, limit).await?;
    Ok(Json(events))
}
