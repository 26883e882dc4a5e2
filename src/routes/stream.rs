// ABOUTME: SSE stream endpoint - authenticates, resolves ownership, and spawns a session
// ABOUTME: Frames flow through a bounded channel from the session task to the response body
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! Stream endpoint
//!
//! `GET /api/stream/{slug}` upgrades a request into a long-lived
//! `text/event-stream` response. Auth and ownership are settled before any
//! stream bytes are written, so failures are ordinary JSON error responses.
//! Once settled, a session task owns the connection until a terminal
//! condition fires; dropping the response body is how client disconnect
//! reaches the session.

use crate::errors::AppResult;
use crate::relay::{StreamSession, Frame};
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::header::{self, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use chrono::Utc;
use futures_util::StreamExt;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;
use uuid::Uuid;

/// `GET /api/stream/{slug}` - open an SSE stream of captured requests.
///
/// # Errors
///
/// Fails before streaming starts: 400 for a malformed slug, 401 for a
/// missing or invalid credential, 403/404 per the ownership store, 5xx when
/// the upstream misbehaves.
pub async fn stream_events(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    auth: Option<TypedHeader<Authorization<Bearer>>>,
) -> AppResult<impl IntoResponse> {
    let endpoint = super::authorize_endpoint(&state, auth.as_ref(), &slug).await?;

    let session_id = Uuid::new_v4();
    // Events captured before the connection opened are the listing route's
    // job; the stream starts at now.
    let start_cursor = Utc::now().timestamp_millis();
    info!(
        session_id = %session_id,
        slug = %endpoint.slug,
        endpoint_id = %endpoint.id,
        source = %state.config.relay.source_mode,
        "stream session starting"
    );

    let (frames, rx) = mpsc::channel::<Frame>(state.config.relay.frame_buffer);
    let session = StreamSession::new(
        endpoint,
        state.source.clone(),
        state.config.relay.clone(),
        start_cursor,
    );
    tokio::spawn(session.run(frames));

    let stream = ReceiverStream::new(rx)
        .map(|frame| Ok::<Event, Infallible>(frame.to_sse_event()));

    Ok((
        [
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-transform"),
            ),
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
        ],
        Sse::new(stream),
    ))
}
