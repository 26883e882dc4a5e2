// ABOUTME: SSE wire frames emitted to stream clients
// ABOUTME: Named events carry JSON payloads; keepalives are comment-only frames
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! Wire frames
//!
//! Five frame kinds cross the wire. `connected` opens every stream,
//! `request` carries one captured webhook request, `endpoint_deleted` and
//! `timeout` announce terminal conditions, and keepalives are bare SSE
//! comments that never reach event-aware clients as data.

use crate::models::CapturedRequest;
use axum::response::sse::Event;
use serde::Serialize;
use tracing::error;

/// One frame on a stream connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// First frame of every stream; confirms the resolved endpoint
    Connected {
        /// Public slug the client subscribed to
        slug: String,
        /// Durable endpoint identifier
        endpoint_id: String,
    },
    /// One captured webhook request
    Request(Box<CapturedRequest>),
    /// The endpoint was deleted upstream; the stream ends after this frame
    EndpointDeleted {
        /// Public slug the client subscribed to
        slug: String,
    },
    /// The maximum stream duration elapsed; the stream ends after this frame
    Timeout,
    /// Liveness comment; carries no data
    Keepalive,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectedPayload<'a> {
    slug: &'a str,
    endpoint_id: &'a str,
}

#[derive(Serialize)]
struct SlugPayload<'a> {
    slug: &'a str,
}

#[derive(Serialize)]
struct TimeoutPayload {
    reason: &'static str,
}

/// Serialize a payload, falling back to an empty object. The payload types
/// here cannot fail to serialize; the fallback keeps the stream alive if
/// that ever stops being true.
fn payload_json<T: Serialize>(payload: &T) -> String {
    serde_json::to_string(payload).unwrap_or_else(|e| {
        error!("failed to serialize SSE payload: {e}");
        "{}".to_string()
    })
}

impl Frame {
    /// Convert into an axum SSE event.
    #[must_use]
    pub fn to_sse_event(&self) -> Event {
        match self {
            Self::Connected { slug, endpoint_id } => Event::default()
                .event("connected")
                .data(payload_json(&ConnectedPayload { slug, endpoint_id })),
            Self::Request(request) => Event::default()
                .event("request")
                .data(payload_json(request)),
            Self::EndpointDeleted { slug } => Event::default()
                .event("endpoint_deleted")
                .data(payload_json(&SlugPayload { slug })),
            Self::Timeout => Event::default().event("timeout").data(payload_json(
                &TimeoutPayload {
                    reason: "max_duration",
                },
            )),
            Self::Keepalive => Event::default().comment("keepalive"),
        }
    }

    /// Encode to the raw wire representation.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Connected { slug, endpoint_id } => format!(
                "event: connected\ndata: {}\n\n",
                payload_json(&ConnectedPayload { slug, endpoint_id })
            ),
            Self::Request(request) => {
                format!("event: request\ndata: {}\n\n", payload_json(request))
            }
            Self::EndpointDeleted { slug } => format!(
                "event: endpoint_deleted\ndata: {}\n\n",
                payload_json(&SlugPayload { slug })
            ),
            Self::Timeout => format!(
                "event: timeout\ndata: {}\n\n",
                payload_json(&TimeoutPayload {
                    reason: "max_duration",
                })
            ),
            Self::Keepalive => ": keepalive\n\n".to_string(),
        }
    }
}
