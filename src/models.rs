// ABOUTME: Core domain types shared across the relay, upstream client, and routes
// ABOUTME: Defines captured request events, endpoints, and slug validation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! Common data structures for the relay
//!
//! The wire shape of [`CapturedRequest`] matches the upstream event store's
//! JSON exactly (`_id`, camelCase fields, epoch-millisecond timestamps) so
//! existing stream consumers interoperate without translation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque identity of an authenticated user, as issued by the upstream
/// identity store.
pub type UserId = String;

/// Epoch-millisecond receipt timestamp; the session cursor is expressed in
/// the same unit.
pub type CursorMillis = i64;

/// A captured webhook request, produced by the upstream event store.
///
/// The relay never interprets the transport fields; it only orders events by
/// `received_at` and deduplicates by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedRequest {
    /// Unique event identifier
    #[serde(rename = "_id")]
    pub id: String,
    /// Durable identifier of the endpoint that captured this request
    pub endpoint_id: String,
    /// HTTP method of the captured request
    pub method: String,
    /// Request path below the endpoint root
    pub path: String,
    /// Captured request headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Captured body, absent for empty bodies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Captured query parameters
    #[serde(default)]
    pub query_params: HashMap<String, String>,
    /// Content type, when the sender provided one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Sender IP address
    #[serde(default)]
    pub ip: String,
    /// Body size in bytes
    #[serde(default)]
    pub size: u64,
    /// Receipt timestamp in epoch milliseconds
    pub received_at: CursorMillis,
}

/// A webhook endpoint, resolved once per stream session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Durable endpoint identifier
    #[serde(rename = "_id")]
    pub id: String,
    /// Human-facing slug used in capture and stream URLs
    pub slug: String,
}

/// Maximum accepted slug length
pub const MAX_SLUG_LEN: usize = 64;

/// Validate that a slug contains only safe URL/path characters.
///
/// Slugs are restricted to 1-64 characters of `[A-Za-z0-9_-]`; anything else
/// is rejected before any upstream call is made.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    if slug.is_empty() || slug.len() > MAX_SLUG_LEN {
        return false;
    }
    slug.bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
