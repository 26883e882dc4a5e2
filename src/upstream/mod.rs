// ABOUTME: Upstream collaborator interfaces consumed by the relay
// ABOUTME: Defines credential validation, ownership resolution, and event store traits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! Upstream collaborator interfaces
//!
//! The relay never owns identity, ownership, or event data; it consumes four
//! narrow capabilities from the upstream control plane. Each capability is a
//! trait so route handlers and sessions can be exercised against in-memory
//! doubles, with [`client::UpstreamClient`] as the one production
//! implementation of all of them.

/// Production HTTP client for the upstream control plane
pub mod client;

/// Wire DTOs with fail-closed validation
pub mod types;

pub use client::UpstreamClient;

use crate::errors::{AppError, AppResult};
use crate::models::{CapturedRequest, CursorMillis, Endpoint, UserId};
use async_trait::async_trait;
use thiserror::Error;

/// Maps a bearer credential to a user identity; fails closed.
#[async_trait]
pub trait CredentialValidator: Send + Sync {
    /// Validate a bearer credential and return the owning user.
    ///
    /// # Errors
    ///
    /// Returns a 401-class error for any credential the identity store does
    /// not accept, and a 502/503-class error when the store itself fails.
    async fn validate(&self, bearer_token: &str) -> AppResult<UserId>;
}

/// Resolves an endpoint slug to its durable identifier for a given user.
#[async_trait]
pub trait OwnershipResolver: Send + Sync {
    /// Resolve `slug` on behalf of `user_id`. Called exactly once per stream
    /// session, before the event source is attached.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` / `PermissionDenied` per the upstream's
    /// decision, and `UpstreamContract` when a 2xx payload is missing its
    /// required fields.
    async fn resolve(&self, slug: &str, user_id: &UserId) -> AppResult<Endpoint>;
}

/// Errors produced by event store queries.
///
/// These are deliberately separate from [`AppError`]: mid-stream store
/// failures are policy decisions for the event source (swallow, retry,
/// translate to a deleted signal), not HTTP responses.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The endpoint no longer exists upstream
    #[error("endpoint not found upstream")]
    NotFound,
    /// A 2xx response violated the upstream contract
    #[error("upstream contract violation: {0}")]
    Contract(String),
    /// Transport-level failure; retryable
    #[error("upstream request failed: {0}")]
    Transport(String),
}

impl From<StoreError> for AppError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::not_found("Endpoint"),
            StoreError::Contract(msg) => Self::upstream_contract(msg),
            StoreError::Transport(msg) => Self::external_service("event store", msg),
        }
    }
}

/// Point queries against the durable event store.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Return up to `limit` events for `endpoint_id` with
    /// `received_at > after`, oldest first.
    async fn list_requests(
        &self,
        endpoint_id: &str,
        after: CursorMillis,
        limit: usize,
    ) -> Result<Vec<CapturedRequest>, StoreError>;
}

/// One delivery from a watch subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchUpdate {
    /// The full current result set for `(endpoint, after)`, capped at the
    /// requested limit. Deliveries are cumulative, not incremental.
    ResultSet(Vec<CapturedRequest>),
    /// The endpoint was deleted upstream
    Deleted,
}

/// Change subscription against the event store, long-poll style: each call
/// blocks until the result set for `(endpoint, after)` changes (or the hold
/// time elapses), then returns the full current result set.
#[async_trait]
pub trait RequestWatch: Send + Sync {
    /// Wait for the next change to the result set.
    async fn watch(
        &self,
        endpoint_id: &str,
        after: CursorMillis,
        limit: usize,
    ) -> Result<WatchUpdate, StoreError>;
}
