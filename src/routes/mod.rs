// ABOUTME: HTTP route handlers for the relay service
// ABOUTME: Streaming, request listing, and health endpoints share bearer auth helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! HTTP routes
//!
//! Every data route authenticates the same way: validate the bearer
//! credential with the identity store, then resolve the slug to an endpoint
//! the caller owns. Streaming hands the resolved endpoint to a session;
//! listing queries the store directly.

/// Health and readiness probes
pub mod health;

/// Captured-request listing
pub mod requests;

/// SSE stream endpoint
pub mod stream;

use crate::errors::{AppError, AppResult};
use crate::models::{is_valid_slug, Endpoint};
use crate::server::AppState;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;

/// Authenticate the caller and resolve `slug` to an endpoint they own.
///
/// # Errors
///
/// `InvalidInput` for a malformed slug, `AuthRequired` when no credential is
/// present, plus whatever the identity and ownership stores return.
#[tracing::instrument(skip(state, auth), fields(slug = %slug))]
pub(crate) async fn authorize_endpoint(
    state: &AppState,
    auth: Option<&TypedHeader<Authorization<Bearer>>>,
    slug: &str,
) -> AppResult<Endpoint> {
    if !is_valid_slug(slug) {
        return Err(AppError::invalid_input(format!(
            "invalid endpoint slug: {slug}"
        )));
    }
    let token = auth.ok_or_else(AppError::auth_required)?.token();
    let user_id = state.credentials.validate(token).await?;
    state.ownership.resolve(slug, &user_id).await
}
