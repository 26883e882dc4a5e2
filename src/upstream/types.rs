// ABOUTME: Wire DTOs for upstream control-plane responses with fail-closed validation
// ABOUTME: Malformed 2xx payloads become explicit contract errors, never partial data
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! Upstream response payloads
//!
//! Every payload is decoded into an all-optional DTO and then converted
//! through a validation step that fails closed: a success response missing a
//! required field is an upstream contract violation, surfaced as a 502-class
//! error rather than silently defaulted.

use crate::errors::{AppError, AppResult};
use crate::models::{CapturedRequest, Endpoint, UserId};
use crate::upstream::{StoreError, WatchUpdate};
use serde::Deserialize;

/// `GET /me` response from the identity store
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValidateResponse {
    pub user_id: Option<UserId>,
    pub error: Option<String>,
}

impl ValidateResponse {
    /// Validate and extract the user identity.
    pub(crate) fn into_user_id(self) -> AppResult<UserId> {
        if let Some(error) = self.error {
            return Err(AppError::auth_invalid(error));
        }
        self.user_id.ok_or_else(|| {
            AppError::upstream_contract("identity store response is missing userId")
        })
    }
}

/// `GET /endpoints/{slug}` response from the ownership store
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EndpointInfoResponse {
    pub endpoint_id: Option<String>,
    pub error: Option<String>,
}

impl EndpointInfoResponse {
    /// Validate and convert into a resolved [`Endpoint`].
    pub(crate) fn into_endpoint(self, slug: &str) -> AppResult<Endpoint> {
        match self.error.as_deref() {
            Some("not_found") => return Err(AppError::not_found(format!("Endpoint {slug}"))),
            Some("forbidden") => {
                return Err(AppError::forbidden(format!(
                    "endpoint {slug} is owned by another user"
                )))
            }
            Some(other) => {
                return Err(AppError::upstream_contract(format!(
                    "ownership resolver returned unexpected error: {other}"
                )))
            }
            None => {}
        }

        let id = self.endpoint_id.ok_or_else(|| {
            AppError::upstream_contract("ownership resolver response is missing endpointId")
        })?;

        Ok(Endpoint {
            id,
            slug: slug.to_string(),
        })
    }
}

/// `GET /requests` and `GET /requests/watch` response from the event store
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestsResponse {
    pub requests: Option<Vec<CapturedRequest>>,
    #[serde(default)]
    pub deleted: bool,
    pub error: Option<String>,
}

impl RequestsResponse {
    /// Validate a point-query response into an event batch.
    pub(crate) fn into_batch(self) -> Result<Vec<CapturedRequest>, StoreError> {
        match self.validated()? {
            WatchUpdate::Deleted => Err(StoreError::NotFound),
            WatchUpdate::ResultSet(events) => Ok(events),
        }
    }

    /// Validate a watch response into a subscription update.
    pub(crate) fn validated(self) -> Result<WatchUpdate, StoreError> {
        match self.error.as_deref() {
            Some("not_found") => return Ok(WatchUpdate::Deleted),
            Some(other) => {
                return Err(StoreError::Transport(format!(
                    "event store returned error: {other}"
                )))
            }
            None => {}
        }
        if self.deleted {
            return Ok(WatchUpdate::Deleted);
        }
        let events = self.requests.ok_or_else(|| {
            StoreError::Contract("event store response is missing requests".into())
        })?;
        Ok(WatchUpdate::ResultSet(events))
    }
}
