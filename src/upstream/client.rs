// ABOUTME: Production HTTP client for the upstream control plane (identity, ownership, events)
// ABOUTME: Pooled reqwest client with bounded response reads and explicit timeouts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! HTTP implementation of the upstream collaborator traits
//!
//! One pooled client serves all four capabilities. Responses are read with a
//! hard size bound before decoding, and every 2xx payload goes through the
//! fail-closed validation in [`super::types`].

use crate::config::environment::UpstreamConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{CapturedRequest, CursorMillis, Endpoint, UserId};
use crate::upstream::types::{EndpointInfoResponse, RequestsResponse, ValidateResponse};
use crate::upstream::{
    CredentialValidator, EventStore, OwnershipResolver, RequestWatch, StoreError, WatchUpdate,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// HTTP client for the upstream control plane.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Url,
    service_token: Option<String>,
    watch_timeout: Duration,
    max_response_bytes: usize,
}

impl UpstreamClient {
    /// Build a client from upstream configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(100)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| AppError::config("failed to build upstream HTTP client").with_source(e))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            service_token: config.service_token.clone(),
            watch_timeout: config.watch_timeout,
            max_response_bytes: config.max_response_bytes,
        })
    }

    fn url(&self, path: &str) -> AppResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::internal(format!("invalid upstream URL path {path}: {e}")))
    }

    fn service_request(&self, url: Url) -> reqwest::RequestBuilder {
        let mut builder = self.http.get(url);
        if let Some(token) = &self.service_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Read a response body with a hard size bound, then decode it. The
    /// bound is enforced while reading, so an oversized body is rejected
    /// without ever being buffered in full.
    async fn read_json<T: DeserializeOwned>(&self, mut response: reqwest::Response) -> AppResult<T> {
        let oversized = || {
            AppError::upstream_contract(format!(
                "upstream response exceeds {} bytes",
                self.max_response_bytes
            ))
        };

        if let Some(declared) = response.content_length() {
            if declared > self.max_response_bytes as u64 {
                return Err(oversized());
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::external_service("upstream", e.to_string()))?
        {
            if body.len() + chunk.len() > self.max_response_bytes {
                return Err(oversized());
            }
            body.extend_from_slice(&chunk);
        }

        serde_json::from_slice(&body)
            .map_err(|e| AppError::upstream_contract(format!("undecodable upstream payload: {e}")))
    }

    async fn fetch_requests(
        &self,
        path: &str,
        endpoint_id: &str,
        after: CursorMillis,
        limit: usize,
        timeout: Option<Duration>,
    ) -> Result<RequestsResponse, StoreError> {
        let url = self
            .url(path)
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let mut builder = self.service_request(url).query(&[
            ("endpointId", endpoint_id),
            ("after", &after.to_string()),
            ("limit", &limit.to_string()),
        ]);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Err(StoreError::NotFound),
            status if status.is_success() => self.read_json(response).await.map_err(|e| {
                if e.code == crate::errors::ErrorCode::UpstreamContract {
                    StoreError::Contract(e.message)
                } else {
                    StoreError::Transport(e.message)
                }
            }),
            status => Err(StoreError::Transport(format!(
                "event store returned status {status}"
            ))),
        }
    }
}

#[async_trait]
impl CredentialValidator for UpstreamClient {
    async fn validate(&self, bearer_token: &str) -> AppResult<UserId> {
        let url = self.url("me")?;
        let response = self
            .http
            .get(url)
            .bearer_auth(bearer_token)
            .send()
            .await
            .map_err(|e| AppError::unavailable(format!("identity store unreachable: {e}")))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(AppError::auth_invalid("credential rejected by identity store"))
            }
            status if status.is_success() => {
                let payload: ValidateResponse = self.read_json(response).await?;
                payload.into_user_id()
            }
            status => Err(AppError::external_service(
                "identity store",
                format!("unexpected status {status}"),
            )),
        }
    }
}

#[async_trait]
impl OwnershipResolver for UpstreamClient {
    async fn resolve(&self, slug: &str, user_id: &UserId) -> AppResult<Endpoint> {
        let url = self.url(&format!("endpoints/{slug}"))?;
        let response = self
            .service_request(url)
            .query(&[("userId", user_id.as_str())])
            .send()
            .await
            .map_err(|e| AppError::unavailable(format!("ownership store unreachable: {e}")))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(AppError::not_found(format!("Endpoint {slug}"))),
            StatusCode::FORBIDDEN => Err(AppError::forbidden(format!(
                "endpoint {slug} is owned by another user"
            ))),
            status if status.is_success() => {
                let payload: EndpointInfoResponse = self.read_json(response).await?;
                payload.into_endpoint(slug)
            }
            status => Err(AppError::external_service(
                "ownership store",
                format!("unexpected status {status}"),
            )),
        }
    }
}

#[async_trait]
impl EventStore for UpstreamClient {
    async fn list_requests(
        &self,
        endpoint_id: &str,
        after: CursorMillis,
        limit: usize,
    ) -> Result<Vec<CapturedRequest>, StoreError> {
        self.fetch_requests("requests", endpoint_id, after, limit, None)
            .await?
            .into_batch()
    }
}

#[async_trait]
impl RequestWatch for UpstreamClient {
    async fn watch(
        &self,
        endpoint_id: &str,
        after: CursorMillis,
        limit: usize,
    ) -> Result<WatchUpdate, StoreError> {
        self.fetch_requests(
            "requests/watch",
            endpoint_id,
            after,
            limit,
            Some(self.watch_timeout),
        )
        .await?
        .validated()
    }
}
