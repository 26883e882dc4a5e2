// ABOUTME: Shared test fixtures - in-memory upstream doubles and scripted event sources
// ABOUTME: Used by the session and route integration tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

#![allow(dead_code)]

use async_trait::async_trait;
use hookrelay::config::environment::{RelayConfig, ServerConfig, UpstreamConfig};
use hookrelay::errors::{AppError, AppResult};
use hookrelay::models::{CapturedRequest, CursorMillis, Endpoint, UserId};
use hookrelay::relay::source::{DetachHandle, EventSource, SourceEvent, Subscription};
use hookrelay::upstream::{CredentialValidator, EventStore, OwnershipResolver, StoreError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

static INIT_LOGGER: Once = Once::new();

/// Initialize test logging once per test binary.
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("hookrelay=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Build a captured request with fixed transport fields.
pub fn sample_request(id: &str, received_at: CursorMillis) -> CapturedRequest {
    CapturedRequest {
        id: id.to_string(),
        endpoint_id: "ep_1".into(),
        method: "POST".into(),
        path: "/hook".into(),
        headers: std::collections::HashMap::new(),
        body: Some("{}".into()),
        query_params: std::collections::HashMap::new(),
        content_type: Some("application/json".into()),
        ip: "203.0.113.9".into(),
        size: 2,
        received_at,
    }
}

/// The endpoint all fixtures agree on.
pub fn sample_endpoint() -> Endpoint {
    Endpoint {
        id: "ep_1".into(),
        slug: "demo".into(),
    }
}

/// Relay constants tuned for fast tests.
pub fn fast_relay_config() -> RelayConfig {
    RelayConfig {
        keepalive_interval: Duration::from_millis(10),
        poll_interval: Duration::from_millis(5),
        max_stream_duration: Duration::from_millis(50),
        page_cap: 5,
        source_error_limit: 3,
        source_retry_backoff: Duration::from_millis(1),
        ..RelayConfig::default()
    }
}

/// Full server configuration around a relay config.
pub fn test_server_config(relay: RelayConfig) -> ServerConfig {
    ServerConfig {
        http_port: 0,
        host: "127.0.0.1".into(),
        upstream: UpstreamConfig {
            base_url: Url::parse("http://localhost:3210/").expect("static URL"),
            service_token: None,
            request_timeout: Duration::from_secs(1),
            watch_timeout: Duration::from_secs(1),
            max_response_bytes: 1024 * 1024,
        },
        relay,
    }
}

/// Event source replaying one script per attach.
///
/// Records every attach cursor and hands out detach handles so tests can
/// assert on re-attach behavior and teardown.
pub struct ScriptedSource {
    scripts: Mutex<VecDeque<Vec<SourceEvent>>>,
    /// Cursor passed to each attach, in order
    pub attach_cursors: Mutex<Vec<CursorMillis>>,
    /// Detach handle of each subscription, in order
    pub handles: Mutex<Vec<DetachHandle>>,
    /// Keep the channel open after the script is exhausted
    pub hold_open: bool,
    page_cap: Option<usize>,
}

impl ScriptedSource {
    pub fn new(scripts: Vec<Vec<SourceEvent>>, hold_open: bool) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            attach_cursors: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            hold_open,
            page_cap: None,
        })
    }

    pub fn with_page_cap(
        scripts: Vec<Vec<SourceEvent>>,
        hold_open: bool,
        page_cap: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            attach_cursors: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            hold_open,
            page_cap: Some(page_cap),
        })
    }

    pub fn attach_count(&self) -> usize {
        self.attach_cursors.lock().unwrap().len()
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn attach(
        &self,
        _endpoint: &Endpoint,
        after_cursor: CursorMillis,
    ) -> AppResult<Subscription> {
        self.attach_cursors.lock().unwrap().push(after_cursor);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        let hold_open = self.hold_open;

        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(async move {
            for event in script {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            if hold_open {
                std::future::pending::<()>().await;
            }
        });

        let detach = DetachHandle::for_task(&task);
        self.handles.lock().unwrap().push(detach.clone());
        Ok(Subscription::new(rx, detach))
    }

    fn page_cap(&self) -> Option<usize> {
        self.page_cap
    }
}

/// Identity store accepting exactly one token.
pub struct StaticValidator {
    pub token: String,
    pub user: UserId,
}

#[async_trait]
impl CredentialValidator for StaticValidator {
    async fn validate(&self, bearer_token: &str) -> AppResult<UserId> {
        if bearer_token == self.token {
            Ok(self.user.clone())
        } else {
            Err(AppError::auth_invalid("unknown credential"))
        }
    }
}

/// Ownership store knowing exactly one endpoint.
pub struct StaticResolver {
    pub endpoint: Endpoint,
}

#[async_trait]
impl OwnershipResolver for StaticResolver {
    async fn resolve(&self, slug: &str, _user_id: &UserId) -> AppResult<Endpoint> {
        if slug == self.endpoint.slug {
            Ok(self.endpoint.clone())
        } else {
            Err(AppError::not_found(format!("Endpoint {slug}")))
        }
    }
}

/// Event store over a fixed in-memory set.
pub struct MemoryStore {
    pub events: Vec<CapturedRequest>,
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn list_requests(
        &self,
        endpoint_id: &str,
        after: CursorMillis,
        limit: usize,
    ) -> Result<Vec<CapturedRequest>, StoreError> {
        let mut matching: Vec<_> = self
            .events
            .iter()
            .filter(|e| e.endpoint_id == endpoint_id && e.received_at > after)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.received_at);
        matching.truncate(limit);
        Ok(matching)
    }
}
