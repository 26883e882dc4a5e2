// ABOUTME: Event source variants feeding stream sessions - push (watch) and pull (poll)
// ABOUTME: Each attach spawns a forwarding task; detaching is idempotent and aborts it
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! Event sources
//!
//! An [`EventSource`] turns the upstream store into a stream of
//! [`SourceEvent`]s for one session. The push variant holds a long-poll
//! watch open and forwards cumulative result sets; the pull variant queries
//! on a fixed interval and forwards only new events, swallowing transient
//! store errors. Both report endpoint deletion and then stop.

use crate::config::environment::RelayConfig;
use crate::errors::AppResult;
use crate::models::{CapturedRequest, CursorMillis, Endpoint};
use crate::upstream::{EventStore, RequestWatch, StoreError, WatchUpdate};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// One delivery from an attached source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    /// A batch of captured requests. Push sources deliver cumulative result
    /// sets; pull sources deliver new events only. The session's tracker
    /// handles duplicates either way.
    Batch(Vec<CapturedRequest>),
    /// The endpoint was deleted upstream; no further events follow
    Deleted,
    /// A transient source failure the session may tolerate
    Error(String),
}

/// Idempotent detach control for one subscription.
#[derive(Debug, Clone)]
pub struct DetachHandle {
    detached: Arc<AtomicBool>,
    abort: Option<AbortHandle>,
}

impl DetachHandle {
    /// Handle tied to a spawned forwarding task.
    #[must_use]
    pub fn for_task<T>(task: &JoinHandle<T>) -> Self {
        Self {
            detached: Arc::new(AtomicBool::new(false)),
            abort: Some(task.abort_handle()),
        }
    }

    /// Handle with nothing to abort, for sources without a backing task.
    #[must_use]
    pub fn noop() -> Self {
        Self {
            detached: Arc::new(AtomicBool::new(false)),
            abort: None,
        }
    }

    /// Detach the subscription. Safe to call any number of times; only the
    /// first call aborts the backing task.
    pub fn detach(&self) {
        if !self.detached.swap(true, Ordering::SeqCst) {
            if let Some(abort) = &self.abort {
                abort.abort();
            }
        }
    }

    /// Whether the subscription has been detached.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }
}

/// A live subscription handed to a session by [`EventSource::attach`].
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<SourceEvent>,
    detach: DetachHandle,
}

impl Subscription {
    /// Wrap a receiving channel and its detach control.
    #[must_use]
    pub fn new(events: mpsc::Receiver<SourceEvent>, detach: DetachHandle) -> Self {
        Self { events, detach }
    }

    /// Wait for the next event. `None` means the source stopped on its own.
    pub async fn next_event(&mut self) -> Option<SourceEvent> {
        self.events.recv().await
    }

    /// Stop the subscription and its backing task.
    pub fn detach(&self) {
        self.detach.detach();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach.detach();
    }
}

/// A source of captured-request events for one endpoint.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Attach a subscription delivering events with
    /// `received_at > after_cursor`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the subscription cannot be established at
    /// all; failures after attach flow through [`SourceEvent::Error`].
    async fn attach(&self, endpoint: &Endpoint, after_cursor: CursorMillis)
        -> AppResult<Subscription>;

    /// Result-set cap per subscription window, if the variant has one. A
    /// session whose delivered window reaches the cap must detach and
    /// re-attach with its advanced cursor.
    fn page_cap(&self) -> Option<usize> {
        None
    }
}

/// Push variant: long-poll watch subscription.
///
/// Each attach spawns a loop that re-issues the watch with a fixed cursor
/// and forwards every result set. Upstream answers each watch with the full
/// current result set for the window, capped at `page_cap`.
pub struct PushEventSource {
    watch: Arc<dyn RequestWatch>,
    page_cap: usize,
    retry_backoff: Duration,
}

impl PushEventSource {
    /// Build from the shared watch capability and relay constants.
    #[must_use]
    pub fn new(watch: Arc<dyn RequestWatch>, relay: &RelayConfig) -> Self {
        Self {
            watch,
            page_cap: relay.page_cap,
            retry_backoff: relay.source_retry_backoff,
        }
    }
}

#[async_trait]
impl EventSource for PushEventSource {
    async fn attach(
        &self,
        endpoint: &Endpoint,
        after_cursor: CursorMillis,
    ) -> AppResult<Subscription> {
        let (tx, rx) = mpsc::channel(4);
        let watch = Arc::clone(&self.watch);
        let endpoint_id = endpoint.id.clone();
        let page_cap = self.page_cap;
        let retry_backoff = self.retry_backoff;

        let task = tokio::spawn(async move {
            loop {
                match watch.watch(&endpoint_id, after_cursor, page_cap).await {
                    Ok(WatchUpdate::ResultSet(events)) => {
                        if tx.send(SourceEvent::Batch(events)).await.is_err() {
                            return;
                        }
                    }
                    Ok(WatchUpdate::Deleted) | Err(StoreError::NotFound) => {
                        let _ = tx.send(SourceEvent::Deleted).await;
                        return;
                    }
                    Err(error) => {
                        debug!(endpoint_id = %endpoint_id, %error, "watch request failed");
                        if tx.send(SourceEvent::Error(error.to_string())).await.is_err() {
                            return;
                        }
                        tokio::time::sleep(retry_backoff).await;
                    }
                }
            }
        });

        let detach = DetachHandle::for_task(&task);
        Ok(Subscription::new(rx, detach))
    }

    fn page_cap(&self) -> Option<usize> {
        Some(self.page_cap)
    }
}

/// Pull variant: fixed-interval point queries for new events.
///
/// The forwarding task owns its own cursor, advanced past every event it
/// sends, so the session only ever sees each event once. Transient store
/// errors are logged and swallowed; the next tick retries.
pub struct PullEventSource {
    store: Arc<dyn EventStore>,
    interval: Duration,
    limit: usize,
}

impl PullEventSource {
    /// Build from the shared store capability and relay constants.
    #[must_use]
    pub fn new(store: Arc<dyn EventStore>, relay: &RelayConfig) -> Self {
        Self {
            store,
            interval: relay.poll_interval,
            limit: relay.page_cap,
        }
    }
}

#[async_trait]
impl EventSource for PullEventSource {
    async fn attach(
        &self,
        endpoint: &Endpoint,
        after_cursor: CursorMillis,
    ) -> AppResult<Subscription> {
        let (tx, rx) = mpsc::channel(4);
        let store = Arc::clone(&self.store);
        let endpoint_id = endpoint.id.clone();
        let poll_interval = self.interval;
        let limit = self.limit;

        let task = tokio::spawn(async move {
            let mut cursor = after_cursor;
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match store.list_requests(&endpoint_id, cursor, limit).await {
                    Ok(events) => {
                        if events.is_empty() {
                            continue;
                        }
                        for event in &events {
                            cursor = cursor.max(event.received_at);
                        }
                        if tx.send(SourceEvent::Batch(events)).await.is_err() {
                            return;
                        }
                    }
                    Err(StoreError::NotFound) => {
                        let _ = tx.send(SourceEvent::Deleted).await;
                        return;
                    }
                    Err(error) => {
                        warn!(endpoint_id = %endpoint_id, %error, "poll query failed; will retry");
                    }
                }
            }
        });

        let detach = DetachHandle::for_task(&task);
        Ok(Subscription::new(rx, detach))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedStore {
        batches: Mutex<Vec<Result<Vec<CapturedRequest>, StoreError>>>,
    }

    #[async_trait]
    impl EventStore for ScriptedStore {
        async fn list_requests(
            &self,
            _endpoint_id: &str,
            _after: CursorMillis,
            _limit: usize,
        ) -> Result<Vec<CapturedRequest>, StoreError> {
            let mut batches = self.batches.lock().unwrap();
            if batches.is_empty() {
                Ok(Vec::new())
            } else {
                batches.remove(0)
            }
        }
    }

    fn event(id: &str, received_at: CursorMillis) -> CapturedRequest {
        CapturedRequest {
            id: id.to_string(),
            endpoint_id: "ep_1".into(),
            method: "POST".into(),
            path: "/hook".into(),
            headers: std::collections::HashMap::new(),
            body: None,
            query_params: std::collections::HashMap::new(),
            content_type: None,
            ip: String::new(),
            size: 0,
            received_at,
        }
    }

    fn endpoint() -> Endpoint {
        Endpoint {
            id: "ep_1".into(),
            slug: "demo".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pull_source_skips_empty_and_swallows_errors() {
        let store = Arc::new(ScriptedStore {
            batches: Mutex::new(vec![
                Ok(Vec::new()),
                Err(StoreError::Transport("boom".into())),
                Ok(vec![event("a", 100)]),
            ]),
        });
        let relay = RelayConfig::default();
        let source = PullEventSource::new(store, &relay);

        let mut sub = source.attach(&endpoint(), 0).await.unwrap();
        let got = sub.next_event().await.unwrap();
        match got {
            SourceEvent::Batch(events) => {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].id, "a");
            }
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pull_source_reports_deletion_and_stops() {
        let store = Arc::new(ScriptedStore {
            batches: Mutex::new(vec![Err(StoreError::NotFound)]),
        });
        let relay = RelayConfig::default();
        let source = PullEventSource::new(store, &relay);

        let mut sub = source.attach(&endpoint(), 0).await.unwrap();
        assert_eq!(sub.next_event().await, Some(SourceEvent::Deleted));
        assert_eq!(sub.next_event().await, None);
    }

    #[tokio::test]
    async fn test_detach_is_idempotent() {
        let handle = DetachHandle::noop();
        assert!(!handle.is_detached());
        handle.detach();
        handle.detach();
        assert!(handle.is_detached());
    }

    struct ScriptedWatch {
        updates: Mutex<Vec<Result<WatchUpdate, StoreError>>>,
    }

    #[async_trait]
    impl RequestWatch for ScriptedWatch {
        async fn watch(
            &self,
            _endpoint_id: &str,
            _after: CursorMillis,
            _limit: usize,
        ) -> Result<WatchUpdate, StoreError> {
            let next = {
                let mut updates = self.updates.lock().unwrap();
                if updates.is_empty() {
                    None
                } else {
                    Some(updates.remove(0))
                }
            };
            match next {
                Some(update) => update,
                // Script exhausted: hold the long poll open forever.
                None => std::future::pending().await,
            }
        }
    }

    fn push_source(
        updates: Vec<Result<WatchUpdate, StoreError>>,
        relay: &RelayConfig,
    ) -> PushEventSource {
        PushEventSource::new(Arc::new(ScriptedWatch {
            updates: Mutex::new(updates),
        }), relay)
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_source_forwards_cumulative_result_sets() {
        let relay = RelayConfig::default();
        let source = push_source(
            vec![
                Ok(WatchUpdate::ResultSet(vec![event("a", 100)])),
                Ok(WatchUpdate::ResultSet(vec![event("a", 100), event("b", 150)])),
            ],
            &relay,
        );
        assert_eq!(source.page_cap(), Some(relay.page_cap));

        let mut sub = source.attach(&endpoint(), 0).await.unwrap();
        assert_eq!(
            sub.next_event().await,
            Some(SourceEvent::Batch(vec![event("a", 100)]))
        );
        // Redelivery of the full result set is passed through untouched; the
        // session's tracker owns deduplication.
        assert_eq!(
            sub.next_event().await,
            Some(SourceEvent::Batch(vec![event("a", 100), event("b", 150)]))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_source_translates_deletion_and_stops() {
        let relay = RelayConfig::default();

        let source = push_source(vec![Ok(WatchUpdate::Deleted)], &relay);
        let mut sub = source.attach(&endpoint(), 0).await.unwrap();
        assert_eq!(sub.next_event().await, Some(SourceEvent::Deleted));
        assert_eq!(sub.next_event().await, None);

        // A not-found watch result means the endpoint is gone too.
        let source = push_source(vec![Err(StoreError::NotFound)], &relay);
        let mut sub = source.attach(&endpoint(), 0).await.unwrap();
        assert_eq!(sub.next_event().await, Some(SourceEvent::Deleted));
        assert_eq!(sub.next_event().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_source_reports_errors_and_retries_after_backoff() {
        let relay = RelayConfig::default();
        let source = push_source(
            vec![
                Err(StoreError::Transport("boom".into())),
                Ok(WatchUpdate::ResultSet(vec![event("a", 100)])),
            ],
            &relay,
        );

        let mut sub = source.attach(&endpoint(), 0).await.unwrap();
        assert_eq!(
            sub.next_event().await,
            Some(SourceEvent::Error("upstream request failed: boom".into()))
        );
        assert_eq!(
            sub.next_event().await,
            Some(SourceEvent::Batch(vec![event("a", 100)]))
        );
    }
}
