// ABOUTME: Stream session state machine - one per client connection
// ABOUTME: Single select loop over source events, keepalive ticks, and the duration deadline
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! Stream sessions
//!
//! A session owns everything that happens on one stream connection after
//! authentication: the opening `connected` frame, source attachment, dedup
//! and cursor tracking, keepalives, the max-duration deadline, and teardown.
//! All of it runs in a single task with one `select!` loop, so no two frames
//! ever race onto the wire and teardown runs exactly once on every path.

use crate::config::environment::RelayConfig;
use crate::models::{CursorMillis, Endpoint};
use crate::relay::source::{EventSource, SourceEvent, Subscription};
use crate::relay::tracker::DeliveryTracker;
use crate::relay::wire::Frame;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Lifecycle of a stream session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Authenticated, `connected` frame not yet sent
    Connecting,
    /// Relaying events
    Streaming,
    /// A terminal condition fired; teardown in progress
    Closing,
    /// Torn down
    Closed,
}

/// Why a session ended. The first terminal condition to fire wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client went away
    ClientDisconnected,
    /// The endpoint was deleted upstream
    EndpointDeleted,
    /// The maximum stream duration elapsed
    MaxDuration,
    /// The source failed past the tolerated error limit
    SourceFailed,
}

impl CloseReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::ClientDisconnected => "client_disconnected",
            Self::EndpointDeleted => "endpoint_deleted",
            Self::MaxDuration => "max_duration",
            Self::SourceFailed => "source_failed",
        }
    }
}

/// One client's stream session.
pub struct StreamSession {
    endpoint: Endpoint,
    source: Arc<dyn EventSource>,
    relay: RelayConfig,
    tracker: DeliveryTracker,
    state: SessionState,
}

impl StreamSession {
    /// Build a session for a resolved endpoint, delivering events with
    /// `received_at > start_cursor`.
    #[must_use]
    pub fn new(
        endpoint: Endpoint,
        source: Arc<dyn EventSource>,
        relay: RelayConfig,
        start_cursor: CursorMillis,
    ) -> Self {
        // A capped source re-sends old events cumulatively, so delivered ids
        // must be retained until the saturation re-attach clears them. An
        // uncapped source only ever delivers past the cursor, so its window
        // can be pruned as the cursor advances.
        let tracker = if source.page_cap().is_some() {
            DeliveryTracker::new(start_cursor)
        } else {
            DeliveryTracker::with_pruning(start_cursor)
        };
        Self {
            endpoint,
            source,
            relay,
            tracker,
            state: SessionState::Connecting,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion, writing frames into `frames`.
    ///
    /// The receiver side closing is treated as client disconnect. Courtesy
    /// frames on terminal paths (`timeout`, `endpoint_deleted`) are sent
    /// best-effort with a bounded wait; teardown never blocks on a slow or
    /// gone client.
    pub async fn run(mut self, frames: mpsc::Sender<Frame>) -> CloseReason {
        let started_at = Instant::now();
        let reason = self.stream(&frames, started_at).await;
        self.teardown(reason, started_at);
        reason
    }

    async fn stream(&mut self, frames: &mpsc::Sender<Frame>, started_at: Instant) -> CloseReason {
        let connected = Frame::Connected {
            slug: self.endpoint.slug.clone(),
            endpoint_id: self.endpoint.id.clone(),
        };
        if self.send_bounded(frames, connected).await.is_err() {
            return CloseReason::ClientDisconnected;
        }
        self.state = SessionState::Streaming;

        let deadline = tokio::time::sleep_until(started_at + self.relay.max_stream_duration);
        tokio::pin!(deadline);

        let mut keepalive = interval_at(
            started_at + self.relay.keepalive_interval,
            self.relay.keepalive_interval,
        );
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut subscription = match self.attach().await {
            Some(sub) => sub,
            None => return CloseReason::SourceFailed,
        };
        let mut source_errors: u32 = 0;

        loop {
            tokio::select! {
                () = frames.closed() => {
                    return CloseReason::ClientDisconnected;
                }
                () = &mut deadline => {
                    self.send_courtesy(frames, Frame::Timeout).await;
                    return CloseReason::MaxDuration;
                }
                _ = keepalive.tick() => {
                    if self.send_bounded(frames, Frame::Keepalive).await.is_err() {
                        return CloseReason::ClientDisconnected;
                    }
                }
                event = subscription.next_event() => {
                    match event {
                        Some(SourceEvent::Batch(batch)) => {
                            source_errors = 0;
                            for request in self.tracker.accept(batch) {
                                let frame = Frame::Request(Box::new(request));
                                if self.send_bounded(frames, frame).await.is_err() {
                                    return CloseReason::ClientDisconnected;
                                }
                            }
                            if let Some(cap) = self.source.page_cap() {
                                if self.tracker.window_len() >= cap {
                                    subscription.detach();
                                    self.tracker.clear_window();
                                    subscription = match self.attach().await {
                                        Some(sub) => sub,
                                        None => return CloseReason::SourceFailed,
                                    };
                                }
                            }
                        }
                        Some(SourceEvent::Deleted) => {
                            self.send_courtesy(frames, Frame::EndpointDeleted {
                                slug: self.endpoint.slug.clone(),
                            }).await;
                            return CloseReason::EndpointDeleted;
                        }
                        Some(SourceEvent::Error(message)) => {
                            source_errors += 1;
                            warn!(
                                slug = %self.endpoint.slug,
                                consecutive = source_errors,
                                %message,
                                "source error"
                            );
                            if source_errors >= self.relay.source_error_limit {
                                return CloseReason::SourceFailed;
                            }
                        }
                        None => {
                            return CloseReason::SourceFailed;
                        }
                    }
                }
            }
        }
    }

    /// Re-attach the source at the tracker's current cursor. The delivered
    /// window is cleared by the caller when this follows a saturation.
    async fn attach(&self) -> Option<Subscription> {
        match self.source.attach(&self.endpoint, self.tracker.cursor()).await {
            Ok(sub) => Some(sub),
            Err(error) => {
                warn!(slug = %self.endpoint.slug, %error, "failed to attach event source");
                None
            }
        }
    }

    /// Send a frame with at most one keepalive interval of patience. A
    /// client that stays connected but stops draining must not stall the
    /// control loop past the duration deadline; a stuck channel is treated
    /// the same as a failed write.
    async fn send_bounded(&self, frames: &mpsc::Sender<Frame>, frame: Frame) -> Result<(), ()> {
        let wait = self.relay.keepalive_interval;
        match tokio::time::timeout(wait, frames.send(frame)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) | Err(_) => Err(()),
        }
    }

    /// Best-effort terminal frame; a gone or stalled client forfeits it.
    async fn send_courtesy(&self, frames: &mpsc::Sender<Frame>, frame: Frame) {
        if self.send_bounded(frames, frame).await.is_err() {
            debug!(slug = %self.endpoint.slug, "dropped terminal frame for slow client");
        }
    }

    fn teardown(&mut self, reason: CloseReason, started_at: Instant) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closing;
        info!(
            slug = %self.endpoint.slug,
            endpoint_id = %self.endpoint.id,
            reason = reason.as_str(),
            duration_secs = started_at.elapsed().as_secs(),
            cursor = self.tracker.cursor(),
            "stream session closed"
        );
        self.state = SessionState::Closed;
    }
}
