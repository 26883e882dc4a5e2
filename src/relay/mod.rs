// ABOUTME: Relay core - event sources, dedup tracking, wire frames, and the session loop
// ABOUTME: Everything between an authenticated connection and the SSE bytes it receives
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! Relay core
//!
//! A stream session couples one client connection to one event source. The
//! source produces batches of captured requests, the delivery tracker filters
//! duplicates and advances the cursor, and the session loop serializes the
//! results into wire frames alongside keepalives and lifecycle frames.

/// Event source variants and subscription handles
pub mod source;

/// Per-session dedup and cursor tracking
pub mod tracker;

/// SSE wire frames
pub mod wire;

/// Stream session state machine and run loop
pub mod session;

pub use session::{CloseReason, SessionState, StreamSession};
pub use source::{EventSource, PullEventSource, PushEventSource, SourceEvent, Subscription};
pub use tracker::DeliveryTracker;
pub use wire::Frame;
