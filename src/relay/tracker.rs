// ABOUTME: Per-session delivery tracking - duplicate suppression and cursor advancement
// ABOUTME: The cursor never regresses; the seen-id window clears only on source re-attach
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Hookrelay Contributors

//! Delivery tracking
//!
//! A session's source may re-deliver events it has already handed over: the
//! push variant re-sends the full result set on every change, and both
//! variants can overlap across a re-attach. The tracker owns two pieces of
//! state that make delivery exactly-once within a subscription window: a
//! monotone cursor in epoch milliseconds and the set of ids already emitted
//! in the current window.
//!
//! The window is bounded either way. For a cumulative source the page cap
//! bounds it and a saturation re-attach clears it; for a new-only source
//! there is no re-attach, so ids are pruned as the cursor advances past
//! their timestamps — the upstream only ever serves events strictly newer
//! than the cursor, so a pruned id cannot legitimately reappear.

use crate::models::{CapturedRequest, CursorMillis};
use std::collections::HashMap;

/// Per-session duplicate suppression and cursor state.
#[derive(Debug)]
pub struct DeliveryTracker {
    cursor: CursorMillis,
    seen: HashMap<String, CursorMillis>,
    prune_delivered: bool,
}

impl DeliveryTracker {
    /// Start tracking from `start_cursor`, retaining every delivered id
    /// until [`clear_window`](Self::clear_window). For cumulative sources,
    /// where old events are re-sent with every change.
    #[must_use]
    pub fn new(start_cursor: CursorMillis) -> Self {
        Self {
            cursor: start_cursor,
            seen: HashMap::new(),
            prune_delivered: false,
        }
    }

    /// Start tracking from `start_cursor`, pruning ids once the cursor moves
    /// past their timestamps. For new-only sources, which never re-send
    /// events at or below the cursor.
    #[must_use]
    pub fn with_pruning(start_cursor: CursorMillis) -> Self {
        Self {
            cursor: start_cursor,
            seen: HashMap::new(),
            prune_delivered: true,
        }
    }

    /// Current cursor position in epoch milliseconds.
    #[must_use]
    pub const fn cursor(&self) -> CursorMillis {
        self.cursor
    }

    /// Number of distinct ids delivered in the current window.
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.seen.len()
    }

    /// Filter a batch down to events not yet delivered, oldest first, and
    /// advance the cursor past everything observed.
    ///
    /// The cursor advances even for events filtered out as duplicates, so a
    /// re-attach after saturation resumes past the whole delivered window.
    pub fn accept(&mut self, mut batch: Vec<CapturedRequest>) -> Vec<CapturedRequest> {
        batch.sort_by(|a, b| {
            a.received_at
                .cmp(&b.received_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut fresh = Vec::new();
        for event in batch {
            self.cursor = self.cursor.max(event.received_at);
            if let std::collections::hash_map::Entry::Vacant(entry) =
                self.seen.entry(event.id.clone())
            {
                entry.insert(event.received_at);
                fresh.push(event);
            }
        }

        if self.prune_delivered {
            let cursor = self.cursor;
            self.seen.retain(|_, received_at| *received_at >= cursor);
        }
        fresh
    }

    /// Drop the seen-id window. Called on source re-attach; the advanced
    /// cursor takes over duplicate exclusion across the window boundary.
    pub fn clear_window(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_accept_orders_batch_and_advances_cursor() {
        let mut tracker = DeliveryTracker::new(0);
        let fresh = tracker.accept(vec![event("b", 200), event("a", 100)]);
        let ids: Vec<_> = fresh.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(tracker.cursor(), 200);
    }

    #[test]
    fn test_cumulative_redelivery_yields_only_new_events() {
        let mut tracker = DeliveryTracker::new(0);
        tracker.accept(vec![event("a", 100)]);

        // Push sources resend the full result set on every change.
        let fresh = tracker.accept(vec![event("a", 100), event("b", 150)]);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, "b");
        assert_eq!(tracker.cursor(), 150);
    }

    #[test]
    fn test_cursor_never_regresses() {
        let mut tracker = DeliveryTracker::new(500);
        tracker.accept(vec![event("old", 100)]);
        assert_eq!(tracker.cursor(), 500);
    }

    #[test]
    fn test_duplicate_still_advances_cursor() {
        let mut tracker = DeliveryTracker::new(0);
        tracker.accept(vec![event("a", 100)]);
        let fresh = tracker.accept(vec![event("a", 300)]);
        assert!(fresh.is_empty());
        assert_eq!(tracker.cursor(), 300);
    }

    #[test]
    fn test_clear_window_allows_redelivery_of_known_ids() {
        let mut tracker = DeliveryTracker::new(0);
        tracker.accept(vec![event("a", 100)]);
        tracker.clear_window();
        assert_eq!(tracker.window_len(), 0);

        // Cross-window duplicates are the cursor's job to exclude; ids alone
        // no longer block delivery.
        let fresh = tracker.accept(vec![event("a", 100)]);
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn test_ties_break_by_id() {
        let mut tracker = DeliveryTracker::new(0);
        let fresh = tracker.accept(vec![event("z", 100), event("a", 100)]);
        let ids: Vec<_> = fresh.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "z"]);
    }

    #[test]
    fn test_pruning_mode_bounds_window_as_cursor_advances() {
        let mut tracker = DeliveryTracker::with_pruning(0);
        for i in 1..=1000 {
            tracker.accept(vec![event(&format!("r{i}"), i)]);
        }
        // Only ids at the cursor frontier survive; older ones are dropped.
        assert_eq!(tracker.window_len(), 1);
        assert_eq!(tracker.cursor(), 1000);
    }

    #[test]
    fn test_pruning_mode_keeps_dedup_at_cursor_frontier() {
        let mut tracker = DeliveryTracker::with_pruning(0);
        tracker.accept(vec![event("a", 100), event("b", 100)]);

        // Same-timestamp redelivery still dedups; those ids sit at the
        // cursor and are retained.
        let fresh = tracker.accept(vec![event("a", 100), event("c", 100)]);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].id, "c");
    }

    #[test]
    fn test_retaining_mode_keeps_full_window() {
        let mut tracker = DeliveryTracker::new(0);
        for i in 1..=50 {
            tracker.accept(vec![event(&format!("r{i}"), i)]);
        }
        assert_eq!(tracker.window_len(), 50);
    }
}
