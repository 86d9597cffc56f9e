//! Ordered store of messages that arrived before any live path existed.
//!
//! [`OfflineBuffer`] assigns each message a [`SequenceId`] when it is
//! buffered and hands the whole backlog, in ascending order, to the next
//! replay request. Every pass evicts what it drained, so a buffered message
//! reaches at most one requester.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use utoipa::ToSchema;

use super::sink::{EventSink, frame_event};

/// Monotonic identifier assigned to a buffered message.
///
/// Starts at 1 for every buffer instance. Not derived from the upstream
/// feed, which has no stable per-message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema)]
#[serde(transparent)]
pub struct SequenceId(u64);

impl SequenceId {
    /// The first sequence id handed out by a fresh buffer.
    pub const FIRST: Self = Self(1);

    /// Returns the raw sequence number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of a replay request, delivered through its completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReplayOutcome {
    /// The pass ran. `delivered` can be lower than `evicted` when the
    /// stream failed part-way.
    Completed {
        /// Events written to the requester's stream.
        delivered: usize,
        /// Entries removed from the buffer by this pass.
        evicted: usize,
    },
    /// The relay stopped before the request was served. Nothing was
    /// written and nothing was evicted.
    Aborted,
}

/// Sequence-ordered offline message store.
#[derive(Debug)]
pub struct OfflineBuffer {
    next: u64,
    entries: BTreeMap<SequenceId, Bytes>,
}

impl OfflineBuffer {
    /// Creates an empty buffer whose first id is [`SequenceId::FIRST`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: SequenceId::FIRST.get(),
            entries: BTreeMap::new(),
        }
    }

    /// Stores `payload` under the next sequence id and returns that id.
    pub fn push(&mut self, payload: Bytes) -> SequenceId {
        let seq = SequenceId(self.next);
        self.next = self.next.saturating_add(1);
        self.entries.insert(seq, payload);
        seq
    }

    /// Drains every buffered entry into `sink` in ascending sequence order.
    ///
    /// Stops at the first write error. All entries taken by this pass are
    /// evicted whether or not they were written.
    pub fn replay(&mut self, sink: &mut dyn EventSink) -> ReplayOutcome {
        let drained = std::mem::take(&mut self.entries);
        let evicted = drained.len();
        let mut delivered = 0usize;

        for (seq, payload) in drained {
            if let Err(e) = sink.write_event(frame_event(&payload)) {
                tracing::warn!(%seq, error = %e, "replay stream failed, evicting remainder");
                break;
            }
            delivered = delivered.saturating_add(1);
        }

        ReplayOutcome::Completed { delivered, evicted }
    }

    /// Returns the id the next buffered message will receive.
    #[must_use]
    pub const fn next_sequence(&self) -> SequenceId {
        SequenceId(self.next)
    }

    /// Returns the number of buffered messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for OfflineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
