//! Classification of upstream messages into replay and live.
//!
//! The adapter starts out "initializing": everything the feed delivers
//! before it reports [`UpstreamEvent::BacklogComplete`] is treated as
//! backlog and buffered for the next replay request. After that signal,
//! every message is live. The cutover is a one-way switch.
//!
//! The cutover point is only as precise as the feed's backlog signal. A
//! message that races the signal may land on either side; it is never
//! delivered on both.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::error::RelayError;
use crate::relay::RelayHandle;

/// How a single upstream message was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Arrived during initialization; sent to the offline buffer.
    Replay,
    /// Arrived after initialization; broadcast to attached viewers.
    Live,
}

/// Items produced by an upstream feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// A raw message payload.
    Message(Bytes),
    /// The feed has delivered its initial backlog.
    BacklogComplete,
}

/// Feeds upstream messages into the relay with the right classification.
#[derive(Debug)]
pub struct UpstreamAdapter {
    relay: RelayHandle,
    initializing: bool,
    replayed: u64,
    relayed: u64,
}

impl UpstreamAdapter {
    /// Creates an adapter in the initializing state.
    #[must_use]
    pub const fn new(relay: RelayHandle) -> Self {
        Self {
            relay,
            initializing: true,
            replayed: 0,
            relayed: 0,
        }
    }

    /// Classification the next message would receive.
    #[must_use]
    pub const fn classification(&self) -> Classification {
        if self.initializing {
            Classification::Replay
        } else {
            Classification::Live
        }
    }

    /// Ends initialization. Idempotent.
    pub fn mark_live(&mut self) {
        if self.initializing {
            self.initializing = false;
            tracing::info!(backlog = self.replayed, "upstream backlog delivered, switching to live");
        }
    }

    /// Classifies `payload` and forwards it to the relay.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Stopped`] once the relay no longer accepts
    /// messages.
    pub async fn ingest(&mut self, payload: Bytes) -> Result<Classification, RelayError> {
        let class = self.classification();
        match class {
            Classification::Replay => {
                self.replayed = self.replayed.saturating_add(1);
                tracing::info!(
                    offline = self.replayed,
                    bytes = payload.len(),
                    "message received while offline"
                );
                self.relay.buffer(payload).await?;
            }
            Classification::Live => {
                self.relayed = self.relayed.saturating_add(1);
                tracing::debug!(bytes = payload.len(), "message received");
                self.relay.publish_live(payload).await?;
            }
        }
        Ok(class)
    }

    /// Pumps `feed` into the relay until the feed ends.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Stopped`] if the relay stops first.
    pub async fn run<S>(mut self, feed: S) -> Result<(), RelayError>
    where
        S: Stream<Item = UpstreamEvent>,
    {
        let mut feed = std::pin::pin!(feed);
        while let Some(event) = feed.next().await {
            match event {
                UpstreamEvent::Message(payload) => {
                    self.ingest(payload).await?;
                }
                UpstreamEvent::BacklogComplete => self.mark_live(),
            }
        }
        tracing::info!(
            replayed = self.replayed,
            relayed = self.relayed,
            "upstream feed ended"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::relay::{ChannelViewerSink, Relay, ReplayOutcome, ViewerId};
    use futures_util::stream;
    use tokio::sync::mpsc;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn starts_in_replay_and_switches_once() {
        let relay = Relay::spawn(8);
        let mut adapter = UpstreamAdapter::new(relay.handle());

        assert_eq!(adapter.classification(), Classification::Replay);
        adapter.mark_live();
        adapter.mark_live();
        assert_eq!(adapter.classification(), Classification::Live);
        assert_ok!(relay.stop().await);
    }

    #[tokio::test]
    async fn run_routes_backlog_to_buffer_and_rest_live() {
        let relay = Relay::spawn(8);
        let handle = relay.handle();
        let (viewer, mut frames) = ChannelViewerSink::new(8);
        assert_ok!(handle.attach_viewer(ViewerId::new(), viewer).await);

        let feed = stream::iter(vec![
            UpstreamEvent::Message(Bytes::from_static(b"cfg-1")),
            UpstreamEvent::Message(Bytes::from_static(b"cfg-2")),
            UpstreamEvent::BacklogComplete,
            UpstreamEvent::Message(Bytes::from_static(b"live-1")),
        ]);
        assert_ok!(UpstreamAdapter::new(handle.clone()).run(feed).await);

        assert_eq!(frames.recv().await, Some(Bytes::from_static(b"live-1")));

        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
        let outcome = handle.replay(tx).await;
        assert_eq!(
            outcome.ok(),
            Some(ReplayOutcome::Completed {
                delivered: 2,
                evicted: 2
            })
        );
        assert_eq!(rx.try_recv().ok(), Some(Bytes::from_static(b"data: cfg-1\n\n")));
        assert_eq!(rx.try_recv().ok(), Some(Bytes::from_static(b"data: cfg-2\n\n")));
        assert!(rx.try_recv().is_err());
        assert_ok!(relay.stop().await);
    }

    #[tokio::test]
    async fn ingest_fails_once_relay_stopped() {
        let relay = Relay::spawn(8);
        let mut adapter = UpstreamAdapter::new(relay.handle());
        assert_ok!(relay.stop().await);

        let Err(RelayError::Stopped) = adapter.ingest(Bytes::from_static(b"late")).await else {
            panic!("expected stopped relay to reject ingest");
        };
    }
}
