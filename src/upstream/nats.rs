//! NATS-backed upstream feed.
//!
//! Wraps a single `async_nats` connection used both to subscribe to the
//! relayed subject and to publish on behalf of the HTTP publish endpoint.

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt, stream};
use tokio::time::Sleep;

use super::adapter::UpstreamEvent;
use crate::error::RelayError;

/// Boxed stream of [`UpstreamEvent`]s.
pub type EventStream = Pin<Box<dyn Stream<Item = UpstreamEvent> + Send>>;

/// Connection to the upstream NATS server.
#[derive(Clone)]
pub struct NatsFeed {
    client: async_nats::Client,
}

impl NatsFeed {
    /// Connects to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Upstream`] if the connection cannot be
    /// established.
    pub async fn connect(url: &str) -> Result<Self, RelayError> {
        tracing::info!(url, "connecting to upstream feed");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| RelayError::Upstream(format!("failed to connect to {url}: {e}")))?;
        tracing::info!("upstream connection established");
        Ok(Self { client })
    }

    /// Subscribes to `subject` and returns the resulting event stream.
    ///
    /// Messages arriving within `backlog_window` of the subscription being
    /// established are followed by a single
    /// [`UpstreamEvent::BacklogComplete`]; everything after it is live.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Upstream`] if the subscription fails.
    pub async fn subscribe(
        &self,
        subject: &str,
        backlog_window: Duration,
    ) -> Result<EventStream, RelayError> {
        let subscriber = self
            .client
            .subscribe(subject.to_owned())
            .await
            .map_err(|e| RelayError::Upstream(format!("failed to subscribe to {subject}: {e}")))?;
        tracing::info!(subject, window_ms = backlog_window.as_millis(), "subscribed to upstream");

        let payloads = subscriber.map(|message| message.payload);
        Ok(with_backlog_cutover(payloads, backlog_window))
    }

    /// Publishes `payload` on `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Upstream`] if the client cannot publish.
    pub async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), RelayError> {
        self.client
            .publish(subject.to_owned(), payload)
            .await
            .map_err(|e| RelayError::Upstream(format!("failed to publish to {subject}: {e}")))?;
        tracing::debug!(subject, "published to upstream");
        Ok(())
    }
}

impl std::fmt::Debug for NatsFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsFeed")
            .field("state", &self.client.connection_state())
            .finish()
    }
}

enum Next {
    Message(Option<Bytes>),
    Elapsed,
}

/// Turns a raw payload stream into [`UpstreamEvent`]s, emitting
/// [`UpstreamEvent::BacklogComplete`] once `window` has elapsed.
///
/// The timer is polled before the payload stream so that a steady flow of
/// messages cannot hold the cutover back.
pub fn with_backlog_cutover<S>(payloads: S, window: Duration) -> EventStream
where
    S: Stream<Item = Bytes> + Send + Unpin + 'static,
{
    let timer: Option<Pin<Box<Sleep>>> = Some(Box::pin(tokio::time::sleep(window)));

    Box::pin(stream::unfold(
        (payloads, timer),
        |(mut payloads, mut timer)| async move {
            let next = match timer.as_mut() {
                Some(sleep) => tokio::select! {
                    biased;
                    () = sleep.as_mut() => Next::Elapsed,
                    payload = payloads.next() => Next::Message(payload),
                },
                None => Next::Message(payloads.next().await),
            };

            match next {
                Next::Elapsed => Some((UpstreamEvent::BacklogComplete, (payloads, None))),
                Next::Message(payload) => {
                    let payload = payload?;
                    Some((UpstreamEvent::Message(payload), (payloads, timer)))
                }
            }
        },
    ))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn channel_stream(mut rx: mpsc::UnboundedReceiver<Bytes>) -> impl Stream<Item = Bytes> + Unpin {
        Box::pin(stream::poll_fn(move |cx| rx.poll_recv(cx)))
    }

    #[tokio::test]
    async fn backlog_then_cutover_then_live() {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Bytes::from_static(b"retained"));
        let mut events = with_backlog_cutover(channel_stream(rx), Duration::from_millis(50));

        assert_eq!(
            events.next().await,
            Some(UpstreamEvent::Message(Bytes::from_static(b"retained")))
        );
        assert_eq!(events.next().await, Some(UpstreamEvent::BacklogComplete));

        let _ = tx.send(Bytes::from_static(b"fresh"));
        assert_eq!(
            events.next().await,
            Some(UpstreamEvent::Message(Bytes::from_static(b"fresh")))
        );

        drop(tx);
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn feed_ending_during_backlog_ends_stream() {
        let payloads = stream::iter(vec![Bytes::from_static(b"only")]);
        let mut events = with_backlog_cutover(payloads, Duration::from_secs(60));

        assert_eq!(
            events.next().await,
            Some(UpstreamEvent::Message(Bytes::from_static(b"only")))
        );
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    #[ignore]
    async fn connect_to_nats() {
        let result = NatsFeed::connect("nats://localhost:4222").await;
        assert!(result.is_ok());
    }
}
