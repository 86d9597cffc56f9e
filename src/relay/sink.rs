//! Write-side handles owned by the relay.
//!
//! The coordinator never touches a socket directly. A viewer is represented
//! by a [`ViewerSink`] and a replay requester by an [`EventSink`]; both are
//! synchronous, non-blocking writes so a single slow peer cannot stall the
//! coordinator loop.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::RelayError;

/// A push-socket viewer as seen by the relay.
pub trait ViewerSink: Send {
    /// Attempts a single write of one live frame.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::WriteFailed`] when the frame cannot be handed
    /// to the viewer's transport. The relay drops the viewer on any error.
    fn send_frame(&mut self, payload: &Bytes) -> Result<(), RelayError>;

    /// Releases the underlying transport. Further writes must fail.
    fn close(&mut self);
}

/// The output stream of a single replay request.
pub trait EventSink: Send {
    /// Writes one already framed event.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::WriteFailed`] when the stream is gone; the
    /// replay pass stops at the first error.
    fn write_event(&mut self, frame: Bytes) -> Result<(), RelayError>;
}

/// Frames a payload as a single text-stream event: `data: <payload>\n\n`.
#[must_use]
pub fn frame_event(payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(payload.len().saturating_add(8));
    frame.put_slice(b"data: ");
    frame.put_slice(payload);
    frame.put_slice(b"\n\n");
    frame.freeze()
}

/// [`ViewerSink`] backed by a bounded channel drained by the connection's
/// writer task.
///
/// A full queue counts as a write failure: a viewer that cannot keep up is
/// dropped instead of slowing down everyone else.
#[derive(Debug)]
pub struct ChannelViewerSink {
    tx: Option<mpsc::Sender<Bytes>>,
}

impl ChannelViewerSink {
    /// Creates a sink and the receiver the connection task reads frames from.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }
}

impl ViewerSink for ChannelViewerSink {
    fn send_frame(&mut self, payload: &Bytes) -> Result<(), RelayError> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(RelayError::WriteFailed("viewer closed".to_string()));
        };
        tx.try_send(payload.clone()).map_err(|e| match e {
            TrySendError::Full(_) => RelayError::WriteFailed("viewer queue full".to_string()),
            TrySendError::Closed(_) => {
                RelayError::WriteFailed("viewer disconnected".to_string())
            }
        })
    }

    fn close(&mut self) {
        self.tx = None;
    }
}

impl EventSink for mpsc::UnboundedSender<Bytes> {
    fn write_event(&mut self, frame: Bytes) -> Result<(), RelayError> {
        self.send(frame)
            .map_err(|_| RelayError::WriteFailed("replay stream closed".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn frame_event_uses_text_stream_framing() {
        assert_eq!(frame_event(b"m1"), Bytes::from_static(b"data: m1\n\n"));
        assert_eq!(frame_event(b""), Bytes::from_static(b"data: \n\n"));
    }

    #[test]
    fn channel_sink_delivers_frames() {
        let (mut sink, mut rx) = ChannelViewerSink::new(4);
        assert!(sink.send_frame(&Bytes::from_static(b"x")).is_ok());
        assert_eq!(rx.try_recv().ok(), Some(Bytes::from_static(b"x")));
    }

    #[test]
    fn full_queue_is_a_write_failure() {
        let (mut sink, _rx) = ChannelViewerSink::new(1);
        assert!(sink.send_frame(&Bytes::from_static(b"a")).is_ok());
        let Err(RelayError::WriteFailed(reason)) = sink.send_frame(&Bytes::from_static(b"b"))
        else {
            panic!("expected write failure");
        };
        assert!(reason.contains("full"));
    }

    #[test]
    fn dropped_receiver_is_a_write_failure() {
        let (mut sink, rx) = ChannelViewerSink::new(4);
        drop(rx);
        assert!(sink.send_frame(&Bytes::from_static(b"a")).is_err());
    }

    #[test]
    fn closed_sink_rejects_writes_and_ends_receiver() {
        let (mut sink, mut rx) = ChannelViewerSink::new(4);
        sink.close();
        assert!(sink.send_frame(&Bytes::from_static(b"a")).is_err());
        assert!(rx.try_recv().is_err());
        assert!(rx.is_closed());
    }

    #[test]
    fn unbounded_sender_is_an_event_sink() {
        let (mut tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
        assert!(tx.write_event(frame_event(b"m1")).is_ok());
        assert_eq!(rx.try_recv().ok(), Some(Bytes::from_static(b"data: m1\n\n")));
        drop(rx);
        assert!(tx.write_event(frame_event(b"m2")).is_err());
    }
}
