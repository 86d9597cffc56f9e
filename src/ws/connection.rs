//! Lifecycle of a single viewer connection.
//!
//! Attaches the socket to the relay, forwards queued live frames to the
//! client, and always detaches on the way out.

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};

use crate::relay::{ChannelViewerSink, RelayHandle, ViewerId};

/// Runs the read/write loop for a single WebSocket viewer.
///
/// - Frames queued by the relay are written to the client in order.
/// - Client messages are ignored; a close frame, a read error or a failed
///   write ends the connection.
/// - The relay closing the viewer's queue also ends the connection.
pub async fn run_connection(socket: WebSocket, relay: RelayHandle, queue_capacity: usize) {
    let viewer_id = ViewerId::new();
    let (sink, mut frames) = ChannelViewerSink::new(queue_capacity);

    if let Err(e) = relay.attach_viewer(viewer_id, sink).await {
        tracing::warn!(%viewer_id, error = %e, "could not attach viewer");
        return;
    }

    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Live frame queued by the relay
            frame = frames.recv() => {
                let Some(payload) = frame else {
                    tracing::debug!(%viewer_id, "relay closed viewer");
                    break;
                };
                if ws_tx.send(to_message(payload)).await.is_err() {
                    break;
                }
            }
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(%viewer_id, error = %e, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    if let Err(e) = relay.detach_viewer(viewer_id).await {
        tracing::debug!(%viewer_id, error = %e, "detach after shutdown");
    }
    let _ = ws_tx.close().await;

    tracing::debug!(%viewer_id, "ws connection closed");
}

/// Sends UTF-8 payloads as text frames and anything else as binary.
fn to_message(payload: Bytes) -> Message {
    match std::str::from_utf8(&payload) {
        Ok(text) => Message::text(text),
        Err(_) => Message::Binary(payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_payload_becomes_text_frame() {
        let msg = to_message(Bytes::from_static(b"{\"enabled\":true}"));
        assert!(matches!(msg, Message::Text(ref t) if t.as_str() == "{\"enabled\":true}"));
    }

    #[test]
    fn non_utf8_payload_becomes_binary_frame() {
        let msg = to_message(Bytes::from_static(&[0xff, 0xfe]));
        assert!(matches!(msg, Message::Binary(ref b) if b.as_ref() == [0xff_u8, 0xfe]));
    }
}
