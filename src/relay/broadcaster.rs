//! Fan-out of live messages to every attached viewer.

use bytes::Bytes;
use serde::Serialize;

use super::registry::ConnectionRegistry;

/// Outcome of one live broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Viewers that accepted the frame.
    pub delivered: usize,
    /// Viewers whose write failed and that were removed.
    pub dropped: usize,
}

/// Writes `payload` once to every viewer in `registry`.
///
/// A failed write closes that viewer and removes it from the registry; the
/// remaining viewers still receive the frame. Failures never reach the
/// publisher, they only show up in the returned report.
pub fn broadcast(registry: &mut ConnectionRegistry, payload: &Bytes) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    let mut failed = Vec::new();

    registry.for_each(|id, sink| match sink.send_frame(payload) {
        Ok(()) => report.delivered = report.delivered.saturating_add(1),
        Err(e) => {
            tracing::warn!(viewer_id = %id, error = %e, "live write failed, dropping viewer");
            sink.close();
            failed.push(id);
        }
    });

    for id in failed {
        if registry.remove(id).is_some() {
            report.dropped = report.dropped.saturating_add(1);
        }
    }

    report
}
