//! The single worker that owns and mutates all relay state.
//!
//! Every operation on the [`ConnectionRegistry`] and the [`OfflineBuffer`]
//! is a [`RelayCommand`] sent through one bounded mailbox and handled by
//! one task, in arrival order. That ordering is the only synchronization
//! the relay needs: the registry and buffer are never shared.
//!
//! ```text
//!  ws/ handlers ──┐
//!  api/ handlers ─┼──► mailbox (mpsc, bounded) ──► Coordinator task
//!  upstream ──────┘                                 ├── ConnectionRegistry
//!                                                   ├── broadcast()
//!                                                   └── OfflineBuffer
//! ```

use std::fmt;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use super::ViewerId;
use super::broadcaster::broadcast;
use super::buffer::{OfflineBuffer, ReplayOutcome, SequenceId};
use super::registry::ConnectionRegistry;
use super::sink::{EventSink, ViewerSink};
use crate::error::RelayError;

/// Lifecycle of the coordinator. Only ever moves `Running -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    /// Accepting and dispatching commands.
    Running,
    /// Mailbox closed; nothing more is dispatched.
    Stopped,
}

/// Point-in-time counters reported by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct RelayStats {
    /// Attached live viewers.
    pub viewers: usize,
    /// Messages waiting for the next replay request.
    pub buffered: usize,
    /// Sequence id the next buffered message will receive.
    #[schema(value_type = u64)]
    pub next_sequence: SequenceId,
}

/// A one-shot reader waiting for the offline backlog.
pub struct ReplayRequest {
    sink: Box<dyn EventSink>,
    done: oneshot::Sender<ReplayOutcome>,
}

impl ReplayRequest {
    /// Pairs an output stream with the signal fired once the pass ends.
    #[must_use]
    pub fn new(sink: Box<dyn EventSink>) -> (Self, oneshot::Receiver<ReplayOutcome>) {
        let (done, rx) = oneshot::channel();
        (Self { sink, done }, rx)
    }

    /// Fires the completion signal. Consumes the request so it fires once.
    fn complete(self, outcome: ReplayOutcome) {
        // The requester may have given up already; that is not an error here.
        let _ = self.done.send(outcome);
    }
}

impl fmt::Debug for ReplayRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayRequest")
            .field("done_closed", &self.done.is_closed())
            .finish_non_exhaustive()
    }
}

/// Messages accepted by the coordinator mailbox.
pub enum RelayCommand {
    /// Register a viewer; the reply carries the accept/reject decision.
    AttachViewer {
        /// Caller-chosen unique id.
        id: ViewerId,
        /// Write handle for live frames.
        sink: Box<dyn ViewerSink>,
        /// Synchronous answer to the attaching caller.
        reply: oneshot::Sender<Result<(), RelayError>>,
    },
    /// Remove a viewer. Unknown ids are ignored.
    DetachViewer {
        /// Id given at attach time.
        id: ViewerId,
    },
    /// Fan a live message out to every attached viewer.
    Live {
        /// Raw upstream payload.
        payload: Bytes,
    },
    /// Drain the offline buffer into a requester's stream.
    Replay(ReplayRequest),
    /// Store a message for the next replay request.
    Buffer {
        /// Raw upstream payload.
        payload: Bytes,
    },
    /// Report current counters.
    Stats {
        /// Where to send the snapshot.
        reply: oneshot::Sender<RelayStats>,
    },
}

impl fmt::Debug for RelayCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AttachViewer { id, .. } => write!(f, "AttachViewer({id})"),
            Self::DetachViewer { id } => write!(f, "DetachViewer({id})"),
            Self::Live { payload } => write!(f, "Live({} bytes)", payload.len()),
            Self::Replay(_) => f.write_str("Replay"),
            Self::Buffer { payload } => write!(f, "Buffer({} bytes)", payload.len()),
            Self::Stats { .. } => f.write_str("Stats"),
        }
    }
}

/// Owner of the registry and buffer. Runs inside the task spawned by
/// [`Relay::spawn`].
#[derive(Debug)]
struct Coordinator {
    registry: ConnectionRegistry,
    buffer: OfflineBuffer,
    mailbox: mpsc::Receiver<RelayCommand>,
    state: watch::Receiver<RelayState>,
}

impl Coordinator {
    fn new(mailbox: mpsc::Receiver<RelayCommand>, state: watch::Receiver<RelayState>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            buffer: OfflineBuffer::new(),
            mailbox,
            state,
        }
    }

    async fn run(mut self) {
        tracing::info!("relay coordinator started");

        loop {
            tokio::select! {
                biased;
                changed = self.state.changed() => {
                    if changed.is_err() || *self.state.borrow() == RelayState::Stopped {
                        break;
                    }
                }
                command = self.mailbox.recv() => match command {
                    Some(command) => self.dispatch(command),
                    None => break,
                }
            }
        }

        self.shutdown();
    }

    fn dispatch(&mut self, command: RelayCommand) {
        match command {
            RelayCommand::AttachViewer { id, sink, reply } => {
                let result = self.registry.add(id, sink);
                match &result {
                    Ok(()) => {
                        tracing::info!(viewer_id = %id, viewers = self.registry.len(), "viewer attached");
                    }
                    Err(e) => tracing::warn!(viewer_id = %id, error = %e, "viewer attach rejected"),
                }
                let _ = reply.send(result);
            }
            RelayCommand::DetachViewer { id } => {
                if let Some(mut sink) = self.registry.remove(id) {
                    sink.close();
                    tracing::info!(viewer_id = %id, viewers = self.registry.len(), "viewer detached");
                }
            }
            RelayCommand::Live { payload } => {
                let report = broadcast(&mut self.registry, &payload);
                tracing::debug!(
                    delivered = report.delivered,
                    dropped = report.dropped,
                    "live message relayed"
                );
            }
            RelayCommand::Replay(mut request) => {
                let outcome = self.buffer.replay(request.sink.as_mut());
                tracing::debug!(?outcome, "replay pass finished");
                request.complete(outcome);
            }
            RelayCommand::Buffer { payload } => {
                let seq = self.buffer.push(payload);
                tracing::debug!(%seq, buffered = self.buffer.len(), "message buffered");
            }
            RelayCommand::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    fn stats(&self) -> RelayStats {
        RelayStats {
            viewers: self.registry.len(),
            buffered: self.buffer.len(),
            next_sequence: self.buffer.next_sequence(),
        }
    }

    /// Closes the mailbox and settles whatever is still queued without
    /// dispatching it.
    fn shutdown(mut self) {
        self.mailbox.close();

        let mut discarded = 0usize;
        while let Ok(command) = self.mailbox.try_recv() {
            discarded = discarded.saturating_add(1);
            match command {
                RelayCommand::Replay(request) => request.complete(ReplayOutcome::Aborted),
                RelayCommand::AttachViewer {
                    mut sink, reply, ..
                } => {
                    sink.close();
                    let _ = reply.send(Err(RelayError::Stopped));
                }
                RelayCommand::DetachViewer { .. }
                | RelayCommand::Live { .. }
                | RelayCommand::Buffer { .. }
                | RelayCommand::Stats { .. } => {}
            }
        }

        self.registry.clear();
        tracing::info!(
            discarded,
            dropped_buffered = self.buffer.len(),
            "relay coordinator stopped"
        );
    }
}

/// Cloneable entry point into the coordinator mailbox.
///
/// Every operation enqueues a [`RelayCommand`]. Enqueueing waits while the
/// mailbox is full and fails with [`RelayError::Stopped`] once the relay
/// is stopping.
#[derive(Debug, Clone)]
pub struct RelayHandle {
    mailbox: mpsc::Sender<RelayCommand>,
    state: watch::Receiver<RelayState>,
}

impl RelayHandle {
    /// Returns the current coordinator state.
    #[must_use]
    pub fn state(&self) -> RelayState {
        *self.state.borrow()
    }

    /// Returns `true` while commands are still accepted.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == RelayState::Running
    }

    async fn send(&self, command: RelayCommand) -> Result<(), RelayError> {
        if !self.is_running() {
            return Err(RelayError::Stopped);
        }
        self.mailbox
            .send(command)
            .await
            .map_err(|_| RelayError::Stopped)
    }

    /// Attaches a live viewer and waits for the coordinator's decision.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::DuplicateViewer`] if `id` is already attached,
    /// or [`RelayError::Stopped`] if the relay is stopping.
    pub async fn attach_viewer<S>(&self, id: ViewerId, sink: S) -> Result<(), RelayError>
    where
        S: ViewerSink + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::AttachViewer {
            id,
            sink: Box::new(sink),
            reply,
        })
        .await?;
        rx.await.map_err(|_| RelayError::Stopped)?
    }

    /// Detaches a viewer. Must be sent whenever a viewer's socket goes
    /// away, even if no further writes would be attempted.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Stopped`] if the relay is stopping.
    pub async fn detach_viewer(&self, id: ViewerId) -> Result<(), RelayError> {
        self.send(RelayCommand::DetachViewer { id }).await
    }

    /// Enqueues a message classified live.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Stopped`] if the relay is stopping.
    pub async fn publish_live(&self, payload: Bytes) -> Result<(), RelayError> {
        self.send(RelayCommand::Live { payload }).await
    }

    /// Enqueues a message classified replay.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Stopped`] if the relay is stopping.
    pub async fn buffer(&self, payload: Bytes) -> Result<(), RelayError> {
        self.send(RelayCommand::Buffer { payload }).await
    }

    /// Drains the offline buffer into `sink` and waits for completion.
    ///
    /// Returns [`ReplayOutcome::Aborted`] if the relay stopped while the
    /// request was queued. The caller owns closing its stream afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Stopped`] if the relay is already stopping
    /// when the request is made.
    pub async fn replay<S>(&self, sink: S) -> Result<ReplayOutcome, RelayError>
    where
        S: EventSink + 'static,
    {
        let (request, done) = ReplayRequest::new(Box::new(sink));
        self.send(RelayCommand::Replay(request)).await?;
        Ok(done.await.unwrap_or(ReplayOutcome::Aborted))
    }

    /// A running handle whose mailbox nobody dispatches. Commands queue up
    /// in the returned receiver and are never answered while it is held.
    #[cfg(test)]
    pub(crate) fn unattended(capacity: usize) -> (Self, mpsc::Receiver<RelayCommand>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (_state, state_rx) = watch::channel(RelayState::Running);
        (
            Self {
                mailbox: tx,
                state: state_rx,
            },
            rx,
        )
    }

    /// Asks the coordinator for a counter snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Stopped`] if the relay is stopping.
    pub async fn stats(&self) -> Result<RelayStats, RelayError> {
        let (reply, rx) = oneshot::channel();
        self.send(RelayCommand::Stats { reply }).await?;
        rx.await.map_err(|_| RelayError::Stopped)
    }
}

/// A running coordinator task plus the means to stop it.
#[derive(Debug)]
pub struct Relay {
    handle: RelayHandle,
    state: watch::Sender<RelayState>,
    worker: JoinHandle<()>,
}

impl Relay {
    /// Spawns the coordinator on the current Tokio runtime with a mailbox
    /// bounded to `mailbox_capacity` commands (at least one).
    #[must_use]
    pub fn spawn(mailbox_capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
        let (state, state_rx) = watch::channel(RelayState::Running);
        let coordinator = Coordinator::new(rx, state.subscribe());
        let worker = tokio::spawn(coordinator.run());

        Self {
            handle: RelayHandle {
                mailbox: tx,
                state: state_rx,
            },
            state,
            worker,
        }
    }

    /// Returns a new handle to the mailbox.
    #[must_use]
    pub fn handle(&self) -> RelayHandle {
        self.handle.clone()
    }

    /// Moves the relay to [`RelayState::Stopped`] and waits for the worker
    /// to exit.
    ///
    /// New commands are rejected immediately. Commands still queued are not
    /// dispatched: queued replay requests complete with
    /// [`ReplayOutcome::Aborted`] and queued attaches fail with
    /// [`RelayError::Stopped`].
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if the worker task panicked.
    pub async fn stop(self) -> Result<(), RelayError> {
        tracing::info!("stopping relay");
        self.state.send_replace(RelayState::Stopped);
        self.worker
            .await
            .map_err(|e| RelayError::Internal(format!("relay worker failed: {e}")))
    }
}
