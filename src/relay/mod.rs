//! Relay core: viewer registry, live broadcast, offline buffer and the
//! coordinator that serializes them.
//!
//! Nothing outside this module touches the registry or the buffer. HTTP
//! handlers and the upstream adapter only hold a [`RelayHandle`] and talk to
//! the coordinator through its mailbox.

pub mod broadcaster;
pub mod buffer;
pub mod coordinator;
pub mod registry;
pub mod sink;
pub mod viewer;

pub use broadcaster::BroadcastReport;
pub use buffer::{OfflineBuffer, ReplayOutcome, SequenceId};
pub use coordinator::{Relay, RelayCommand, RelayHandle, RelayState, RelayStats, ReplayRequest};
pub use registry::ConnectionRegistry;
pub use sink::{ChannelViewerSink, EventSink, ViewerSink};
pub use viewer::ViewerId;
