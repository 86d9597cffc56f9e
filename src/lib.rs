//! # feed-relay
//!
//! Bridges a single upstream pub/sub subscription to many transient
//! downstream viewers: WebSocket clients receive live messages, and
//! one-shot SSE readers collect the messages that arrived while nobody was
//! listening.
//!
//! ## Architecture
//!
//! ```text
//! Upstream feed (NATS)
//!     │
//!     └── UpstreamAdapter (upstream/) ── replay │ live
//!                                              ▼
//! Clients (HTTP, WebSocket)              Relay coordinator (relay/)
//!     │                                        │
//!     ├── WS Handler (ws/) ─── attach/detach ──┤── ConnectionRegistry
//!     ├── Replay Handler (api/) ── replay ─────┤── broadcast()
//!     └── Publish Handler (api/) ── upstream   └── OfflineBuffer
//! ```
//!
//! All relay state is owned by one task and mutated only through its
//! mailbox. State is memory-only and does not survive a restart.

pub mod api;
pub mod app_state;
pub mod config;
pub mod error;
pub mod relay;
pub mod upstream;
pub mod ws;
