//! WebSocket layer: live viewers.
//!
//! Every connection on `/ws` is attached to the relay as one viewer and
//! receives each live message as a single frame until it disconnects.

pub mod connection;
pub mod handler;
