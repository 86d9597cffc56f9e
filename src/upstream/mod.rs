//! Upstream feed: the single subscription whose messages the relay fans out.

pub mod adapter;
pub mod nats;

pub use adapter::{Classification, UpstreamAdapter, UpstreamEvent};
pub use nats::NatsFeed;
