//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::relay::RelayHandle;
use crate::upstream::NatsFeed;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Mailbox of the relay coordinator.
    pub relay: RelayHandle,
    /// Upstream connection used by the publish endpoint, if connected.
    pub publisher: Option<NatsFeed>,
    /// Settings the handlers need at request time.
    pub config: Arc<RelayConfig>,
}
