//! Health and status DTOs.

use serde::Serialize;
use utoipa::ToSchema;

use crate::relay::{RelayState, RelayStats};

/// Response body for `GET /health`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `"healthy"` while the relay runs, `"stopping"` otherwise.
    pub status: String,
    /// RFC 3339 timestamp of the check.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Coordinator lifecycle state.
    pub relay: RelayState,
    /// Whether an upstream connection is available for publishing.
    pub upstream_connected: bool,
    /// Coordinator counters; absent once the relay has stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RelayStats>,
}
