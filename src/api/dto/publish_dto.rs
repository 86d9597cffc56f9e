//! Publish DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for `POST /api/v1/publish`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishRequest {
    /// Subject to publish on. Defaults to the relayed upstream subject.
    #[serde(default)]
    pub subject: Option<String>,
    /// Arbitrary JSON value; published as its JSON encoding.
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

/// Response body for `POST /api/v1/publish`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublishResponse {
    /// Always `"ok"`.
    pub message: String,
    /// Subject the payload was published on.
    pub subject: String,
    /// Size of the published payload in bytes.
    pub bytes: usize,
}
