//! Identity of an attached push-socket viewer.

use std::fmt;

/// Handle for one attach/detach lifecycle.
///
/// The WebSocket session picks a fresh id before attaching and sends the
/// same id when it detaches. A reconnecting client gets a new id, so a
/// late detach from a dead session can never remove its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewerId(uuid::Uuid);

impl ViewerId {
    /// Draws a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ViewerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_attach_gets_a_distinct_id() {
        assert_ne!(ViewerId::new(), ViewerId::new());
    }

    #[test]
    fn displays_as_hyphenated_uuid() {
        let shown = ViewerId::new().to_string();
        assert_eq!(shown.len(), 36);
        assert_eq!(shown.matches('-').count(), 4);
    }
}
