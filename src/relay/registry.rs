//! Set of currently attached push-socket viewers.
//!
//! [`ConnectionRegistry`] is owned by the coordinator task and is only ever
//! mutated from there, so it is a plain `HashMap` with no locking.

use std::collections::HashMap;
use std::fmt;

use super::ViewerId;
use super::sink::ViewerSink;
use crate::error::RelayError;

/// Maps each attached [`ViewerId`] to the sink that writes to it.
#[derive(Default)]
pub struct ConnectionRegistry {
    viewers: HashMap<ViewerId, Box<dyn ViewerSink>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a viewer.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::DuplicateViewer`] if `id` is already attached.
    /// The registry is left unchanged and the rejected sink is closed.
    pub fn add(&mut self, id: ViewerId, mut sink: Box<dyn ViewerSink>) -> Result<(), RelayError> {
        if self.viewers.contains_key(&id) {
            sink.close();
            return Err(RelayError::DuplicateViewer(id));
        }
        self.viewers.insert(id, sink);
        Ok(())
    }

    /// Removes a viewer, returning its sink. Unknown IDs are a no-op.
    pub fn remove(&mut self, id: ViewerId) -> Option<Box<dyn ViewerSink>> {
        self.viewers.remove(&id)
    }

    /// Invokes `f` once per registered viewer, in unspecified order.
    pub fn for_each<F>(&mut self, mut f: F)
    where
        F: FnMut(ViewerId, &mut dyn ViewerSink),
    {
        for (id, sink) in &mut self.viewers {
            f(*id, sink.as_mut());
        }
    }

    /// Returns `true` if `id` is currently attached.
    #[must_use]
    pub fn contains(&self, id: ViewerId) -> bool {
        self.viewers.contains_key(&id)
    }

    /// Closes and removes every viewer.
    pub fn clear(&mut self) {
        for (_, mut sink) in self.viewers.drain() {
            sink.close();
        }
    }

    /// Returns the number of attached viewers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    /// Returns `true` if no viewer is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }
}

impl fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("viewers", &self.viewers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::relay::sink::ChannelViewerSink;

    fn sink() -> Box<dyn ViewerSink> {
        let (sink, _rx) = ChannelViewerSink::new(4);
        Box::new(sink)
    }

    #[test]
    fn add_and_contains() {
        let mut registry = ConnectionRegistry::new();
        let id = ViewerId::new();
        assert!(registry.add(id, sink()).is_ok());
        assert!(registry.contains(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_add_is_rejected_without_change() {
        let mut registry = ConnectionRegistry::new();
        let id = ViewerId::new();
        let (first, mut first_rx) = ChannelViewerSink::new(4);
        assert!(registry.add(id, Box::new(first)).is_ok());

        let Err(RelayError::DuplicateViewer(dup)) = registry.add(id, sink()) else {
            panic!("expected duplicate rejection");
        };
        assert_eq!(dup, id);
        assert_eq!(registry.len(), 1);

        // The original sink is still the registered one.
        registry.for_each(|_, s| {
            let _ = s.send_frame(&bytes::Bytes::from_static(b"still-here"));
        });
        assert_eq!(
            first_rx.try_recv().ok(),
            Some(bytes::Bytes::from_static(b"still-here"))
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let id = ViewerId::new();
        let _ = registry.add(id, sink());
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert!(registry.remove(ViewerId::new()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn for_each_visits_every_viewer_once() {
        let mut registry = ConnectionRegistry::new();
        let ids: Vec<ViewerId> = (0..5).map(|_| ViewerId::new()).collect();
        for id in &ids {
            let _ = registry.add(*id, sink());
        }
        let mut seen = Vec::new();
        registry.for_each(|id, _| seen.push(id));
        assert_eq!(seen.len(), ids.len());
        let seen: HashSet<ViewerId> = seen.into_iter().collect();
        let expected: HashSet<ViewerId> = ids.into_iter().collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn membership_is_net_effect_of_operations() {
        let mut registry = ConnectionRegistry::new();
        let a = ViewerId::new();
        let b = ViewerId::new();
        let c = ViewerId::new();
        let _ = registry.add(a, sink());
        let _ = registry.add(b, sink());
        registry.remove(a);
        let _ = registry.add(c, sink());
        registry.remove(c);
        let _ = registry.add(a, sink());
        assert!(registry.contains(a));
        assert!(registry.contains(b));
        assert!(!registry.contains(c));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn clear_closes_sinks() {
        let mut registry = ConnectionRegistry::new();
        let (s, rx) = ChannelViewerSink::new(4);
        let _ = registry.add(ViewerId::new(), Box::new(s));
        registry.clear();
        assert!(registry.is_empty());
        assert!(rx.is_closed());
    }
}
