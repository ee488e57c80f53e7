//! ClientRegistry: the reference-counted set of connected viewers.
//!
//! The registry's size is the only signal that decides when the camera
//! powers up or down.  Each mutation reports the transition it caused:
//!
//! - [`ClientRegistry::add`] returns `true` when the set was empty just
//!   before the insert (the *first* viewer arrived).
//! - [`ClientRegistry::remove`] returns `true` when the set became empty
//!   because of the removal (the *last* viewer left).
//!
//! # Atomicity
//!
//! Both the mutation and the boolean it returns are computed under one
//! lock, so two concurrent opens can never both see "first" and two
//! concurrent closes can never both see "last".
//!
//! That alone is not enough: if viewer A's close computed "last" and then
//! viewer B's open started the camera *before* A got round to requesting the
//! stop, A's stop would land on a camera B is using.  The `*_then` variants
//! close that gap by running the caller's lifecycle dispatch inside the same
//! critical section as the mutation.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::domain::frame::ClientId;

/// Concurrent set of connected client identities.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: Mutex<HashSet<ClientId>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `id`; returns `true` if the registry was empty beforehand.
    ///
    /// Re-adding an id that is already present is not a 0→1 transition and
    /// returns `false`.
    pub fn add(&self, id: ClientId) -> bool {
        self.add_then(id, |first| first)
    }

    /// Removes `id`; returns `true` if this removal emptied the registry.
    ///
    /// Removing an unknown id changes nothing and returns `false`, so a
    /// duplicated close can never produce a second "last" signal.
    pub fn remove(&self, id: ClientId) -> bool {
        self.remove_then(id, |last| last)
    }

    /// Inserts `id` and runs `dispatch(is_first)` before releasing the lock.
    pub fn add_then<R>(&self, id: ClientId, dispatch: impl FnOnce(bool) -> R) -> R {
        let mut clients = self.lock();
        let was_empty = clients.is_empty();
        let inserted = clients.insert(id);
        let first = was_empty && inserted;
        trace!(client = %id, size = clients.len(), first, "client registered");
        dispatch(first)
    }

    /// Removes `id` and runs `dispatch(is_last)` before releasing the lock.
    pub fn remove_then<R>(&self, id: ClientId, dispatch: impl FnOnce(bool) -> R) -> R {
        let mut clients = self.lock();
        let removed = clients.remove(&id);
        let last = removed && clients.is_empty();
        trace!(client = %id, size = clients.len(), last, "client unregistered");
        dispatch(last)
    }

    /// Number of connected clients.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.lock().contains(&id)
    }

    // A panic while holding the lock cannot leave the set half-updated
    // (HashSet insert/remove are all-or-nothing), so a poisoned guard is safe
    // to keep using.
    fn lock(&self) -> MutexGuard<'_, HashSet<ClientId>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_registry_starts_empty() {
        let registry = ClientRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_first_add_reports_first() {
        // Arrange
        let registry = ClientRegistry::new();

        // Act
        let first = registry.add(Uuid::new_v4());
        let second = registry.add(Uuid::new_v4());

        // Assert
        assert!(first);
        assert!(!second);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_only_final_remove_reports_last() {
        // Arrange
        let registry = ClientRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.add(a);
        registry.add(b);

        // Act / Assert
        assert!(!registry.remove(a), "one client remains");
        assert!(registry.remove(b), "registry is now empty");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_removing_unknown_client_is_not_last() {
        let registry = ClientRegistry::new();
        assert!(!registry.remove(Uuid::new_v4()));
    }

    #[test]
    fn test_double_remove_reports_last_once() {
        let registry = ClientRegistry::new();
        let a = Uuid::new_v4();
        registry.add(a);
        assert!(registry.remove(a));
        assert!(!registry.remove(a));
    }

    #[test]
    fn test_re_adding_present_client_is_not_first() {
        let registry = ClientRegistry::new();
        let a = Uuid::new_v4();
        assert!(registry.add(a));
        assert!(!registry.add(a));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_refills_after_emptying() {
        // A 1→0 followed by 0→1 must report first again.
        let registry = ClientRegistry::new();
        let a = Uuid::new_v4();
        registry.add(a);
        registry.remove(a);
        assert!(registry.add(Uuid::new_v4()));
    }

    #[test]
    fn test_dispatch_runs_with_membership_already_updated() {
        // Arrange
        let registry = ClientRegistry::new();
        let a = Uuid::new_v4();

        // Act: the closure sees the transition flag for this very mutation.
        let seen = registry.add_then(a, |first| (first, "dispatched"));

        // Assert
        assert_eq!(seen, (true, "dispatched"));
        assert!(registry.contains(a));
        assert!(registry.remove_then(a, |last| last));
    }
}
