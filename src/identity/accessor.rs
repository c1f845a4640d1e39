//! Companion read/write utility around the session store.
//!
//! Unlike the guard, reads here have no redirect side effect; logout clears
//! the store and the in-memory copy but leaves navigation to the caller.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use super::principal::Principal;
use super::session;
use super::store::{stored_principal, SessionStore};

pub struct SessionAccessor {
    store: Arc<dyn SessionStore>,
    cached: RwLock<Option<Principal>>,
}

impl SessionAccessor {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store, cached: RwLock::new(None) }
    }

    /// The current principal, deserialized from the store, or `None`.
    /// Pure read; also refreshes the in-memory copy.
    pub fn current_principal(&self) -> Option<Principal> {
        let p = stored_principal(self.store.as_ref());
        *self.cached.write() = p.clone();
        p
    }

    /// Last principal seen by [`Self::current_principal`], without touching
    /// the store.
    pub fn cached(&self) -> Option<Principal> {
        self.cached.read().clone()
    }

    /// Clear the principal from the store and the in-memory copy.
    ///
    /// Idempotent and infallible from the caller's perspective; navigation
    /// afterwards is the caller's responsibility.
    pub fn logout(&self) {
        *self.cached.write() = None;
        if let Err(e) = session::teardown(self.store.as_ref()) {
            warn!(error = %e, "session teardown failed during logout");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::principal::Role;
    use crate::identity::store::{MemorySessionStore, SessionStore, USER_KEY};

    fn accessor_with_user() -> SessionAccessor {
        let store = Arc::new(MemorySessionStore::new());
        let p = Principal {
            id: "u-4".into(),
            name: "Dee".into(),
            username: "dee".into(),
            email: "dee@example.com".into(),
            role: Role::new("staff"),
        };
        store.set(USER_KEY, &serde_json::to_string(&p).unwrap()).unwrap();
        SessionAccessor::new(store)
    }

    #[test]
    fn current_principal_reads_and_caches() {
        let acc = accessor_with_user();
        assert_eq!(acc.cached(), None);
        let p = acc.current_principal().expect("principal present");
        assert_eq!(p.username, "dee");
        assert_eq!(acc.cached().map(|p| p.username), Some("dee".into()));
    }

    #[test]
    fn logout_clears_store_and_cache() {
        let acc = accessor_with_user();
        acc.current_principal();
        acc.logout();
        assert_eq!(acc.cached(), None);
        assert_eq!(acc.current_principal(), None);
    }

    #[test]
    fn logout_on_empty_store_is_a_no_op() {
        let store = Arc::new(MemorySessionStore::new());
        let acc = SessionAccessor::new(store);
        acc.logout();
        acc.logout();
        assert_eq!(acc.current_principal(), None);
    }

    #[test]
    fn read_has_no_side_effect_on_the_store() {
        let acc = accessor_with_user();
        acc.current_principal();
        acc.current_principal();
        assert!(acc.current_principal().is_some(), "reads never clear the store");
    }
}
