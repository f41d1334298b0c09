//! Thin API layer over a [`StateStore`] backend.
//!
//! Operations are spread across [`crate::assignment`], [`crate::queue`] and
//! [`crate::orchestration`]; each mutating operation runs one
//! read-modify-write cycle while holding the store's writer lock.

use std::sync::Arc;

use baton_state::StateStore;

pub struct Coordinator<S> {
    pub(crate) store: Arc<S>,
}

impl<S> Clone for Coordinator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S> Coordinator<S>
where
    S: StateStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn from_shared(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
