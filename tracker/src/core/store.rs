//! Unidirectional state container.
//!
//! A [`Store`] holds one immutable state value behind an `Arc` and replaces it
//! through a pure [`Reducer`]. Listeners are notified only when the reducer
//! returns a different `Arc` than it was given; returning the input unchanged
//! is the no-op fast path.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use crate::core::sync::lock;

/// Pure state transition function.
pub trait Reducer {
    type State;
    type Action;

    /// Action that every reducer treats as "no change".
    ///
    /// `reduce(None, &init_action())` must yield the default state.
    fn init_action(&self) -> Self::Action;

    /// Compute the next state. Return `state` itself (same `Arc`) when nothing
    /// changes; listeners are skipped in that case.
    fn reduce(&self, state: Option<&Arc<Self::State>>, action: &Self::Action) -> Arc<Self::State>;
}

type StoreListener = Arc<dyn Fn() + Send + Sync>;

struct Listeners {
    next_id: u64,
    entries: Vec<(u64, StoreListener)>,
}

/// Single state container driven by a [`Reducer`].
pub struct Store<R: Reducer> {
    reducer: R,
    state: Mutex<Arc<R::State>>,
    listeners: Arc<Mutex<Listeners>>,
}

impl<R: Reducer> Store<R> {
    /// Create a store. Without `initial_state`, the reducer supplies its default.
    pub fn new(reducer: R, initial_state: Option<R::State>) -> Self {
        let state = match initial_state {
            Some(state) => Arc::new(state),
            None => reducer.reduce(None, &reducer.init_action()),
        };
        Self {
            reducer,
            state: Mutex::new(state),
            listeners: Arc::new(Mutex::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Current state. Shared and immutable; replace it only via [`Store::dispatch`].
    pub fn get_state(&self) -> Arc<R::State> {
        Arc::clone(&lock(&self.state))
    }

    /// Apply `action` and notify listeners if the state changed.
    pub fn dispatch(&self, action: R::Action) {
        {
            let mut state = lock(&self.state);
            let next = self.reducer.reduce(Some(&*state), &action);
            if Arc::ptr_eq(&next, &state) {
                return;
            }
            *state = next;
        }

        // Snapshot: listeners added now wait for the next dispatch, and
        // listeners removed now still receive this one.
        let listeners: Vec<StoreListener> = lock(&self.listeners)
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }

    /// Register `listener`; it runs after every state change, in subscription order.
    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut listeners = lock(&self.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        Unsubscribe {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }
}

impl<R> fmt::Debug for Store<R>
where
    R: Reducer,
    R::State: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.get_state())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle returned by [`Store::subscribe`].
#[derive(Debug, Clone)]
pub struct Unsubscribe {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Unsubscribe {
    /// Remove exactly this listener. Safe to call from inside a listener and
    /// more than once.
    pub fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}
