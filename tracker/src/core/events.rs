//! Named-event emission and recording.
//!
//! Observable components (timer, repository, countdown) own an [`EventBus`]
//! and expose it through the [`Emitter`] contract. Tests attach an
//! [`EventRecorder`] to a named event and assert on the captured payloads
//! instead of injecting callbacks into production code.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::core::sync::lock;

/// Callback invoked synchronously for every emitted payload.
pub type Listener<P> = Arc<dyn Fn(&P) + Send + Sync>;

/// Identifies one subscription on one emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Anything an [`EventRecorder`] can observe.
pub trait Emitter {
    type Payload;

    /// Register `listener` for `event`. Listeners run in subscription order.
    fn subscribe(&self, event: &str, listener: Listener<Self::Payload>) -> SubscriptionId;

    /// Remove a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, event: &str, id: SubscriptionId);

    /// Deliver `payload` to every listener of `event` before returning.
    fn emit(&self, event: &str, payload: Self::Payload);
}

struct BusState<P> {
    next_id: u64,
    listeners: HashMap<String, Vec<(SubscriptionId, Listener<P>)>>,
}

/// Shared in-process [`Emitter`]. Clones refer to the same listener table.
pub struct EventBus<P> {
    state: Arc<Mutex<BusState<P>>>,
}

impl<P> EventBus<P> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                next_id: 0,
                listeners: HashMap::new(),
            })),
        }
    }

    /// Number of live listeners on `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        lock(&self.state)
            .listeners
            .get(event)
            .map_or(0, Vec::len)
    }
}

impl<P> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Clone for EventBus<P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<P> fmt::Debug for EventBus<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        let mut events: Vec<_> = state
            .listeners
            .iter()
            .map(|(event, listeners)| (event.clone(), listeners.len()))
            .collect();
        events.sort();
        f.debug_struct("EventBus").field("listeners", &events).finish()
    }
}

impl<P> Emitter for EventBus<P> {
    type Payload = P;

    fn subscribe(&self, event: &str, listener: Listener<P>) -> SubscriptionId {
        let mut state = lock(&self.state);
        let id = SubscriptionId(state.next_id);
        state.next_id += 1;
        state
            .listeners
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    fn unsubscribe(&self, event: &str, id: SubscriptionId) {
        let mut state = lock(&self.state);
        if let Some(listeners) = state.listeners.get_mut(event) {
            listeners.retain(|(existing, _)| *existing != id);
            if listeners.is_empty() {
                state.listeners.remove(event);
            }
        }
    }

    fn emit(&self, event: &str, payload: P) {
        // Snapshot so listeners may (un)subscribe while being notified.
        let listeners: Vec<Listener<P>> = lock(&self.state)
            .listeners
            .get(event)
            .map(|listeners| listeners.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(&payload);
        }
    }
}

/// Captures every payload emitted for one event until stopped.
pub struct EventRecorder<P> {
    event: String,
    data: Arc<Mutex<Vec<P>>>,
    detach: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl<P: Clone + Send + 'static> EventRecorder<P> {
    /// Subscribe to `event` on `emitter`; capture starts immediately.
    pub fn create<E>(emitter: &E, event: &str) -> Self
    where
        E: Emitter<Payload = P> + Clone + Send + 'static,
    {
        let data = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&data);
        let id = emitter.subscribe(
            event,
            Arc::new(move |payload: &P| lock(&sink).push(payload.clone())),
        );

        let emitter = emitter.clone();
        let name = event.to_string();
        let detach: Box<dyn FnOnce() + Send> = Box::new(move || emitter.unsubscribe(&name, id));

        Self {
            event: event.to_string(),
            data,
            detach: Mutex::new(Some(detach)),
        }
    }

    /// Copy of the payloads captured so far, in emission order.
    pub fn data(&self) -> Vec<P> {
        lock(&self.data).clone()
    }

    /// Return the captured payloads and empty the buffer in one step.
    pub fn clear(&self) -> Vec<P> {
        std::mem::take(&mut *lock(&self.data))
    }
}

impl<P> EventRecorder<P> {
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Detach from the emitter. Later emissions are not captured.
    pub fn stop(&self) {
        let detach = lock(&self.detach).take();
        if let Some(detach) = detach {
            detach();
        }
    }

    pub fn is_stopped(&self) -> bool {
        lock(&self.detach).is_none()
    }
}

impl<P> Drop for EventRecorder<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<P> fmt::Debug for EventRecorder<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecorder")
            .field("event", &self.event)
            .field("captured", &lock(&self.data).len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
