//! Connection lifecycle events
//!
//! The engine notifies zero or more observers of connection lifecycle
//! transitions and raw inbound frames. Delivery is synchronous with the
//! transport callback: listeners run on the read loop before the frame
//! is routed, so they must not block.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A lifecycle or traffic event emitted by the streaming engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The transport opened and the handshake frame was sent.
    Open,
    /// A raw inbound frame, verbatim, before any decoding.
    Message(String),
    /// A transport-level error. Terminal for the channel.
    Error(String),
    /// The transport closed, with the close reason when one was given.
    Close(Option<String>),
}

/// Handle returned by [`EventListeners::add`]; pass to
/// [`EventListeners::remove`] to unregister.
pub type ListenerId = u64;

type Listener = Box<dyn Fn(&StreamEvent) + Send + Sync>;

/// Registry of event listeners with stable removal handles.
#[derive(Default)]
pub(crate) struct EventListeners {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<ListenerId, Listener>>,
}

impl EventListeners {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Register a listener and return its removal handle.
    pub(crate) fn add(&self, listener: impl Fn(&StreamEvent) + Send + Sync + 'static) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .lock()
            .expect("event listener lock poisoned")
            .insert(id, Box::new(listener));
        id
    }

    /// Unregister a listener. Returns `false` when the handle was
    /// already removed or never existed.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        self.listeners
            .lock()
            .expect("event listener lock poisoned")
            .remove(&id)
            .is_some()
    }

    /// Deliver `event` to every registered listener, synchronously.
    pub(crate) fn emit(&self, event: &StreamEvent) {
        let listeners = self.listeners.lock().expect("event listener lock poisoned");
        for listener in listeners.values() {
            listener(event);
        }
    }
}

impl std::fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.listeners.lock().map(|l| l.len()).unwrap_or(0);
        f.debug_struct("EventListeners")
            .field("count", &count)
            .finish()
    }
}
