//! Subscription registry
//!
//! Allocates monotonically increasing subscription identifiers and maps
//! each live identifier to its consumer callback and last snapshot text.
//!
//! Presence in the registry is the authoritative lifecycle state: an
//! entry exists if and only if the server has not yet delivered a close
//! frame for that id. Inbound frames whose id is absent are dropped by
//! the engine, which makes unsubscribe safe against in-flight messages
//! without explicit tombstones.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ZetaError;
use crate::stream::frame::RESERVED_CONNECT_ID;

/// A message delivered to a subscription callback.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionUpdate {
    /// A decoded document: the initial snapshot or the result of a delta
    /// apply.
    Data(Value),
    /// The server closed this subscription; no further messages follow.
    Closed,
}

/// Consumer callback for one subscription.
///
/// Invoked synchronously with message receipt, so a slow callback
/// back-pressures the consumer side. Callbacks must not block
/// indefinitely.
pub type SubscriptionCallback = Arc<dyn Fn(SubscriptionUpdate) + Send + Sync>;

/// One live subscription: the caller's topic, its consumer, and the raw
/// text of the last snapshot once one has been received.
pub struct SubscriptionEntry {
    /// The opaque topic the caller subscribed with.
    pub topic: Value,
    /// Consumer for decoded documents and the close signal.
    pub callback: SubscriptionCallback,
    /// Raw text of the last snapshot; `None` before the first `A` frame.
    pub last_snapshot: Option<String>,
}

impl std::fmt::Debug for SubscriptionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionEntry")
            .field("topic", &self.topic)
            .field("last_snapshot", &self.last_snapshot)
            .finish_non_exhaustive()
    }
}

/// Identifier allocation and id → entry routing for one streaming
/// session.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    next_id: u64,
    entries: HashMap<u64, SubscriptionEntry>,
}

impl SubscriptionRegistry {
    /// Create an empty registry. The allocator starts at 1.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: HashMap::new(),
        }
    }

    /// Return the next free identifier and advance the counter.
    ///
    /// Identifiers are strictly increasing for the lifetime of the
    /// registry. The reserved handshake id is skipped so data
    /// subscriptions can never collide with it.
    pub fn allocate_id(&mut self) -> u64 {
        if self.next_id == RESERVED_CONNECT_ID {
            self.next_id += 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Install an entry under `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ZetaError::Misuse`] when `id` is the reserved handshake
    /// id or is already occupied by a live subscription.
    pub fn install(
        &mut self,
        id: u64,
        topic: Value,
        callback: SubscriptionCallback,
    ) -> Result<(), ZetaError> {
        if id == RESERVED_CONNECT_ID {
            return Err(ZetaError::Misuse(format!(
                "subscription id {id} is reserved for the handshake"
            )));
        }
        if self.entries.contains_key(&id) {
            return Err(ZetaError::Misuse(format!(
                "subscription id {id} is already in use"
            )));
        }
        self.entries.insert(
            id,
            SubscriptionEntry {
                topic,
                callback,
                last_snapshot: None,
            },
        );
        Ok(())
    }

    /// Remove and return the entry for `id`, if present.
    pub fn remove(&mut self, id: u64) -> Option<SubscriptionEntry> {
        self.entries.remove(&id)
    }

    /// Look up the consumer and last snapshot for `id`.
    ///
    /// Returns clones so the caller can release the registry lock before
    /// invoking the callback.
    pub fn lookup(&self, id: u64) -> Option<(SubscriptionCallback, Option<String>)> {
        self.entries
            .get(&id)
            .map(|entry| (Arc::clone(&entry.callback), entry.last_snapshot.clone()))
    }

    /// Replace the stored snapshot text for `id`.
    ///
    /// A missing entry is a no-op: the subscription was evicted while a
    /// frame for it was still in flight.
    pub fn set_last(&mut self, id: u64, text: String) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.last_snapshot = Some(text);
        }
    }

    /// Whether `id` currently routes to a live subscription.
    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry holds no live subscriptions.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Used by disconnect: evicted consumers receive no
    /// further calls, including no synthetic close.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
