//! Push subscription registry with synchronous cancellation.
//!
//! Both collaborators push events: the identity provider on every sign-in or
//! sign-out, the document store on every write to a collection. Each keeps a
//! `SubscriberSet` of handlers and hands out a `CancelToken` per registration.
//!
//! Handlers run on the publisher's thread. The registry lock is released
//! before any handler runs, so a handler may cancel its own or another
//! subscription. Cancelling flips the slot inactive before removing it; a
//! publish that starts after `cancel` returns never reaches that handler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Handler<E> = Box<dyn Fn(&E) + Send + Sync>;

struct Slot<K, E> {
    id: u64,
    key: K,
    active: AtomicBool,
    handler: Handler<E>,
}

impl<K, E> Slot<K, E> {
    fn deliver(&self, event: &E) {
        if self.active.load(Ordering::Acquire) {
            (self.handler)(event);
        }
    }
}

type Slots<K, E> = Mutex<Vec<Arc<Slot<K, E>>>>;

/// Registered handlers, each tagged with a key (e.g. the query it listens to).
///
/// Thread-safe: uses an internal `Mutex` so publishers can share it without
/// requiring `&mut self`.
pub struct SubscriberSet<K, E> {
    next_id: AtomicU64,
    slots: Arc<Slots<K, E>>,
}

impl<K, E> SubscriberSet<K, E>
where
    K: Send + Sync + 'static,
    E: 'static,
{
    /// Create a new empty set.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            slots: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a handler. Dropping or cancelling the token unregisters it.
    pub fn subscribe<F>(&self, key: K, handler: F) -> CancelToken
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let slot = Arc::new(Slot {
            id,
            key,
            active: AtomicBool::new(true),
            handler: Box::new(handler),
        });

        self.slots.lock().unwrap().push(Arc::clone(&slot));

        let weak_slot: Weak<Slot<K, E>> = Arc::downgrade(&slot);
        let weak_slots: Weak<Slots<K, E>> = Arc::downgrade(&self.slots);
        CancelToken::new(id, move || {
            if let Some(slot) = weak_slot.upgrade() {
                slot.active.store(false, Ordering::Release);
            }
            if let Some(slots) = weak_slots.upgrade() {
                slots.lock().unwrap().retain(|s| s.id != id);
            }
        })
    }

    /// Number of live registrations.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    /// Check if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver the same event to every live handler, in registration order.
    pub fn publish(&self, event: &E) {
        for slot in self.live() {
            slot.deliver(event);
        }
    }

    /// Deliver a per-key event. `make` runs once per live handler with its
    /// registration id and key, outside the registry lock; returning `None`
    /// skips that handler.
    pub fn publish_with<F>(&self, mut make: F)
    where
        F: FnMut(u64, &K) -> Option<E>,
    {
        for slot in self.live() {
            if !slot.active.load(Ordering::Acquire) {
                continue;
            }
            if let Some(event) = make(slot.id, &slot.key) {
                slot.deliver(&event);
            }
        }
    }

    /// Unregister from the publisher side. Returns `true` if it was live.
    pub fn remove(&self, id: u64) -> bool {
        let mut slots = self.slots.lock().unwrap();
        match slots.iter().position(|s| s.id == id) {
            Some(pos) => {
                slots.remove(pos).active.store(false, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Deliver an event to one registration only.
    pub fn deliver_to(&self, id: u64, event: &E) {
        let slot = self
            .slots
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned();
        if let Some(slot) = slot {
            slot.deliver(event);
        }
    }

    fn live(&self) -> Vec<Arc<Slot<K, E>>> {
        self.slots.lock().unwrap().clone()
    }
}

impl<K, E> Default for SubscriberSet<K, E>
where
    K: Send + Sync + 'static,
    E: 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one registration. Cancelling is synchronous and idempotent;
/// dropping the token cancels too.
pub struct CancelToken {
    id: u64,
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CancelToken {
    /// Wrap a cancellation callback.
    pub fn new<F>(id: u64, cancel: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A token with nothing to cancel.
    pub fn noop() -> Self {
        Self { id: 0, cancel: None }
    }

    /// Registration id, usable with `SubscriberSet::deliver_to`.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancel now.
    pub fn cancel(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for CancelToken {
    fn drop(&mut self) {
        self.run();
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("id", &self.id)
            .field("live", &self.cancel.is_some())
            .finish()
    }
}
