//! Typed event subscription and firing.
//!
//! An [`Event`] holds the listeners of one event kind in subscription order. Listeners are
//! invoked with every internal lock released, so a listener may freely subscribe, unsubscribe or
//! fire other events.
//!
//! Vetoable ("blocking") events return a verdict from each listener. [`Event::until`] stops at the
//! first listener that returns the expected verdict.
//!
//! An event can carry a teardown hook ([`Event::on_clear`]). It runs exactly once, when the last
//! listener goes away or when the event itself is dropped while still wired. Owners use it to
//! unregister the native callback they registered on the first subscription.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::sync::lock;

/// Identifies one subscription. Unique per event for the lifetime of the event.
pub type EventId = u64;

/// Verdict of a vetoable event listener.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Policy {
    #[default]
    Allow,
    Block,
}

type Callback<A, R> = Arc<dyn Fn(&A) -> R + Send + Sync>;
type Teardown = Box<dyn FnOnce() + Send>;

struct Listener<A, R> {
    callback: Callback<A, R>,
    once: bool,
}

struct Slots<A, R> {
    next_id: EventId,
    listeners: BTreeMap<EventId, Listener<A, R>>,
    on_clear: Option<Teardown>,
}

impl<A, R> Slots<A, R> {
    /// Hand out the teardown hook if nobody is listening anymore.
    fn teardown_if_empty(&mut self) -> Option<Teardown> {
        if self.listeners.is_empty() {
            self.on_clear.take()
        } else {
            None
        }
    }
}

/// Listeners for a single event kind, called with `&A` and returning `R`.
pub struct Event<A, R = ()> {
    slots: Mutex<Slots<A, R>>,
}

impl<A, R> Default for Event<A, R> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(Slots {
                next_id: 1,
                listeners: BTreeMap::new(),
                on_clear: None,
            }),
        }
    }
}

impl<A, R> fmt::Debug for Event<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = lock(&self.slots);
        f.debug_struct("Event")
            .field("listeners", &slots.listeners.len())
            .field("wired", &slots.on_clear.is_some())
            .finish()
    }
}

impl<A, R> Event<A, R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `callback`. Returns its id.
    pub fn add<F>(&self, callback: F) -> EventId
    where
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        self.insert(Arc::new(callback), false)
    }

    /// Subscribe `callback` for a single firing. It removes itself before it runs.
    pub fn once<F>(&self, callback: F) -> EventId
    where
        F: Fn(&A) -> R + Send + Sync + 'static,
    {
        self.insert(Arc::new(callback), true)
    }

    fn insert(&self, callback: Callback<A, R>, once: bool) -> EventId {
        let mut slots = lock(&self.slots);
        let id = slots.next_id;
        slots.next_id += 1;
        slots.listeners.insert(id, Listener { callback, once });
        id
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn remove(&self, id: EventId) {
        let teardown = {
            let mut slots = lock(&self.slots);
            if slots.listeners.remove(&id).is_none() {
                return;
            }
            slots.teardown_if_empty()
        };

        if let Some(teardown) = teardown {
            teardown();
        }
    }

    /// Remove every subscription.
    pub fn clear(&self) {
        let (listeners, teardown) = {
            let mut slots = lock(&self.slots);
            let listeners = std::mem::take(&mut slots.listeners);
            (listeners, slots.on_clear.take())
        };

        // Listener captures drop here, outside the lock
        drop(listeners);

        if let Some(teardown) = teardown {
            teardown();
        }
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.slots).listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).listeners.len()
    }

    /// Install the teardown hook, replacing any previous one.
    pub fn on_clear<F>(&self, teardown: F)
    where
        F: FnOnce() + Send + 'static,
    {
        lock(&self.slots).on_clear = Some(Box::new(teardown));
    }

    /// Whether a teardown hook is installed, i.e. the native side is wired.
    pub fn wired(&self) -> bool {
        lock(&self.slots).on_clear.is_some()
    }

    /// Invoke every listener, oldest first.
    pub fn fire(&self, args: &A) {
        for (id, listener) in self.snapshot() {
            if let Some(callback) = self.claim(id, listener) {
                callback(args);
            }
        }
    }

    /// Invoke listeners, oldest first, until one returns `expected`.
    ///
    /// Returns whether some listener did. Listeners after it are not called.
    pub fn until(&self, expected: R, args: &A) -> bool
    where
        R: PartialEq,
    {
        for (id, listener) in self.snapshot() {
            let Some(callback) = self.claim(id, listener) else {
                continue;
            };

            if callback(args) == expected {
                return true;
            }
        }

        false
    }

    fn snapshot(&self) -> Vec<(EventId, Listener<A, R>)> {
        lock(&self.slots)
            .listeners
            .iter()
            .map(|(id, l)| {
                (*id, Listener { callback: l.callback.clone(), once: l.once })
            })
            .collect()
    }

    /// Take ownership of a `once` listener before calling it, so a reentrant firing cannot call it
    /// a second time.
    fn claim(&self, id: EventId, listener: Listener<A, R>) -> Option<Callback<A, R>> {
        if !listener.once {
            return Some(listener.callback);
        }

        let teardown = {
            let mut slots = lock(&self.slots);
            slots.listeners.remove(&id)?;
            slots.teardown_if_empty()
        };

        if let Some(teardown) = teardown {
            teardown();
        }

        Some(listener.callback)
    }
}

impl<A, R> Drop for Event<A, R> {
    fn drop(&mut self) {
        let slots = self.slots.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(teardown) = slots.on_clear.take() {
            teardown();
        }
    }
}

/// Compile-time handle for one event of an event manager.
///
/// Implemented by marker types so `on::<Title>(...)` picks both the argument types and the slot.
pub trait EventKind: 'static {
    /// The manager holding the slot.
    type Manager;
    /// Runtime tag of the event.
    type Tag: Copy;
    type Args: Send + Sync + 'static;
    type Output: Send + 'static;

    const TAG: Self::Tag;

    fn slot(manager: &Self::Manager) -> &Event<Self::Args, Self::Output>;
}
