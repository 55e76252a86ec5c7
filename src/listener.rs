//! Per-event-kind subscriber registry.
//!
//! Listeners are deduplicated by the address of their `Rc` allocation, so
//! registering a clone of an already registered `Rc` is a no-op and the
//! same clone removes it again. The registry is independent of any
//! particular underlying socket and outlives all of them.

use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use crate::event::{Event, EventKind};

/// Subscriber callback.
pub type Listener = Rc<dyn Fn(&Event)>;

/// Wrap a closure into a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Event) + 'static,
{
    Rc::new(f)
}

/// Handle of one registration, returned by
/// [`ListenerRegistry::subscribe`].
///
/// Ids are never reused within a kind, so a stale id can not remove a
/// listener registered later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

fn address(listener: &Listener) -> usize {
    Rc::as_ptr(listener).cast::<()>() as usize
}

#[derive(Default)]
struct ListenerSet {
    // Registration sequence -> listener; keeps delivery order stable.
    order: BTreeMap<u64, (usize, Listener)>,
    // Allocation address -> sequence. An address can not be reused while
    // the registry holds the `Rc`.
    index: HashMap<usize, u64>,
    next_seq: u64,
}

impl ListenerSet {
    fn insert(&mut self, listener: Listener) -> ListenerId {
        let addr = address(&listener);
        if let Some(&seq) = self.index.get(&addr) {
            return ListenerId(seq);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, (addr, listener));
        self.index.insert(addr, seq);
        ListenerId(seq)
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        match self.order.remove(&id.0) {
            Some((addr, _)) => self.index.remove(&addr).is_some(),
            None => false,
        }
    }

    fn remove_listener(&mut self, listener: &Listener) -> bool {
        match self.index.get(&address(listener)) {
            Some(&seq) => self.remove(ListenerId(seq)),
            None => false,
        }
    }
}

/// Subscribers for every [`EventKind`], plus one assignable handler slot per
/// kind (the `onopen`/`onmessage`/... properties).
#[derive(Default)]
pub struct ListenerRegistry {
    sets: [ListenerSet; EventKind::COUNT],
    slots: [Option<Listener>; EventKind::COUNT],
}

impl ListenerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `kind`. Registering the same listener twice
    /// keeps a single entry.
    pub fn subscribe(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        self.sets[kind.index()].insert(listener)
    }

    /// Remove `listener` from `kind`. Returns `true` if it was registered.
    pub fn unsubscribe(&mut self, kind: EventKind, listener: &Listener) -> bool {
        self.sets[kind.index()].remove_listener(listener)
    }

    /// Remove a listener by id. Returns `true` if it was registered.
    pub fn unsubscribe_id(&mut self, kind: EventKind, id: ListenerId) -> bool {
        self.sets[kind.index()].remove(id)
    }

    /// Replace the handler slot for `kind`, returning the previous handler.
    pub fn set_slot(&mut self, kind: EventKind, handler: Option<Listener>) -> Option<Listener> {
        std::mem::replace(&mut self.slots[kind.index()], handler)
    }

    /// Current handler slot for `kind`.
    #[must_use]
    pub fn slot(&self, kind: EventKind) -> Option<Listener> {
        self.slots[kind.index()].clone()
    }

    /// Number of subscribers for `kind`, excluding the handler slot.
    #[must_use]
    pub fn len(&self, kind: EventKind) -> usize {
        self.sets[kind.index()].order.len()
    }

    /// Returns `true` if nothing at all is registered for `kind`.
    #[must_use]
    pub fn is_empty(&self, kind: EventKind) -> bool {
        self.len(kind) == 0 && self.slots[kind.index()].is_none()
    }

    /// Everything that should receive an event of `kind`: subscribers in
    /// registration order, then the handler slot.
    #[must_use]
    pub fn snapshot(&self, kind: EventKind) -> Vec<Listener> {
        let set = &self.sets[kind.index()];
        set.order
            .values()
            .map(|(_, l)| Rc::clone(l))
            .chain(self.slots[kind.index()].clone())
            .collect()
    }

    /// Deliver `event` to everything registered for its kind.
    ///
    /// Listeners run while the registry is borrowed, so they must not touch
    /// it; the reconnecting socket uses [`snapshot`](Self::snapshot) and
    /// [`deliver`] instead.
    pub fn notify(&self, event: &Event) -> usize {
        deliver(&self.snapshot(event.kind()), event)
    }
}

/// Call each listener with `event`. A panicking listener is logged and
/// skipped; the remaining listeners still run. Returns the number of
/// listeners that completed.
pub fn deliver(listeners: &[Listener], event: &Event) -> usize {
    let mut delivered = 0;
    for listener in listeners {
        match catch_unwind(AssertUnwindSafe(|| listener(event))) {
            Ok(()) => delivered += 1,
            Err(_) => tracing::error!(kind = %event.kind(), "event listener panicked"),
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ErrorEvent;
    use crate::message::Message;
    use std::cell::{Cell, RefCell};

    fn counter() -> (Listener, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        (listener(move |_| c.set(c.get() + 1)), count)
    }

    fn message() -> Event {
        Event::Message(Message::text("hi"))
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let mut registry = ListenerRegistry::new();
        let (l, count) = counter();

        let a = registry.subscribe(EventKind::Message, Rc::clone(&l));
        let b = registry.subscribe(EventKind::Message, Rc::clone(&l));
        assert_eq!(a, b);
        assert_eq!(registry.len(EventKind::Message), 1);

        registry.notify(&message());
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_stale_id_does_not_remove_later_listener() {
        let mut registry = ListenerRegistry::new();
        let (first, _) = counter();
        let stale = registry.subscribe(EventKind::Message, Rc::clone(&first));
        assert!(registry.unsubscribe(EventKind::Message, &first));
        drop(first);

        // The new allocation may land at the freed address.
        let (second, count) = counter();
        let id = registry.subscribe(EventKind::Message, Rc::clone(&second));
        assert_ne!(id, stale);
        assert!(!registry.unsubscribe_id(EventKind::Message, stale));

        registry.notify(&message());
        assert_eq!(count.get(), 1);
        assert!(registry.unsubscribe_id(EventKind::Message, id));
    }

    #[test]
    fn test_same_listener_on_different_kinds() {
        let mut registry = ListenerRegistry::new();
        let (l, count) = counter();

        registry.subscribe(EventKind::Message, Rc::clone(&l));
        registry.subscribe(EventKind::Error, Rc::clone(&l));

        registry.notify(&message());
        registry.notify(&Event::Error(ErrorEvent::new("x")));
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let mut registry = ListenerRegistry::new();
        let (l, count) = counter();

        registry.subscribe(EventKind::Message, Rc::clone(&l));
        assert!(registry.unsubscribe(EventKind::Message, &l));
        assert!(!registry.unsubscribe(EventKind::Message, &l));

        registry.notify(&message());
        assert_eq!(count.get(), 0);
        assert!(registry.is_empty(EventKind::Message));
    }

    #[test]
    fn test_notify_only_matching_kind() {
        let mut registry = ListenerRegistry::new();
        let (l, count) = counter();
        registry.subscribe(EventKind::Open, l);

        assert_eq!(registry.notify(&message()), 0);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_delivery_order_follows_registration() {
        let mut registry = ListenerRegistry::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for n in 0..5 {
            let seen = Rc::clone(&seen);
            registry.subscribe(EventKind::Message, listener(move |_| seen.borrow_mut().push(n)));
        }
        registry.notify(&message());
        assert_eq!(*seen.borrow(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_slot_replaces_previous() {
        let mut registry = ListenerRegistry::new();
        let (first, first_count) = counter();
        let (second, second_count) = counter();

        assert!(registry.set_slot(EventKind::Message, Some(first)).is_none());
        let previous = registry.set_slot(EventKind::Message, Some(Rc::clone(&second)));
        assert!(previous.is_some());

        registry.notify(&message());
        assert_eq!(first_count.get(), 0);
        assert_eq!(second_count.get(), 1);
        assert!(Rc::ptr_eq(&registry.slot(EventKind::Message).unwrap(), &second));
        assert_eq!(registry.len(EventKind::Message), 0);
        assert!(!registry.is_empty(EventKind::Message));
    }

    #[test]
    fn test_panicking_listener_does_not_stop_fanout() {
        let mut registry = ListenerRegistry::new();
        let (before, before_count) = counter();
        let (after, after_count) = counter();

        registry.subscribe(EventKind::Message, before);
        registry.subscribe(EventKind::Message, listener(|_| panic!("listener bug")));
        registry.subscribe(EventKind::Message, after);

        assert_eq!(registry.notify(&message()), 2);
        assert_eq!(before_count.get(), 1);
        assert_eq!(after_count.get(), 1);
    }
}
