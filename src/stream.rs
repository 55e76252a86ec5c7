//! Async stream adapter over the listener registry.

use std::cell::RefCell;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use tokio::sync::mpsc;

use crate::event::{Event, EventKind};
use crate::listener::{ListenerId, ListenerRegistry, listener};

/// Events of a [`ReconnectingSocket`](crate::ReconnectingSocket) as a
/// [`Stream`](futures_core::Stream).
///
/// Created by [`events`](crate::ReconnectingSocket::events). Events are
/// buffered without bound until polled. Dropping the stream removes its
/// listeners; the stream ends once the socket handle is gone.
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<Event>,
    subscription: Subscription,
}

struct Subscription {
    registry: Weak<RefCell<ListenerRegistry>>,
    entries: Vec<(EventKind, ListenerId)>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        // May run inside a listener callback, when the registry is free.
        if let Ok(mut registry) = registry.try_borrow_mut() {
            for (kind, id) in self.entries.drain(..) {
                registry.unsubscribe_id(kind, id);
            }
        }
    }
}

impl EventStream {
    pub(crate) fn subscribe(registry: &Rc<RefCell<ListenerRegistry>>, kinds: &[EventKind]) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let forward = listener(move |event: &Event| {
            // Receiver gone means the stream is being dropped.
            let _ = sender.send(event.clone());
        });

        let mut registry_mut = registry.borrow_mut();
        let entries = kinds
            .iter()
            .map(|&kind| (kind, registry_mut.subscribe(kind, Rc::clone(&forward))))
            .collect();
        drop(registry_mut);

        Self {
            receiver,
            subscription: Subscription {
                registry: Rc::downgrade(registry),
                entries,
            },
        }
    }

    /// Wait for the next event. Returns `None` once the socket handle is
    /// dropped and every buffered event has been taken.
    pub async fn next(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Take a buffered event without waiting.
    pub fn try_next(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

impl futures_core::Stream for EventStream {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("kinds", &self.subscription.entries.len())
            .finish()
    }
}
