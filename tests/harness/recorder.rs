//! Event capture for assertions.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use rsws_reconnect::{
    CloseEvent, Event, EventKind, Listener, OpenEvent, ReconnectEvent, ReconnectingSocket,
    SocketFactory, Timer, listener,
};

/// Records every event it is attached to, in delivery order.
#[derive(Clone)]
pub struct Recorder {
    events: Rc<RefCell<Vec<Event>>>,
    listener: Listener,
}

impl Recorder {
    pub fn new() -> Self {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let listener = listener(move |event: &Event| sink.borrow_mut().push(event.clone()));
        Self { events, listener }
    }

    /// Subscribe to every event kind of `socket`.
    pub fn attach<F, T>(&self, socket: &ReconnectingSocket<F, T>)
    where
        F: SocketFactory + 'static,
        T: Timer + 'static,
    {
        for kind in EventKind::ALL {
            socket.add_event_listener(kind, self.listener());
        }
    }

    /// The listener shared by every subscription of this recorder.
    pub fn listener(&self) -> Listener {
        Rc::clone(&self.listener)
    }

    pub fn all(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.borrow().iter().map(Event::kind).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.borrow().iter().filter(|e| e.kind() == kind).count()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn opens(&self) -> Vec<OpenEvent> {
        self.collect(|event| match event {
            Event::Open(open) => Some(open.clone()),
            _ => None,
        })
    }

    pub fn closes(&self) -> Vec<CloseEvent> {
        self.collect(|event| match event {
            Event::Close(close) => Some(close.clone()),
            _ => None,
        })
    }

    pub fn reconnects(&self) -> Vec<ReconnectEvent> {
        self.collect(|event| match event {
            Event::Reconnect(reconnect) => Some(reconnect.clone()),
            _ => None,
        })
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.reconnects().into_iter().map(|r| r.delay).collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.collect(|event| match event {
            Event::Error(error) => Some(error.message.clone()),
            _ => None,
        })
    }

    pub fn texts(&self) -> Vec<String> {
        self.collect(|event| match event {
            Event::Message(message) => message.as_text().map(str::to_owned),
            _ => None,
        })
    }

    fn collect<R>(&self, f: impl Fn(&Event) -> Option<R>) -> Vec<R> {
        self.events.borrow().iter().filter_map(f).collect()
    }
}
