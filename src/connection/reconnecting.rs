use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tracing::{debug, info, trace, warn};

use crate::config::{BinaryType, Endpoint, ReconnectConfig};
use crate::connection::ReadyState;
use crate::error::{Error, Result};
use crate::event::{CloseEvent, ErrorEvent, Event, EventKind, OpenEvent, ReconnectEvent};
use crate::listener::{Listener, ListenerId, ListenerRegistry, deliver};
use crate::message::{CloseCode, CloseFrame, Message};
use crate::socket::{EventSink, EventTarget, Socket, SocketEvent, SocketFactory};
use crate::timer::{Timer, TimerHandle};

#[cfg(feature = "async-tokio")]
use crate::stream::EventStream;

/// A socket handle that survives transient disconnects.
///
/// `ReconnectingSocket` owns at most one underlying socket at a time. When
/// that socket closes with an eligible code and the attempt ceiling has not
/// been reached, a replacement is created after an exponential backoff
/// delay. Listeners are registered on the handle, not on the underlying
/// socket, so they keep receiving events across every replacement.
///
/// Close listeners only hear about the first close of a retry sequence and
/// about the close that exhausts the attempt ceiling (flagged
/// [`is_final`](CloseEvent::is_final)). Every scheduled retry is reported
/// as a [`Reconnect`](Event::Reconnect) event.
///
/// The handle is single-threaded: all events arrive on the thread that
/// drives the sockets and the timer.
///
/// ## Type Parameters
///
/// - `F`: creates the underlying sockets
/// - `T`: schedules reconnect delays
///
/// ## Example
///
/// ```rust,ignore
/// use rsws_reconnect::{Endpoint, EventKind, ReconnectConfig, ReconnectingSocket, TokioTimer, listener};
///
/// let socket = ReconnectingSocket::connect(
///     Endpoint::new("wss://example.com/feed")?,
///     factory,
///     TokioTimer::new(),
///     ReconnectConfig::default(),
/// )?;
///
/// socket.add_event_listener(EventKind::Message, listener(|event| println!("{event:?}")));
/// ```
pub struct ReconnectingSocket<F, T>
where
    F: SocketFactory + 'static,
    T: Timer + 'static,
{
    shared: Rc<Shared<F, T>>,
}

struct PendingReconnect<H> {
    token: u64,
    handle: H,
}

struct State<S, H> {
    // Last socket handed out by the factory; kept after it closes so its
    // ready state stays observable until the replacement arrives.
    socket: Option<S>,
    // Bumped on every open and explicit close.
    generation: u64,
    // Generation whose events are accepted. `None` while unbound.
    bound: Option<u64>,
    attempts: u32,
    pending: Option<PendingReconnect<H>>,
    next_token: u64,
    binary_type: BinaryType,
}

struct Shared<F: SocketFactory, T: Timer> {
    this: Weak<Self>,
    endpoint: Endpoint,
    config: ReconnectConfig,
    factory: RefCell<F>,
    timer: T,
    state: RefCell<State<F::Socket, T::Handle>>,
    listeners: Rc<RefCell<ListenerRegistry>>,
    queue: RefCell<VecDeque<(u64, SocketEvent)>>,
    dispatching: Cell<bool>,
}

impl<F, T> ReconnectingSocket<F, T>
where
    F: SocketFactory + 'static,
    T: Timer + 'static,
{
    /// Ready-state constant: connecting.
    pub const CONNECTING: ReadyState = ReadyState::Connecting;
    /// Ready-state constant: open.
    pub const OPEN: ReadyState = ReadyState::Open;
    /// Ready-state constant: closing.
    pub const CLOSING: ReadyState = ReadyState::Closing;
    /// Ready-state constant: closed.
    pub const CLOSED: ReadyState = ReadyState::Closed;

    /// Create a handle and open the first socket immediately.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a rejected configuration, or the
    /// factory's error if the first socket cannot be created.
    pub fn connect(
        endpoint: Endpoint,
        factory: F,
        timer: T,
        config: ReconnectConfig,
    ) -> Result<Self> {
        let socket = Self::new(endpoint, factory, timer, config)?;
        socket.open()?;
        Ok(socket)
    }

    /// Create a handle without opening a socket. Call [`open`](Self::open)
    /// once listeners are in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a rejected configuration.
    pub fn new(endpoint: Endpoint, factory: F, timer: T, config: ReconnectConfig) -> Result<Self> {
        config.validate()?;
        let binary_type = config.binary_type;
        let shared = Rc::new_cyclic(|this| Shared {
            this: this.clone(),
            endpoint,
            config,
            factory: RefCell::new(factory),
            timer,
            state: RefCell::new(State {
                socket: None,
                generation: 0,
                bound: None,
                attempts: 0,
                pending: None,
                next_token: 0,
                binary_type,
            }),
            listeners: Rc::new(RefCell::new(ListenerRegistry::new())),
            queue: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
        });
        Ok(Self { shared })
    }

    /// Open a new underlying socket, replacing the current one.
    ///
    /// Cancels any pending reconnect. A still-active previous socket is
    /// unbound and asked to close with 1000.
    ///
    /// # Errors
    ///
    /// Returns the factory's error if the socket cannot be created. No
    /// reconnect is scheduled in that case.
    pub fn open(&self) -> Result<()> {
        self.shared.guarded(|| self.shared.open_socket())
    }

    /// Close the current socket and stop reconnecting.
    ///
    /// Pending reconnects are cancelled and the attempt counter is reset.
    /// No further events are delivered until [`open`](Self::open) is called
    /// again.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCloseCode`] for codes that must not be sent
    /// (1004-1006, 1015), before any state changes. Errors from the
    /// socket's own close are returned after the handle has been shut down.
    pub fn close(&self, code: CloseCode, reason: &str) -> Result<()> {
        if code.is_reserved() {
            return Err(Error::InvalidCloseCode(code.as_u16()));
        }
        self.shared.guarded(|| self.shared.shutdown(code, reason))
    }

    /// Send a data message on the current socket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] when no socket is open, including
    /// the gap between a transient close and the next reconnect. Transport
    /// errors from the socket are passed through.
    pub fn send(&self, message: impl Into<Message>) -> Result<()> {
        let message = message.into();
        self.shared.guarded(|| {
            let mut state = self.shared.state.borrow_mut();
            let bound = state.bound.is_some();
            match state.socket.as_mut() {
                Some(socket) if bound && socket.ready_state().can_send() => socket.send(message),
                _ => Err(Error::NotConnected),
            }
        })
    }

    /// Register `listener` for events of `kind`. Registering the same
    /// listener twice for one kind has no further effect.
    pub fn add_event_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        self.shared.listeners.borrow_mut().subscribe(kind, listener)
    }

    /// Remove `listener` from `kind`. Returns `true` if it was registered.
    pub fn remove_event_listener(&self, kind: EventKind, listener: &Listener) -> bool {
        self.shared.listeners.borrow_mut().unsubscribe(kind, listener)
    }

    /// Remove a listener by the id returned from
    /// [`add_event_listener`](Self::add_event_listener).
    pub fn remove_event_listener_by_id(&self, kind: EventKind, id: ListenerId) -> bool {
        self.shared.listeners.borrow_mut().unsubscribe_id(kind, id)
    }

    /// Alias of [`add_event_listener`](Self::add_event_listener).
    #[inline]
    pub fn add_listener(&self, kind: EventKind, listener: Listener) -> ListenerId {
        self.add_event_listener(kind, listener)
    }

    /// Alias of [`remove_event_listener`](Self::remove_event_listener).
    #[inline]
    pub fn remove_listener(&self, kind: EventKind, listener: &Listener) -> bool {
        self.remove_event_listener(kind, listener)
    }

    /// Number of listeners registered for `kind`, excluding the handler slot.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.shared.listeners.borrow().len(kind)
    }

    /// Assign the single handler slot for `kind`, returning the previous one.
    pub fn set_handler(&self, kind: EventKind, handler: Option<Listener>) -> Option<Listener> {
        self.shared.listeners.borrow_mut().set_slot(kind, handler)
    }

    /// The handler slot for `kind`.
    #[must_use]
    pub fn handler(&self, kind: EventKind) -> Option<Listener> {
        self.shared.listeners.borrow().slot(kind)
    }

    /// Assign the `onopen` handler.
    pub fn set_onopen(&self, handler: Option<Listener>) -> Option<Listener> {
        self.set_handler(EventKind::Open, handler)
    }

    /// Assign the `onmessage` handler.
    pub fn set_onmessage(&self, handler: Option<Listener>) -> Option<Listener> {
        self.set_handler(EventKind::Message, handler)
    }

    /// Assign the `onerror` handler.
    pub fn set_onerror(&self, handler: Option<Listener>) -> Option<Listener> {
        self.set_handler(EventKind::Error, handler)
    }

    /// Assign the `onclose` handler.
    pub fn set_onclose(&self, handler: Option<Listener>) -> Option<Listener> {
        self.set_handler(EventKind::Close, handler)
    }

    /// The `onopen` handler.
    #[must_use]
    pub fn onopen(&self) -> Option<Listener> {
        self.handler(EventKind::Open)
    }

    /// The `onmessage` handler.
    #[must_use]
    pub fn onmessage(&self) -> Option<Listener> {
        self.handler(EventKind::Message)
    }

    /// The `onerror` handler.
    #[must_use]
    pub fn onerror(&self) -> Option<Listener> {
        self.handler(EventKind::Error)
    }

    /// The `onclose` handler.
    #[must_use]
    pub fn onclose(&self) -> Option<Listener> {
        self.handler(EventKind::Close)
    }

    /// Stream of every event delivered to listeners from now on.
    ///
    /// Dropping the stream unregisters it. The stream ends when the handle
    /// is dropped.
    #[cfg(feature = "async-tokio")]
    #[must_use]
    pub fn events(&self) -> EventStream {
        self.events_of(&EventKind::ALL)
    }

    /// Stream of events of the given kinds.
    #[cfg(feature = "async-tokio")]
    #[must_use]
    pub fn events_of(&self, kinds: &[EventKind]) -> EventStream {
        EventStream::subscribe(&self.shared.listeners, kinds)
    }

    /// Ready state of the current socket; `Closed` when there is none.
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.shared
            .state
            .borrow()
            .socket
            .as_ref()
            .map_or(ReadyState::Closed, Socket::ready_state)
    }

    /// Binary type applied to every socket.
    #[must_use]
    pub fn binary_type(&self) -> BinaryType {
        self.shared.state.borrow().binary_type
    }

    /// Change the binary type of the current socket and of every future one.
    pub fn set_binary_type(&self, binary_type: BinaryType) {
        self.shared.guarded(|| {
            let mut state = self.shared.state.borrow_mut();
            state.binary_type = binary_type;
            if let Some(socket) = state.socket.as_mut() {
                socket.set_binary_type(binary_type);
            }
        });
    }

    /// Bytes queued on the current socket; `None` when there is no socket.
    #[must_use]
    pub fn buffered_amount(&self) -> Option<usize> {
        self.with_socket(Socket::buffered_amount)
    }

    /// Extensions negotiated by the current socket.
    #[must_use]
    pub fn extensions(&self) -> Option<String> {
        self.with_socket(Socket::extensions)
    }

    /// Subprotocol negotiated by the current socket.
    #[must_use]
    pub fn protocol(&self) -> Option<String> {
        self.with_socket(Socket::protocol)
    }

    /// Url of the current socket, or of the endpoint when there is none.
    #[must_use]
    pub fn url(&self) -> String {
        self.with_socket(|socket| socket.url().to_owned())
            .unwrap_or_else(|| self.shared.endpoint.url().to_owned())
    }

    /// Consecutive reconnects since the last successful open.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.shared.state.borrow().attempts
    }

    /// Whether a reconnect timer is armed.
    #[must_use]
    pub fn is_reconnect_pending(&self) -> bool {
        self.shared.state.borrow().pending.is_some()
    }

    /// The configuration this handle was created with.
    #[must_use]
    pub fn config(&self) -> &ReconnectConfig {
        &self.shared.config
    }

    /// The endpoint every socket connects to.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.shared.endpoint
    }

    fn with_socket<R>(&self, f: impl FnOnce(&F::Socket) -> R) -> Option<R> {
        self.shared.state.borrow().socket.as_ref().map(f)
    }
}

impl<F, T> Drop for ReconnectingSocket<F, T>
where
    F: SocketFactory + 'static,
    T: Timer + 'static,
{
    fn drop(&mut self) {
        let result = self
            .shared
            .guarded(|| self.shared.shutdown(CloseCode::GoingAway, ""));
        if let Err(err) = result {
            trace!(error = %err, "close on drop failed");
        }
    }
}

impl<F, T> std::fmt::Debug for ReconnectingSocket<F, T>
where
    F: SocketFactory + 'static,
    T: Timer + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectingSocket")
            .field("url", &self.shared.endpoint.url())
            .field("ready_state", &self.ready_state())
            .field("attempts", &self.attempts())
            .field("reconnect_pending", &self.is_reconnect_pending())
            .finish()
    }
}

impl<F, T> Shared<F, T>
where
    F: SocketFactory + 'static,
    T: Timer + 'static,
{
    /// Run `f` with event processing deferred. Events emitted by sockets
    /// while `f` holds internal borrows are queued and handled once `f`
    /// returns.
    fn guarded<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.dispatching.replace(true) {
            return f();
        }
        let result = {
            let _reset = DispatchReset(&self.dispatching);
            f()
        };
        self.drain();
        result
    }

    fn drain(&self) {
        if self.dispatching.replace(true) {
            return;
        }
        let _reset = DispatchReset(&self.dispatching);
        while let Some((generation, event)) = self.next_queued() {
            if self.state.borrow().bound != Some(generation) {
                trace!(generation, "dropping event from unbound socket");
                continue;
            }
            self.handle_event(event);
        }
    }

    fn next_queued(&self) -> Option<(u64, SocketEvent)> {
        self.queue.borrow_mut().pop_front()
    }

    fn handle_event(&self, event: SocketEvent) {
        match event {
            SocketEvent::Open => self.on_open(),
            SocketEvent::Message(message) => {
                trace!(len = message.len(), "message received");
                self.notify(Event::Message(message));
            }
            SocketEvent::Error(description) => self.on_error(description),
            SocketEvent::Close(frame) => self.on_close(frame),
        }
    }

    fn notify(&self, event: Event) {
        let listeners = self.listeners.borrow().snapshot(event.kind());
        deliver(&listeners, &event);
    }

    fn on_open(&self) {
        let event = {
            let mut state = self.state.borrow_mut();
            let attempts = std::mem::take(&mut state.attempts);
            match state.socket.as_ref() {
                Some(socket) => OpenEvent {
                    attempts,
                    url: socket.url().to_owned(),
                    protocol: socket.protocol(),
                    extensions: socket.extensions(),
                },
                None => OpenEvent {
                    attempts,
                    url: self.endpoint.url().to_owned(),
                    protocol: String::new(),
                    extensions: String::new(),
                },
            }
        };
        debug!(url = %event.url, attempts = event.attempts, "socket open");
        self.notify(Event::Open(event));
    }

    fn on_error(&self, description: String) {
        let closed = self
            .state
            .borrow()
            .socket
            .as_ref()
            .is_some_and(|socket| socket.ready_state() == ReadyState::Closed);
        // Closing sockets commonly report an error right before the close.
        if closed {
            trace!(error = %description, "suppressing error from closed socket");
            return;
        }
        debug!(error = %description, "socket error");
        self.notify(Event::Error(ErrorEvent::new(description)));
    }

    fn on_close(&self, frame: CloseFrame) {
        let (attempts, generation) = {
            let mut state = self.state.borrow_mut();
            state.bound = None;
            (state.attempts, state.generation)
        };
        self.close_cycle(frame, attempts, generation);
    }

    fn close_cycle(&self, frame: CloseFrame, attempts: u32, generation: u64) {
        let max = self.config.max_attempts;
        let is_final = max.is_reached(attempts);

        if attempts == 0 || is_final {
            self.notify(Event::Close(CloseEvent {
                code: frame.code,
                reason: frame.reason.clone(),
                is_final,
            }));
        }

        // A close listener may have closed or reopened the handle.
        if self.state.borrow().generation != generation {
            return;
        }

        if self.config.is_eligible(frame.code) && max.permits(attempts) {
            self.schedule_reconnect(frame);
            return;
        }

        warn!(
            code = %frame.code,
            reason = %frame.reason,
            attempts,
            "socket closed, not reconnecting"
        );
    }

    fn schedule_reconnect(&self, frame: CloseFrame) {
        let (attempt, delay, token) = {
            let mut state = self.state.borrow_mut();
            let delay = self
                .config
                .backoff()
                .next_delay(state.attempts, &frame.reason);
            state.attempts = state.attempts.saturating_add(1);
            state.next_token += 1;
            (state.attempts, delay, state.next_token)
        };

        let this = self.this.clone();
        let handle = self.timer.schedule(
            delay,
            Box::new(move || {
                if let Some(shared) = this.upgrade() {
                    shared.reconnect_due(token);
                }
            }),
        );
        let stale = self
            .state
            .borrow_mut()
            .pending
            .replace(PendingReconnect { token, handle });
        if let Some(stale) = stale {
            stale.handle.cancel();
        }

        info!(attempt, ?delay, code = %frame.code, "reconnect scheduled");
        self.notify(Event::Reconnect(ReconnectEvent {
            attempt,
            delay,
            code: frame.code,
            reason: frame.reason,
        }));
    }

    fn reconnect_due(&self, token: u64) {
        let is_current = {
            let mut state = self.state.borrow_mut();
            let is_current = state.pending.as_ref().is_some_and(|p| p.token == token);
            if is_current {
                // Already fired; nothing left to cancel.
                state.pending = None;
            }
            is_current
        };
        if !is_current {
            trace!(token, "ignoring stale reconnect timer");
            return;
        }

        debug!(url = self.endpoint.url(), "reconnecting");
        self.guarded(|| {
            if let Err(err) = self.open_socket() {
                self.connect_failed(err);
            }
        });
    }

    fn connect_failed(&self, err: Error) {
        warn!(error = %err, url = self.endpoint.url(), "failed to create socket");
        let (attempts, generation) = {
            let state = self.state.borrow();
            (state.attempts, state.generation)
        };
        self.notify(Event::Error(ErrorEvent::new(err.to_string())));
        if self.state.borrow().generation != generation {
            return;
        }
        self.close_cycle(CloseFrame::abnormal(), attempts, generation);
    }

    fn open_socket(&self) -> Result<()> {
        let (generation, binary_type, previous, stale) = {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.bound = None;
            (
                state.generation,
                state.binary_type,
                state.socket.take(),
                state.pending.take(),
            )
        };
        if let Some(stale) = stale {
            stale.handle.cancel();
        }
        if let Some(previous) = previous {
            retire(previous);
        }

        let target: Weak<dyn EventTarget> = self.this.clone();
        let sink = EventSink::new(target, generation);
        debug!(url = self.endpoint.url(), generation, "creating socket");
        let mut socket = self.factory.borrow_mut().connect(
            self.endpoint.url(),
            self.endpoint.protocols(),
            sink,
        )?;
        socket.set_binary_type(binary_type);

        let mut state = self.state.borrow_mut();
        state.socket = Some(socket);
        state.bound = Some(generation);
        Ok(())
    }

    fn shutdown(&self, code: CloseCode, reason: &str) -> Result<()> {
        let (socket, pending) = {
            let mut state = self.state.borrow_mut();
            state.generation += 1;
            state.bound = None;
            state.attempts = 0;
            (state.socket.take(), state.pending.take())
        };
        if let Some(pending) = pending {
            pending.handle.cancel();
        }
        match socket {
            Some(mut socket) if is_closable(socket.ready_state()) => {
                debug!(%code, reason, "closing socket");
                socket.close(code, reason)
            }
            _ => Ok(()),
        }
    }
}

impl<F, T> EventTarget for Shared<F, T>
where
    F: SocketFactory + 'static,
    T: Timer + 'static,
{
    fn dispatch(&self, generation: u64, event: SocketEvent) {
        self.queue.borrow_mut().push_back((generation, event));
        self.drain();
    }
}

/// Clears the dispatching flag on scope exit, including when a socket or
/// factory panics mid-operation.
struct DispatchReset<'a>(&'a Cell<bool>);

impl Drop for DispatchReset<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

const fn is_closable(state: ReadyState) -> bool {
    matches!(state, ReadyState::Connecting | ReadyState::Open)
}

fn retire<S: Socket>(mut socket: S) {
    if is_closable(socket.ready_state()) {
        if let Err(err) = socket.close(CloseCode::Normal, "") {
            trace!(error = %err, "failed to close replaced socket");
        }
    }
}
