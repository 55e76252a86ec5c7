//! Boundary to the underlying transport.
//!
//! A [`SocketFactory`] creates one [`Socket`] per connection attempt and hands
//! it an [`EventSink`]. The socket reports its lifecycle through the sink;
//! the reconnecting handle decides which sinks are still bound and silently
//! drops events from the rest.
//!
//! Framing, TLS, handshakes and payload encoding all live behind this
//! boundary.

use std::rc::Weak;

use crate::config::BinaryType;
use crate::connection::ReadyState;
use crate::error::Result;
use crate::message::{CloseCode, CloseFrame, Message};

/// Lifecycle notification from an underlying socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The socket reached the open state.
    Open,
    /// A data message arrived.
    Message(Message),
    /// A transport error occurred.
    Error(String),
    /// The socket closed.
    Close(CloseFrame),
}

/// An established or in-progress connection produced by a [`SocketFactory`].
pub trait Socket {
    /// Current ready state.
    fn ready_state(&self) -> ReadyState;

    /// Queue a data message for transmission.
    ///
    /// # Errors
    ///
    /// Transport-specific; typically [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// when the socket is not open.
    fn send(&mut self, message: Message) -> Result<()>;

    /// Start the close handshake.
    ///
    /// # Errors
    ///
    /// Transport-specific.
    fn close(&mut self, code: CloseCode, reason: &str) -> Result<()>;

    /// How binary messages are surfaced.
    fn binary_type(&self) -> BinaryType;

    /// Change how binary messages are surfaced.
    fn set_binary_type(&mut self, binary_type: BinaryType);

    /// Bytes queued by `send` but not yet transmitted.
    fn buffered_amount(&self) -> usize {
        0
    }

    /// Extensions negotiated by the server.
    fn extensions(&self) -> String {
        String::new()
    }

    /// Subprotocol selected by the server.
    fn protocol(&self) -> String {
        String::new()
    }

    /// Url this socket connected to.
    fn url(&self) -> &str;
}

/// Creates a fresh [`Socket`] for every connection attempt.
pub trait SocketFactory {
    /// Socket type produced by this factory.
    type Socket: Socket + 'static;

    /// Start connecting to `url` offering `protocols`.
    ///
    /// The returned socket must report its lifecycle through `events`. It
    /// may do so immediately, even before `connect` returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot even be created (invalid url,
    /// blocked port). Connection failures after creation are reported as a
    /// close event instead.
    fn connect(
        &mut self,
        url: &str,
        protocols: &[String],
        events: EventSink,
    ) -> Result<Self::Socket>;
}

pub(crate) trait EventTarget {
    fn dispatch(&self, generation: u64, event: SocketEvent);
}

struct Detached;

impl EventTarget for Detached {
    fn dispatch(&self, _generation: u64, _event: SocketEvent) {}
}

/// Channel from one underlying socket back to the handle that created it.
///
/// Each sink is tagged with the generation of the socket it was issued to.
/// Once the handle moves on to another socket, or is dropped, everything
/// emitted through an old sink is discarded.
#[derive(Clone)]
pub struct EventSink {
    target: Weak<dyn EventTarget>,
    generation: u64,
}

impl EventSink {
    pub(crate) fn new(target: Weak<dyn EventTarget>, generation: u64) -> Self {
        Self { target, generation }
    }

    /// A sink that is not connected to any handle. Useful for driving a
    /// socket implementation in isolation.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(Weak::<Detached>::new(), 0)
    }

    /// Report an event to the owning handle.
    pub fn emit(&self, event: SocketEvent) {
        if let Some(target) = self.target.upgrade() {
            target.dispatch(self.generation, event);
        }
    }

    /// Shorthand for `emit(SocketEvent::Open)`.
    pub fn opened(&self) {
        self.emit(SocketEvent::Open);
    }

    /// Shorthand for `emit(SocketEvent::Message(..))`.
    pub fn message(&self, message: impl Into<Message>) {
        self.emit(SocketEvent::Message(message.into()));
    }

    /// Shorthand for `emit(SocketEvent::Error(..))`.
    pub fn error(&self, description: impl Into<String>) {
        self.emit(SocketEvent::Error(description.into()));
    }

    /// Shorthand for `emit(SocketEvent::Close(..))`.
    pub fn closed(&self, code: impl Into<CloseCode>, reason: impl Into<String>) {
        self.emit(SocketEvent::Close(CloseFrame::new(code.into(), reason)));
    }

    /// Whether the owning handle still exists.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.target.strong_count() > 0
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("generation", &self.generation)
            .field("attached", &self.is_attached())
            .finish()
    }
}
