//! Events delivered to subscribers of a reconnecting socket.

use std::time::Duration;

use crate::message::{CloseCode, Message};

/// Kinds of events a subscriber can register for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// An underlying socket reached the open state.
    Open,
    /// A data message arrived.
    Message,
    /// The underlying socket reported an error.
    Error,
    /// A close at the boundary of a retry sequence.
    Close,
    /// A reconnect has been scheduled.
    Reconnect,
}

impl EventKind {
    /// Number of event kinds.
    pub const COUNT: usize = 5;

    /// All event kinds.
    pub const ALL: [EventKind; Self::COUNT] = [
        EventKind::Open,
        EventKind::Message,
        EventKind::Error,
        EventKind::Close,
        EventKind::Reconnect,
    ];

    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    /// DOM event name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::Open => "open",
            EventKind::Message => "message",
            EventKind::Error => "error",
            EventKind::Close => "close",
            EventKind::Reconnect => "reconnect",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A new underlying socket has opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenEvent {
    /// Reconnect attempts consumed before this open. Zero for a first connect.
    pub attempts: u32,
    /// Url reported by the new socket.
    pub url: String,
    /// Subprotocol negotiated by the new socket, empty if none.
    pub protocol: String,
    /// Extensions negotiated by the new socket, empty if none.
    pub extensions: String,
}

/// Error reported by the underlying socket or its factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    /// Human-readable description.
    pub message: String,
}

impl ErrorEvent {
    /// Create an error event.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Close surfaced to subscribers.
///
/// Only the first close of a retry sequence and the close that exhausts
/// the attempt ceiling are surfaced; the latter has `is_final` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// Close code reported by the socket.
    pub code: CloseCode,
    /// Close reason reported by the socket.
    pub reason: String,
    /// `true` when the attempt ceiling has been reached and no further
    /// reconnect will happen.
    pub is_final: bool,
}

/// A reconnect has been armed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectEvent {
    /// Attempt number of the upcoming reconnect, starting at 1.
    pub attempt: u32,
    /// Time until the reconnect fires.
    pub delay: Duration,
    /// Close code that triggered the reconnect.
    pub code: CloseCode,
    /// Close reason that triggered the reconnect.
    pub reason: String,
}

/// Event delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// See [`OpenEvent`].
    Open(OpenEvent),
    /// Data message, passed through unchanged.
    Message(Message),
    /// See [`ErrorEvent`].
    Error(ErrorEvent),
    /// See [`CloseEvent`].
    Close(CloseEvent),
    /// See [`ReconnectEvent`].
    Reconnect(ReconnectEvent),
}

impl Event {
    /// The kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Event::Open(_) => EventKind::Open,
            Event::Message(_) => EventKind::Message,
            Event::Error(_) => EventKind::Error,
            Event::Close(_) => EventKind::Close,
            Event::Reconnect(_) => EventKind::Reconnect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_index_is_dense() {
        for (i, kind) in EventKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_event_kind() {
        assert_eq!(Event::Message(Message::text("x")).kind(), EventKind::Message);
        assert_eq!(
            Event::Error(ErrorEvent::new("boom")).kind(),
            EventKind::Error
        );
        assert_eq!(EventKind::Reconnect.to_string(), "reconnect");
    }
}
