//! Error types for the reconnecting socket.
//!
//! Nothing on the reconnect path is reported through these errors; retries
//! and terminal closes are observable only through the event stream. The
//! variants here cover caller misuse, configuration mistakes and transport
//! failures raised synchronously by a socket or its factory.

use thiserror::Error;

/// Result type alias for reconnecting socket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a reconnecting socket.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// No open underlying socket is available (never opened, explicitly
    /// closed, or between a transient close and the next reconnect).
    #[error("Not connected: no open socket")]
    NotConnected,

    /// The underlying socket reports that it has been closed.
    #[error("Connection closed: {0:?}")]
    ConnectionClosed(Option<u16>),

    /// Invalid close code for an explicit close.
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Rejected reconnect configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Rejected endpoint (url or subprotocol list).
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Failure reported by the socket factory or the transport itself.
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O failure from a [`Socket`](crate::Socket) or
    /// [`SocketFactory`](crate::SocketFactory) implementation. Implementors
    /// dialing real transports can propagate `std::io::Error` with `?`.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
