//! # rsws-reconnect - Self-healing WebSocket handle
//!
//! `rsws-reconnect` wraps a browser-style WebSocket in a handle that
//! transparently replaces the underlying socket when it drops, using
//! exponential backoff and a bounded number of attempts.
//!
//! ## Features
//!
//! - **Stable listener set** that survives every reconnect
//! - **Exponential backoff** with server-provided `delay=<seconds>` hints
//! - **Quiet retry loops**: close listeners see only the first close and the
//!   final one
//! - **Sans-io core**: sockets and timers are supplied by the host through
//!   [`SocketFactory`] and [`Timer`]
//! - **Tokio integration** with [`TokioTimer`] and an async [`EventStream`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rsws_reconnect::{Endpoint, EventKind, ReconnectConfig, ReconnectingSocket, TokioTimer, listener};
//!
//! let socket = ReconnectingSocket::connect(
//!     Endpoint::new("wss://example.com/feed")?,
//!     factory,
//!     TokioTimer::new(),
//!     ReconnectConfig::default().with_max_attempts(5u32),
//! )?;
//!
//! socket.add_event_listener(EventKind::Message, listener(|event| println!("{event:?}")));
//! ```

pub mod backoff;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod listener;
pub mod message;
pub mod socket;
pub mod timer;

#[cfg(feature = "async-tokio")]
pub mod stream;

pub use backoff::{BackoffPolicy, parse_delay_hint};
pub use config::{BinaryType, Endpoint, MaxAttempts, ReconnectConfig};
pub use connection::{Builder, ReadyState, ReconnectingSocket};
pub use error::{Error, Result};
pub use event::{CloseEvent, ErrorEvent, Event, EventKind, OpenEvent, ReconnectEvent};
pub use listener::{Listener, ListenerId, ListenerRegistry, listener};
pub use message::{CloseCode, CloseFrame, Message};
pub use socket::{EventSink, Socket, SocketEvent, SocketFactory};
pub use timer::{ManualTimer, ManualTimerHandle, Timer, TimerCallback, TimerHandle};

#[cfg(feature = "async-tokio")]
pub use stream::EventStream;
#[cfg(feature = "async-tokio")]
pub use timer::{TokioTimer, TokioTimerHandle};
