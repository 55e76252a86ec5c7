//! Reconnecting socket handle and its state machine.
//!
//! A [`ReconnectingSocket`] wraps a sequence of underlying sockets behind one
//! stable handle:
//!
//! 1. **Open** - a socket is created and bound; its events reach listeners
//! 2. **Transient close** - the socket closes with an eligible code and a
//!    reconnect is scheduled after the backoff delay
//! 3. **Reconnect** - the delay elapses and a fresh socket is bound
//! 4. **Terminal close** - an ineligible code, the attempt ceiling, or an
//!    explicit [`close`](ReconnectingSocket::close) ends the sequence
//!
//! ## Example
//!
//! ```rust,ignore
//! use rsws_reconnect::{Builder, EventKind, ManualTimer, listener};
//!
//! let timer = ManualTimer::new();
//! let socket = Builder::new("ws://localhost:9001")
//!     .max_attempts(5u32)
//!     .build(factory, timer.clone())?;
//!
//! socket.add_event_listener(EventKind::Close, listener(|event| println!("{event:?}")));
//! timer.advance(std::time::Duration::from_secs(1));
//! ```

mod builder;
mod reconnecting;
mod state;

pub use builder::Builder;
pub use reconnecting::ReconnectingSocket;
pub use state::ReadyState;
