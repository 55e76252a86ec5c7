//! Test harness for driving a reconnecting socket deterministically.
//!
//! [`MockFactory`] hands out in-memory sockets whose remote end is steered
//! from the test through [`MockRemote`]. [`Recorder`] captures every event
//! the handle delivers.

#![allow(dead_code)]

mod mock;
mod recorder;

pub use mock::{MockFactory, MockRemote, MockSocket};
pub use recorder::Recorder;

use rsws_reconnect::{Endpoint, ManualTimer, ReconnectConfig, ReconnectingSocket};
use tracing_subscriber::EnvFilter;

pub const URL: &str = "ws://localhost:9001/feed";

/// Install a test-writer subscriber filtered by `RUST_LOG`. Safe to call
/// from every test; only the first call installs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A connected handle plus the pieces needed to drive it.
pub struct Fixture {
    pub socket: ReconnectingSocket<MockFactory, ManualTimer>,
    pub factory: MockFactory,
    pub timer: ManualTimer,
    pub events: Recorder,
}

impl Fixture {
    /// Connect with `config` and attach a recorder to every event kind.
    pub fn connect(config: ReconnectConfig) -> Self {
        init_tracing();
        let factory = MockFactory::new();
        let timer = ManualTimer::new();
        let socket = ReconnectingSocket::connect(
            Endpoint::new(URL).expect("valid url"),
            factory.clone(),
            timer.clone(),
            config,
        )
        .expect("connect");
        let events = Recorder::new();
        events.attach(&socket);
        Self {
            socket,
            factory,
            timer,
            events,
        }
    }

    /// Remote end of the most recently created socket.
    pub fn remote(&self) -> MockRemote {
        self.factory.last().expect("no socket created")
    }
}
