//! Reconnecting socket against a simulated flaky server.
//!
//! Every third connection succeeds, streams a few messages and then asks the
//! client to come back later with a `delay=` hint. The other connections are
//! dropped before the handshake completes.
//!
//! Run with: RUST_LOG=rsws_reconnect=debug cargo run --example flaky_server

use std::cell::Cell;
use std::error::Error;
use std::rc::Rc;
use std::time::Duration;

use rsws_reconnect::{
    BinaryType, Builder, CloseCode, Event, EventSink, Message, ReadyState, Result, Socket,
    SocketFactory, TokioTimer, listener,
};
use tokio::task::LocalSet;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

const URL: &str = "ws://127.0.0.1:9001/ticker";

struct SimulatedSocket {
    url: String,
    state: Rc<Cell<ReadyState>>,
    binary_type: BinaryType,
}

impl Socket for SimulatedSocket {
    fn ready_state(&self) -> ReadyState {
        self.state.get()
    }

    fn send(&mut self, message: Message) -> Result<()> {
        println!("  -> {message:?}");
        Ok(())
    }

    fn close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        println!("  client close: {code} {reason:?}");
        self.state.set(ReadyState::Closed);
        Ok(())
    }

    fn binary_type(&self) -> BinaryType {
        self.binary_type
    }

    fn set_binary_type(&mut self, binary_type: BinaryType) {
        self.binary_type = binary_type;
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Default)]
struct FlakyFactory {
    connects: u32,
}

impl SocketFactory for FlakyFactory {
    type Socket = SimulatedSocket;

    fn connect(&mut self, url: &str, _protocols: &[String], events: EventSink) -> Result<SimulatedSocket> {
        self.connects += 1;
        let healthy = self.connects % 3 == 1;
        let state = Rc::new(Cell::new(ReadyState::Connecting));

        tokio::task::spawn_local(serve(healthy, Rc::clone(&state), events));

        Ok(SimulatedSocket {
            url: url.to_owned(),
            state,
            binary_type: BinaryType::default(),
        })
    }
}

async fn serve(healthy: bool, state: Rc<Cell<ReadyState>>, events: EventSink) {
    sleep(Duration::from_millis(100)).await;
    if state.get() == ReadyState::Closed {
        return;
    }

    if !healthy {
        state.set(ReadyState::Closed);
        events.error("connection reset by peer");
        events.closed(CloseCode::Abnormal, "");
        return;
    }

    state.set(ReadyState::Open);
    events.opened();
    for tick in 0..3 {
        sleep(Duration::from_millis(200)).await;
        if state.get() != ReadyState::Open {
            return;
        }
        events.message(format!("tick {tick}"));
    }
    state.set(ReadyState::Closed);
    events.closed(CloseCode::GoingAway, "rebalancing delay=1");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    LocalSet::new().run_until(run()).await
}

async fn run() -> std::result::Result<(), Box<dyn Error>> {
    let socket = Builder::new(URL)
        .protocols(["ticker.v1"])
        .max_attempts(6u32)
        .backoff_factor(1.5)
        .build(FlakyFactory::default(), TokioTimer::new())?;

    socket.set_onmessage(Some(listener(|event| {
        if let Event::Message(message) = event {
            println!("  <- {}", message.as_text().unwrap_or("<binary>"));
        }
    })));

    let mut events = socket.events();
    let mut opens = 0;
    while let Some(event) = events.next().await {
        match event {
            Event::Open(open) => {
                opens += 1;
                println!("open #{opens} after {} attempts", open.attempts);
                socket.send("subscribe")?;
                if opens == 3 {
                    break;
                }
            }
            Event::Reconnect(reconnect) => println!(
                "reconnect #{} in {:?} (close {})",
                reconnect.attempt, reconnect.delay, reconnect.code
            ),
            Event::Close(close) => {
                println!("close {} {:?} final={}", close.code, close.reason, close.is_final);
                if close.is_final {
                    return Ok(());
                }
            }
            Event::Error(error) => println!("error: {}", error.message),
            Event::Message(_) => {}
        }
    }

    socket.close(CloseCode::Normal, "done")?;
    Ok(())
}
