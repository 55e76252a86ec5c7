//! In-memory sockets with a test-controlled remote end.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use rsws_reconnect::{
    BinaryType, CloseCode, Error, EventSink, Message, ReadyState, Result, Socket, SocketFactory,
};

struct MockState {
    protocols: Vec<String>,
    ready_state: ReadyState,
    binary_type: BinaryType,
    buffered: usize,
    sent: Vec<Message>,
    close_requests: Vec<(CloseCode, String)>,
    sink: EventSink,
}

/// Socket produced by [`MockFactory`].
pub struct MockSocket {
    url: String,
    inner: Rc<RefCell<MockState>>,
}

impl Socket for MockSocket {
    fn ready_state(&self) -> ReadyState {
        self.inner.borrow().ready_state
    }

    fn send(&mut self, message: Message) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.ready_state != ReadyState::Open {
            return Err(Error::ConnectionClosed(None));
        }
        inner.buffered += message.len();
        inner.sent.push(message);
        Ok(())
    }

    fn close(&mut self, code: CloseCode, reason: &str) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.close_requests.push((code, reason.to_owned()));
        inner.ready_state = ReadyState::Closing;
        Ok(())
    }

    fn binary_type(&self) -> BinaryType {
        self.inner.borrow().binary_type
    }

    fn set_binary_type(&mut self, binary_type: BinaryType) {
        self.inner.borrow_mut().binary_type = binary_type;
    }

    fn buffered_amount(&self) -> usize {
        self.inner.borrow().buffered
    }

    fn extensions(&self) -> String {
        "permessage-deflate".to_owned()
    }

    fn protocol(&self) -> String {
        let inner = self.inner.borrow();
        if inner.ready_state == ReadyState::Open {
            inner.protocols.first().cloned().unwrap_or_default()
        } else {
            String::new()
        }
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Test-side view of one [`MockSocket`].
///
/// Every method that emits an event releases the socket state before
/// emitting, so listeners may freely query the handle.
#[derive(Clone)]
pub struct MockRemote {
    inner: Rc<RefCell<MockState>>,
}

impl MockRemote {
    fn transition(&self, state: ReadyState) -> EventSink {
        let mut inner = self.inner.borrow_mut();
        inner.ready_state = state;
        inner.sink.clone()
    }

    /// Complete the handshake.
    pub fn open(&self) {
        self.transition(ReadyState::Open).opened();
    }

    /// Deliver a data message.
    pub fn message(&self, message: impl Into<Message>) {
        let sink = self.inner.borrow().sink.clone();
        sink.message(message);
    }

    /// Report an error without changing state.
    pub fn error(&self, description: &str) {
        let sink = self.inner.borrow().sink.clone();
        sink.error(description);
    }

    /// Close from the remote side.
    pub fn close(&self, code: u16, reason: &str) {
        self.transition(ReadyState::Closed).closed(code, reason);
    }

    /// Drop the connection the way browsers do: an error on the already
    /// closed socket, then a 1006 close.
    pub fn drop_connection(&self) {
        let sink = self.transition(ReadyState::Closed);
        sink.error("connection reset");
        sink.closed(CloseCode::Abnormal, "");
    }

    pub fn ready_state(&self) -> ReadyState {
        self.inner.borrow().ready_state
    }

    pub fn binary_type(&self) -> BinaryType {
        self.inner.borrow().binary_type
    }

    pub fn protocols(&self) -> Vec<String> {
        self.inner.borrow().protocols.clone()
    }

    pub fn sent(&self) -> Vec<Message> {
        self.inner.borrow().sent.clone()
    }

    pub fn close_requests(&self) -> Vec<(CloseCode, String)> {
        self.inner.borrow().close_requests.clone()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.borrow().sink.is_attached()
    }
}

#[derive(Default)]
struct FactoryState {
    sockets: Vec<MockRemote>,
    calls: usize,
    failures: usize,
    panics: bool,
    io_failure: bool,
    auto_open: bool,
}

/// Factory handing out [`MockSocket`]s. Clones share the same record of
/// created sockets.
#[derive(Clone, Default)]
pub struct MockFactory {
    state: Rc<RefCell<FactoryState>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sockets open synchronously, from inside `connect`.
    pub fn auto_open(self) -> Self {
        self.state.borrow_mut().auto_open = true;
        self
    }

    /// Make the next `count` connect calls fail.
    pub fn fail_next(&self, count: usize) {
        self.state.borrow_mut().failures = count;
    }

    /// Make the next connect call fail the way a real dialer does, with a
    /// `std::io::Error` raised through `?`.
    pub fn refuse_next(&self) {
        self.state.borrow_mut().io_failure = true;
    }

    /// Make the next connect call panic.
    pub fn panic_next(&self) {
        self.state.borrow_mut().panics = true;
    }

    /// Number of connect calls, including failed ones.
    pub fn calls(&self) -> usize {
        self.state.borrow().calls
    }

    /// Number of sockets created.
    pub fn created(&self) -> usize {
        self.state.borrow().sockets.len()
    }

    pub fn socket(&self, index: usize) -> MockRemote {
        self.state.borrow().sockets[index].clone()
    }

    pub fn last(&self) -> Option<MockRemote> {
        self.state.borrow().sockets.last().cloned()
    }
}

impl SocketFactory for MockFactory {
    type Socket = MockSocket;

    fn connect(&mut self, url: &str, protocols: &[String], events: EventSink) -> Result<MockSocket> {
        let auto_open = {
            let mut state = self.state.borrow_mut();
            state.calls += 1;
            if std::mem::take(&mut state.panics) {
                drop(state);
                panic!("socket factory bug");
            }
            if std::mem::take(&mut state.io_failure) {
                Err::<(), _>(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"))?;
            }
            if state.failures > 0 {
                state.failures -= 1;
                return Err(Error::Transport("connection refused".into()));
            }
            state.auto_open
        };

        let inner = Rc::new(RefCell::new(MockState {
            protocols: protocols.to_vec(),
            ready_state: ReadyState::Connecting,
            binary_type: BinaryType::default(),
            buffered: 0,
            sent: Vec::new(),
            close_requests: Vec::new(),
            sink: events,
        }));
        let remote = MockRemote {
            inner: Rc::clone(&inner),
        };
        self.state.borrow_mut().sockets.push(remote.clone());
        if auto_open {
            remote.open();
        }
        Ok(MockSocket {
            url: url.to_owned(),
            inner,
        })
    }
}
