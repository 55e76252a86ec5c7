use crate::config::{BinaryType, Endpoint, MaxAttempts, ReconnectConfig};
use crate::connection::ReconnectingSocket;
use crate::error::Result;
use crate::message::CloseCode;
use crate::socket::SocketFactory;
use crate::timer::Timer;

/// Step-by-step construction of a [`ReconnectingSocket`].
///
/// ```rust,ignore
/// let socket = Builder::new("wss://example.com/feed")
///     .protocols(["chat"])
///     .max_attempts(5)
///     .backoff_factor(1.5)
///     .build(factory, ManualTimer::new())?;
/// ```
#[derive(Debug, Clone)]
#[must_use]
pub struct Builder {
    url: String,
    protocols: Vec<String>,
    config: ReconnectConfig,
}

impl Builder {
    /// Start a builder for `url` with the default configuration.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocols: Vec::new(),
            config: ReconnectConfig::default(),
        }
    }

    /// Subprotocols offered on every connect.
    pub fn protocols<I, P>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the whole reconnect configuration.
    pub fn config(mut self, config: ReconnectConfig) -> Self {
        self.config = config;
        self
    }

    /// Ceiling on consecutive reconnects.
    pub fn max_attempts(mut self, max_attempts: impl Into<MaxAttempts>) -> Self {
        self.config.max_attempts = max_attempts.into();
        self
    }

    /// Reconnect forever.
    pub fn unlimited(mut self) -> Self {
        self.config.max_attempts = MaxAttempts::Unlimited;
        self
    }

    /// Close codes that trigger a reconnect.
    pub fn close_codes<I, C>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<CloseCode>,
    {
        self.config = self.config.with_close_codes(codes);
        self
    }

    /// Base of the exponential backoff.
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.config.backoff_factor = factor;
        self
    }

    /// Binary type applied to every socket.
    pub fn binary_type(mut self, binary_type: BinaryType) -> Self {
        self.config.binary_type = binary_type;
        self
    }

    /// Validate the settings and open the first socket.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`](crate::Error::InvalidEndpoint),
    /// [`Error::InvalidConfig`](crate::Error::InvalidConfig), or the
    /// factory's error for the first socket.
    pub fn build<F, T>(self, factory: F, timer: T) -> Result<ReconnectingSocket<F, T>>
    where
        F: SocketFactory + 'static,
        T: Timer + 'static,
    {
        let endpoint = Endpoint::new(self.url)?.with_protocols(self.protocols);
        ReconnectingSocket::connect(endpoint, factory, timer, self.config)
    }
}
