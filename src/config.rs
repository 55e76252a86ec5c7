//! Reconnect configuration and endpoint description.

use std::fmt;
use std::str::FromStr;

use crate::backoff::{BackoffPolicy, DEFAULT_BACKOFF_FACTOR};
use crate::error::{Error, Result};
use crate::message::CloseCode;

/// Default ceiling on consecutive reconnect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Close codes treated as transient by default: 1000, 1001 and 1006.
pub const DEFAULT_ELIGIBLE_CLOSE_CODES: [CloseCode; 3] =
    [CloseCode::Normal, CloseCode::GoingAway, CloseCode::Abnormal];

/// Ceiling on consecutive reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaxAttempts {
    /// Give up after this many consecutive reconnects.
    Limited(u32),
    /// Never give up on eligible close codes.
    Unlimited,
}

impl Default for MaxAttempts {
    fn default() -> Self {
        MaxAttempts::Limited(DEFAULT_MAX_ATTEMPTS)
    }
}

impl MaxAttempts {
    /// Whether another reconnect may be scheduled after `attempts` consecutive ones.
    #[must_use]
    #[inline]
    pub const fn permits(self, attempts: u32) -> bool {
        match self {
            MaxAttempts::Limited(max) => attempts < max,
            MaxAttempts::Unlimited => true,
        }
    }

    /// Whether `attempts` sits exactly on the ceiling.
    ///
    /// Always `false` when unlimited.
    #[must_use]
    #[inline]
    pub const fn is_reached(self, attempts: u32) -> bool {
        match self {
            MaxAttempts::Limited(max) => attempts == max,
            MaxAttempts::Unlimited => false,
        }
    }
}

impl From<u32> for MaxAttempts {
    fn from(max: u32) -> Self {
        MaxAttempts::Limited(max)
    }
}

/// How binary messages are surfaced by the underlying socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BinaryType {
    /// Opaque blob handles (browser default).
    #[default]
    Blob,
    /// Contiguous byte buffers.
    ArrayBuffer,
}

impl BinaryType {
    /// The DOM string for this binary type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            BinaryType::Blob => "blob",
            BinaryType::ArrayBuffer => "arraybuffer",
        }
    }
}

impl fmt::Display for BinaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BinaryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "blob" => Ok(BinaryType::Blob),
            "arraybuffer" => Ok(BinaryType::ArrayBuffer),
            other => Err(Error::InvalidConfig(format!("unknown binary type {other:?}"))),
        }
    }
}

/// Reconnect behavior, fixed for the lifetime of a [`ReconnectingSocket`](crate::ReconnectingSocket).
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Ceiling on consecutive reconnects since the last successful open.
    ///
    /// Default: 10
    pub max_attempts: MaxAttempts,

    /// Close codes that trigger a reconnect instead of a terminal close.
    ///
    /// Default: 1000, 1001, 1006
    pub eligible_close_codes: Vec<CloseCode>,

    /// Base for exponential backoff. `1.0` gives a constant interval.
    ///
    /// Default: 2.0
    pub backoff_factor: f64,

    /// Binary type applied to every underlying socket.
    ///
    /// Default: blob
    pub binary_type: BinaryType,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: MaxAttempts::default(),
            eligible_close_codes: DEFAULT_ELIGIBLE_CLOSE_CODES.to_vec(),
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            binary_type: BinaryType::default(),
        }
    }
}

impl ReconnectConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration that keeps reconnecting forever on eligible codes.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_attempts: MaxAttempts::Unlimited,
            ..Default::default()
        }
    }

    /// Set the attempt ceiling.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: impl Into<MaxAttempts>) -> Self {
        self.max_attempts = max_attempts.into();
        self
    }

    /// Replace the set of transient close codes.
    #[must_use]
    pub fn with_close_codes<I, C>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<CloseCode>,
    {
        self.eligible_close_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the backoff growth factor.
    #[must_use]
    pub const fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the binary type applied to each socket.
    #[must_use]
    pub const fn with_binary_type(mut self, binary_type: BinaryType) -> Self {
        self.binary_type = binary_type;
        self
    }

    /// Whether a close with `code` is transient.
    ///
    /// Codes compare by numeric value, so `CloseCode::Other(1000)` matches
    /// `CloseCode::Normal`.
    #[must_use]
    pub fn is_eligible(&self, code: CloseCode) -> bool {
        self.eligible_close_codes
            .iter()
            .any(|c| c.as_u16() == code.as_u16())
    }

    /// Backoff policy derived from the configured factor.
    #[must_use]
    pub const fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.backoff_factor)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the backoff factor is not finite or
    /// is below `1.0`. A smaller factor would shrink delays toward zero.
    pub fn validate(&self) -> Result<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(Error::InvalidConfig(format!(
                "backoff factor must be finite and at least 1.0, got {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }
}

/// Where to connect: a url plus an optional subprotocol list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
    protocols: Vec<String>,
}

impl Endpoint {
    /// Create an endpoint without subprotocols.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if `url` is empty.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(Error::InvalidEndpoint("url must not be empty".into()));
        }
        Ok(Self {
            url,
            protocols: Vec::new(),
        })
    }

    /// Set the subprotocols offered on every connect.
    #[must_use]
    pub fn with_protocols<I, P>(mut self, protocols: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.protocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// The url.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The subprotocols, possibly empty.
    #[must_use]
    pub fn protocols(&self) -> &[String] {
        &self.protocols
    }
}
