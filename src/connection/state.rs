//! Socket ready states, mirroring the DOM `WebSocket.readyState` ordinals.

/// Ready state of an underlying socket, or of the reconnecting handle as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ReadyState {
    /// Connection is being established (handshake in progress).
    #[default]
    Connecting = 0,
    /// Connection is open and ready for data transfer.
    Open = 1,
    /// Close handshake initiated, waiting for peer's close frame.
    Closing = 2,
    /// Connection is fully closed.
    Closed = 3,
}

impl ReadyState {
    /// Numeric ordinal as exposed by browser sockets.
    #[must_use]
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a numeric ordinal.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ReadyState::Connecting),
            1 => Some(ReadyState::Open),
            2 => Some(ReadyState::Closing),
            3 => Some(ReadyState::Closed),
            _ => None,
        }
    }

    /// Returns `true` for `Connecting`, `Open`, or `Closing` states.
    #[must_use]
    #[inline]
    pub const fn is_active(&self) -> bool {
        !matches!(self, ReadyState::Closed)
    }

    /// Returns `true` only for `Open` state.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ReadyState::Open)
    }
}

impl std::fmt::Display for ReadyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadyState::Connecting => write!(f, "Connecting"),
            ReadyState::Open => write!(f, "Open"),
            ReadyState::Closing => write!(f, "Closing"),
            ReadyState::Closed => write!(f, "Closed"),
        }
    }
}
