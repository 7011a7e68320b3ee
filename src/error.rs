use std::io;

use thiserror::Error;

/// Failure to deliver a frame to a peer. Never fatal: callers log it and apply their own
/// best-effort policy.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Peer unreachable: refused, unresolvable, or timed out (connecting or awaiting the echo).
    #[error("could not reach {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The connection was established but dropped before the exchange completed.
    #[error("lost connection to {address}: {source}")]
    Write {
        address: String,
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    pub fn connect(address: &str, source: io::Error) -> Self {
        Self::Connect {
            address: address.to_string(),
            source,
        }
    }

    pub fn write(address: &str, source: io::Error) -> Self {
        Self::Write {
            address: address.to_string(),
            source,
        }
    }

    pub fn address(&self) -> &str {
        match self {
            Self::Connect { address, .. } | Self::Write { address, .. } => address,
        }
    }
}

/// A frame that cannot be turned into a message. The frame is dropped, the connection still
/// completes its echo.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("unroutable message kind {0:?}")]
    UnroutableKind(String),
}
