//! Error types for the TCPR client.
//!
//! Errors are split by phase: [`ConnectError`] covers dialing and the
//! password handshake, [`ProtocolError`] covers the message channel once a
//! session is established, and [`DispatchError`] covers the handler loop.

use std::fmt;
use std::io;
use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Errors produced by the message channel.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// Underlying I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// An inbound line was not valid UTF-8.
    #[error("decode error: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// An inbound line exceeded the maximum length the codec accepts.
    #[error("message too long: {actual} bytes (limit {limit})")]
    MessageTooLong {
        /// Size of the offending line in bytes, including the delimiter.
        actual: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// An outbound message failed validation before framing.
    #[error("invalid outbound message: {reason}")]
    InvalidMessage {
        /// What the validation step objected to.
        reason: &'static str,
    },

    /// A bounded read or write did not complete in time.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The connection is no longer usable, either because the peer ended it
    /// or because [`Client::close`](crate::Client::close) was called.
    #[error("connection closed")]
    ConnectionClosed,
}

impl ProtocolError {
    /// Returns `true` when the error means the peer ended the connection.
    ///
    /// Covers both the orderly case (end of stream) and the abortive one
    /// (reset or broken pipe surfaced by the transport).
    pub fn is_disconnect(&self) -> bool {
        match self {
            ProtocolError::ConnectionClosed => true,
            ProtocolError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }

    /// Returns `true` when the error is a deadline expiry.
    pub fn is_timeout(&self) -> bool {
        match self {
            ProtocolError::Timeout(_) => true,
            ProtocolError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

/// Phase of the handshake during which a connect deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// Writing the password and sentinel frame.
    SendingPassword,
    /// Waiting for the first line from the server.
    AwaitingGreeting,
}

impl fmt::Display for AuthPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthPhase::SendingPassword => write!(f, "sending the password"),
            AuthPhase::AwaitingGreeting => write!(f, "awaiting the server greeting"),
        }
    }
}

/// Errors produced while establishing an authenticated session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConnectError {
    /// The TCP connection itself could not be established.
    #[error("could not connect to {addr}: {source}")]
    Dial {
        /// Address passed to [`Client::connect`](crate::Client::connect).
        addr: String,
        /// Error reported by the dialer.
        #[source]
        source: io::Error,
    },

    /// The connect timeout expired during the handshake.
    #[error("timed out {phase}")]
    AuthTimeout {
        /// Which handshake step was in flight when the deadline passed.
        phase: AuthPhase,
    },

    /// The password frame could not be written.
    #[error("could not send password: {0}")]
    AuthWrite(#[source] ProtocolError),

    /// The server dropped the connection instead of greeting us, which is
    /// how a TCPR server signals a rejected password.
    #[error("wrong password: server closed the connection")]
    WrongPassword,

    /// Any other failure while waiting to be accepted.
    #[error("authentication failed: {0}")]
    Auth(#[source] ProtocolError),
}

/// A handler pattern failed to compile.
#[derive(Debug, Error)]
#[error("invalid handler pattern `{pattern}`: {source}")]
pub struct PatternError {
    /// The pattern as passed to [`Client::register`](crate::Client::register).
    pub pattern: String,
    /// Error reported by the regex engine.
    #[source]
    pub source: regex::Error,
}

/// Errors that terminate the dispatch loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DispatchError {
    /// Reading the next message failed.
    #[error("could not read message: {0}")]
    Read(#[source] ProtocolError),

    /// A handler returned an error for a message it matched.
    #[error("handler `{pattern}` failed: {cause}")]
    Handler {
        /// Pattern of the handler that failed.
        pattern: String,
        /// The error the callback returned.
        cause: anyhow::Error,
    },
}
