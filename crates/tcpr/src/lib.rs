//! # tcpr
//!
//! Async client for TCPR, the TCP remote console spoken by King Arthur's
//! Gold dedicated servers.
//!
//! The protocol is deliberately plain: a TCP connection carrying
//! newline-delimited UTF-8 text in both directions. Authentication is a
//! password sent as the first line, immediately followed by a sentinel
//! statement ([`HANDSHAKE_SENTINEL`]) in the same frame. A server that
//! accepts the password starts relaying its console; one that rejects it
//! closes the connection without a word.
//!
//! The crate offers two levels of API on one connection:
//!
//! - a direct message channel ([`Client::write`], [`Client::read`] and
//!   their deadline-bounded variants), and
//! - a dispatch loop ([`Client::run`]) that hands inbound messages to
//!   regex handlers registered with [`Client::register`].
//!
//! ## Quick start
//!
//! ```no_run
//! use std::time::Duration;
//! use tcpr::Client;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client =
//!         Client::connect("127.0.0.1:50301", "mypassword", Duration::from_secs(2)).await?;
//!     client.message("console attached").await?;
//!
//!     let greeter = client.register(
//!         r"(?P<name>.+) has joined the game",
//!         |msg, client| async move {
//!             let name = msg.arg("name").unwrap_or("someone");
//!             client.message(&format!("welcome, {}!", name)).await?;
//!             Ok(())
//!         },
//!     )?;
//!     greeter.strip_timestamps();
//!
//!     Err(client.run().await.into())
//! }
//! ```
//!
//! ## Messages on the wire
//!
//! Outbound messages are validated before framing: trailing newlines are
//! trimmed, exactly one delimiter is appended, and empty messages or
//! messages with an empty interior line are refused. Inbound lines are
//! decoded as UTF-8 with the delimiter removed; most carry the server's
//! `[HH:MM:SS] ` timestamp prefix, which [`strip_timestamp`] removes and
//! which handlers can opt out of seeing via
//! [`HandlerHandle::strip_timestamps`].

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod client;
pub mod error;
pub mod handler;
pub mod line;
pub mod util;

pub use self::client::{Client, HANDSHAKE_SENTINEL};
pub use self::error::{AuthPhase, ConnectError, DispatchError, PatternError, ProtocolError, Result};
pub use self::handler::{HandlerHandle, Message};
pub use self::line::{LineCodec, MAX_LINE_LEN};
pub use self::util::strip_timestamp;
