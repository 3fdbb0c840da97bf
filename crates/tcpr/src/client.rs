//! The TCPR client: connection establishment, the message channel and the
//! handler dispatch loop.

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace};

use crate::error::{AuthPhase, ConnectError, DispatchError, PatternError, ProtocolError, Result};
use crate::handler::{HandlerHandle, Message, Registry};
use crate::line::LineCodec;
use crate::util::strip_timestamp;

/// Script statement sent on the line after the password when
/// authenticating.
///
/// The server evaluates it like any other console statement once the
/// password is accepted, so receiving any response line at all confirms
/// the session. A rejected password never gets that far: the server just
/// drops the connection.
pub const HANDSHAKE_SENTINEL: &str = "tcpr('hello')";

struct Inner {
    reader: Mutex<FramedRead<OwnedReadHalf, LineCodec>>,
    writer: Mutex<FramedWrite<OwnedWriteHalf, LineCodec>>,
    registry: Registry,
    closed: AtomicBool,
}

/// An authenticated TCPR session.
///
/// The client is a cheap handle over a shared connection: clone it freely
/// and use it from multiple tasks. Reads and writes are serialized per
/// direction, so one task can sit in [`read`](Client::read) (or in
/// [`run`](Client::run)) while another writes.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Connects to `address` and authenticates with `password`.
    ///
    /// The handshake sends the password and [`HANDSHAKE_SENTINEL`] as a
    /// single two-line frame, then waits for the first line from the
    /// server. Any line means the password was accepted; the server
    /// closing the connection instead maps to
    /// [`ConnectError::WrongPassword`]. `timeout` bounds the dial, and a
    /// single deadline of the same length spans both handshake steps.
    /// Once the client is returned, no deadline remains in effect.
    pub async fn connect(
        address: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Client, ConnectError> {
        let stream = match time::timeout(timeout, TcpStream::connect(address)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ConnectError::Dial {
                    addr: address.to_string(),
                    source,
                })
            }
            Err(_) => {
                return Err(ConnectError::Dial {
                    addr: address.to_string(),
                    source: io::Error::new(io::ErrorKind::TimedOut, "connection attempt timed out"),
                })
            }
        };
        debug!(addr = %address, "Connected, authenticating");

        let (read_half, write_half) = stream.into_split();
        let client = Client {
            inner: Arc::new(Inner {
                reader: Mutex::new(FramedRead::new(read_half, LineCodec::new())),
                writer: Mutex::new(FramedWrite::new(write_half, LineCodec::new())),
                registry: Registry::new(),
                closed: AtomicBool::new(false),
            }),
        };

        // One deadline covers the whole handshake; it exists only as a
        // bound on the two futures below, so nothing leaks into the
        // returned client.
        let deadline = time::Instant::now() + timeout;

        let credentials = format!("{}\n{}", password, HANDSHAKE_SENTINEL);
        match time::timeout_at(deadline, client.write(&credentials)).await {
            Ok(Ok(_)) => {}
            Ok(Err(cause)) if cause.is_timeout() => {
                return Err(ConnectError::AuthTimeout {
                    phase: AuthPhase::SendingPassword,
                })
            }
            Ok(Err(cause)) => return Err(ConnectError::AuthWrite(cause)),
            Err(_) => {
                return Err(ConnectError::AuthTimeout {
                    phase: AuthPhase::SendingPassword,
                })
            }
        }

        match time::timeout_at(deadline, client.read()).await {
            Ok(Ok(greeting)) => {
                debug!(addr = %address, greeting = %greeting, "Authenticated");
            }
            Ok(Err(cause)) if cause.is_disconnect() => return Err(ConnectError::WrongPassword),
            Ok(Err(cause)) if cause.is_timeout() => {
                return Err(ConnectError::AuthTimeout {
                    phase: AuthPhase::AwaitingGreeting,
                })
            }
            Ok(Err(cause)) => return Err(ConnectError::Auth(cause)),
            Err(_) => {
                return Err(ConnectError::AuthTimeout {
                    phase: AuthPhase::AwaitingGreeting,
                })
            }
        }

        Ok(client)
    }

    /// Sends one message to the server.
    ///
    /// Trailing newlines are trimmed and a single delimiter is appended by
    /// the framing layer; an empty message or one containing an empty
    /// interior line is rejected with [`ProtocolError::InvalidMessage`]
    /// before any bytes are written. Returns the framed size in bytes.
    pub async fn write(&self, message: &str) -> Result<usize> {
        self.ensure_open()?;
        let framed_len = message.trim_end_matches('\n').len() + 1;
        let mut writer = self.inner.writer.lock().await;
        writer.send(message.to_string()).await?;
        Ok(framed_len)
    }

    /// Like [`write`](Client::write), but gives up with
    /// [`ProtocolError::Timeout`] once `timeout` elapses.
    ///
    /// The deadline applies to this call only. A frame that was encoded
    /// but not fully flushed before the deadline is flushed by the next
    /// write, so cancellation never tears a message in half on the wire.
    pub async fn write_with_timeout(&self, message: &str, timeout: Duration) -> Result<usize> {
        match time::timeout(timeout, self.write(message)).await {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::Timeout(timeout)),
        }
    }

    /// Receives the next line from the server, delimiter removed.
    ///
    /// Returns [`ProtocolError::ConnectionClosed`] when the server ends
    /// the stream.
    pub async fn read(&self) -> Result<String> {
        self.ensure_open()?;
        let mut reader = self.inner.reader.lock().await;
        match reader.next().await {
            Some(Ok(line)) => Ok(line),
            Some(Err(cause)) => Err(cause),
            None => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Like [`read`](Client::read), but gives up with
    /// [`ProtocolError::Timeout`] once `timeout` elapses.
    ///
    /// The deadline applies to this call only and does not leak into later
    /// reads. Bytes of a partially received line stay buffered in the
    /// framing layer, so a later read picks up exactly where this one
    /// stopped.
    pub async fn read_with_timeout(&self, timeout: Duration) -> Result<String> {
        match time::timeout(timeout, self.read()).await {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::Timeout(timeout)),
        }
    }

    /// Sends a chat message visible to players, `/msg` prefixed.
    pub async fn message(&self, text: &str) -> Result<()> {
        self.write(&format!("/msg {}", text)).await.map(|_| ())
    }

    /// Closes the session.
    ///
    /// The write half is shut down so the server sees an orderly end of
    /// stream. Later operations on any clone of this client fail with
    /// [`ProtocolError::ConnectionClosed`]; calling `close` again is a
    /// no-op.
    pub async fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::Relaxed) {
            return Ok(());
        }
        debug!("Closing connection");
        let mut writer = self.inner.writer.lock().await;
        writer.close().await
    }

    /// Registers a handler for messages matching `pattern`.
    ///
    /// The pattern is an unanchored regex evaluated against every inbound
    /// message seen by [`run`](Client::run); named capture groups become
    /// the [`Message::args`] of the messages the callback receives.
    /// Handlers run in registration order and every matching handler runs,
    /// so overlapping patterns are fine. Registration is allowed at any
    /// time, including from inside a callback.
    pub fn register<F, Fut>(&self, pattern: &str, callback: F) -> Result<HandlerHandle, PatternError>
    where
        F: Fn(Message, Client) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.inner.registry.register(pattern, callback)
    }

    /// Reads messages and dispatches them to matching handlers until
    /// something fails.
    ///
    /// Every message is tested against every registered handler in
    /// registration order, and each matching callback is awaited before
    /// the next handler is tried. A callback returning an error stops the
    /// loop immediately; so does a read failure, including the server
    /// closing the connection. The loop never ends on its own, which is
    /// why it returns the error directly rather than a `Result`.
    ///
    /// Callbacks get a clone of the client and may write freely. They
    /// should not call [`read`](Client::read), which would steal messages
    /// from the loop.
    pub async fn run(&self) -> DispatchError {
        loop {
            let line = match self.read().await {
                Ok(line) => line,
                Err(cause) => return DispatchError::Read(cause),
            };
            trace!(raw = %line, "Received message");

            let stripped = strip_timestamp(&line);
            for handler in self.inner.registry.snapshot() {
                let text = if handler.strips_timestamps() {
                    stripped
                } else {
                    line.as_str()
                };
                let Some(message) = handler.match_line(text) else {
                    continue;
                };
                debug!(pattern = handler.pattern_str(), "Dispatching message");
                if let Err(cause) = handler.call(message, self.clone()).await {
                    return DispatchError::Handler {
                        pattern: handler.pattern_str().to_string(),
                        cause,
                    };
                }
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::Relaxed) {
            return Err(ProtocolError::ConnectionClosed);
        }
        Ok(())
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
