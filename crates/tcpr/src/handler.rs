//! Pattern handlers and the registry the dispatch loop draws from.
//!
//! A handler pairs a compiled regex with an async callback. Handlers are
//! registered through [`Client::register`](crate::Client::register) and
//! evaluated against every inbound message in registration order; a single
//! message can fire any number of handlers. Each handler can independently
//! opt in to seeing messages with the server's timestamp prefix removed.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use regex::{Captures, Regex};
use tracing::debug;

use crate::client::Client;
use crate::error::PatternError;

/// Boxed handler callback. Callbacks receive the matched message and a
/// clone of the client so they can write back to the server.
pub(crate) type Callback =
    Box<dyn Fn(Message, Client) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// An inbound message as seen by a handler.
///
/// `raw` is the text the handler's pattern was evaluated against. For a
/// handler that opted in via [`HandlerHandle::strip_timestamps`] this is
/// the line with its timestamp prefix already removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Full text of the matched message.
    pub raw: String,
    /// Values captured by the pattern's named groups. Groups that did not
    /// participate in the match are present with an empty value.
    pub args: HashMap<String, String>,
}

impl Message {
    pub(crate) fn from_match(text: &str, pattern: &Regex, caps: &Captures<'_>) -> Self {
        let args = pattern
            .capture_names()
            .flatten()
            .map(|name| {
                let value = caps.name(name).map_or("", |m| m.as_str());
                (name.to_string(), value.to_string())
            })
            .collect();
        Self {
            raw: text.to_string(),
            args,
        }
    }

    /// Looks up a named capture by group name.
    pub fn arg(&self, name: &str) -> Option<&str> {
        self.args.get(name).map(String::as_str)
    }
}

pub(crate) struct Handler {
    pattern: Regex,
    callback: Callback,
    strip_timestamps: AtomicBool,
}

impl Handler {
    /// Evaluates the pattern against `text`, building a [`Message`] on a hit.
    pub(crate) fn match_line(&self, text: &str) -> Option<Message> {
        self.pattern
            .captures(text)
            .map(|caps| Message::from_match(text, &self.pattern, &caps))
    }

    pub(crate) fn call(&self, message: Message, client: Client) -> BoxFuture<'static, anyhow::Result<()>> {
        (self.callback)(message, client)
    }

    pub(crate) fn strips_timestamps(&self) -> bool {
        self.strip_timestamps.load(Ordering::Relaxed)
    }

    pub(crate) fn pattern_str(&self) -> &str {
        self.pattern.as_str()
    }
}

/// A reference to a registered handler.
///
/// The handle shares ownership of the handler with the registry, so it can
/// be kept around or dropped freely without affecting dispatch.
#[derive(Clone)]
pub struct HandlerHandle {
    handler: Arc<Handler>,
}

impl HandlerHandle {
    /// Makes this handler match against, and receive, message text with
    /// the `[HH:MM:SS] ` prefix stripped.
    ///
    /// Takes effect for messages dispatched after the call. Calling it
    /// more than once has no further effect.
    pub fn strip_timestamps(&self) {
        self.handler.strip_timestamps.store(true, Ordering::Relaxed);
    }

    /// The pattern this handler was registered with.
    pub fn pattern(&self) -> &str {
        self.handler.pattern.as_str()
    }
}

impl fmt::Debug for HandlerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerHandle")
            .field("pattern", &self.pattern())
            .field("strip_timestamps", &self.handler.strips_timestamps())
            .finish()
    }
}

/// Ordered collection of handlers shared between the client and the
/// dispatch loop.
pub(crate) struct Registry {
    handlers: RwLock<Vec<Arc<Handler>>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Compiles `pattern` and appends the handler to the dispatch order.
    pub(crate) fn register<F, Fut>(
        &self,
        pattern: &str,
        callback: F,
    ) -> Result<HandlerHandle, PatternError>
    where
        F: Fn(Message, Client) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let compiled = Regex::new(pattern).map_err(|source| PatternError {
            pattern: pattern.to_string(),
            source,
        })?;
        let handler = Arc::new(Handler {
            pattern: compiled,
            callback: Box::new(move |message, client| Box::pin(callback(message, client))),
            strip_timestamps: AtomicBool::new(false),
        });
        debug!(pattern = handler.pattern_str(), "Handler registered");
        self.handlers.write().push(Arc::clone(&handler));
        Ok(HandlerHandle { handler })
    }

    /// Snapshot of the handlers in registration order.
    ///
    /// Dispatch iterates the snapshot rather than holding the lock, so a
    /// callback is free to register further handlers; those only see
    /// messages read after the current one.
    pub(crate) fn snapshot(&self) -> Vec<Arc<Handler>> {
        self.handlers.read().clone()
    }
}
