use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use linewire_transport::Connection;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::codec::TextEncoding;
use crate::config::ChannelConfig;
use crate::dispatch::Dispatcher;
use crate::error::{ChannelError, Result};
use crate::reader::{self, Incoming, ReceiveMode};
use crate::writer::{self, Outgoing};

/// Completion callback for [`TextChannel::send`].
pub type SendCallback = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// Completion callback for [`TextChannel::receive_line`] and
/// [`TextChannel::receive_exact`].
///
/// `Ok(Some(text))` carries the received text, `Err(_)` a failure, and
/// `Ok(None)` means the remote side closed its sending direction.
pub type ReceiveCallback = Box<dyn FnOnce(Result<Option<String>>) + Send + 'static>;

pub(crate) type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub(crate) type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A thread-safe, newline-framed text transport over one connection.
///
/// Any number of callers, on any thread, may queue outgoing text with
/// [`send`](Self::send) and queue requests for incoming text with
/// [`receive_line`](Self::receive_line) or
/// [`receive_exact`](Self::receive_exact). None of these block. Each request
/// completes later through its callback, which always runs on a runtime
/// worker and never inside the call that queued it.
///
/// Guarantees, per channel:
/// - send callbacks fire in `send` order, each only after its bytes are written
/// - receive callbacks fire in request order, whatever mix of modes is queued
/// - at most one write and one read are in flight at a time
/// - the connection is only read while some receive request is waiting
///
/// Errors are per request. A failed write, read, or decode resolves only the
/// oldest request on that side and leaves the connection open; call
/// [`shutdown`](Self::shutdown) to tear it down.
///
/// Cloning yields another handle to the same channel.
#[derive(Clone)]
pub struct TextChannel {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    pub(crate) runtime: Handle,
    pub(crate) encoding: TextEncoding,
    pub(crate) config: ChannelConfig,
    pub(crate) outgoing: Mutex<Outgoing>,
    pub(crate) incoming: Mutex<Incoming>,
    pub(crate) closed: CancellationToken,
    sent: Dispatcher,
    received: Dispatcher,
}

impl Shared {
    pub(crate) fn complete_send(&self, on_sent: SendCallback, result: Result<()>) {
        self.sent.dispatch(move || on_sent(result));
    }

    pub(crate) fn complete_receive(
        &self,
        on_received: ReceiveCallback,
        result: Result<Option<String>>,
    ) {
        self.received.dispatch(move || on_received(result));
    }
}

/// Lock a state mutex. Callbacks never run under these locks, so a poisoned
/// lock can only come from a bug in the channel itself; keep going.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Await one I/O operation, bounded by an optional timeout.
pub(crate) async fn within<T>(
    limit: Option<Duration>,
    io: impl Future<Output = std::io::Result<T>>,
) -> Result<T> {
    match limit {
        Some(limit) => match tokio::time::timeout(limit, io).await {
            Ok(result) => result.map_err(ChannelError::from),
            Err(_) => Err(ChannelError::Timeout(limit)),
        },
        None => io.await.map_err(ChannelError::from),
    }
}

impl TextChannel {
    /// Wrap an already-connected stream, using the current tokio runtime.
    pub fn new<C: Connection>(connection: C, encoding: TextEncoding) -> Result<Self> {
        Self::with_config(connection, encoding, ChannelConfig::default())
    }

    /// Wrap an already-connected stream with explicit configuration.
    pub fn with_config<C: Connection>(
        connection: C,
        encoding: TextEncoding,
        config: ChannelConfig,
    ) -> Result<Self> {
        let runtime =
            Handle::try_current().map_err(|err| ChannelError::NoRuntime(err.to_string()))?;
        Ok(Self::with_runtime(connection, encoding, config, runtime))
    }

    /// Wrap an already-connected stream, driving it on `runtime`.
    ///
    /// Useful when the channel is created on a thread outside any runtime.
    pub fn with_runtime<C: Connection>(
        connection: C,
        encoding: TextEncoding,
        mut config: ChannelConfig,
        runtime: Handle,
    ) -> Self {
        config.read_buffer_size = config.read_buffer_size.max(1);
        let (read_half, write_half) = tokio::io::split(connection);
        let sent = Dispatcher::spawn(&runtime, "send", config.label.clone());
        let received = Dispatcher::spawn(&runtime, "receive", config.label.clone());

        debug!(channel = %config.label, %encoding, "text channel opened");

        Self {
            shared: Arc::new(Shared {
                outgoing: Mutex::new(Outgoing::new(Box::new(write_half))),
                incoming: Mutex::new(Incoming::new(Box::new(read_half), encoding.decoder())),
                closed: CancellationToken::new(),
                runtime,
                encoding,
                config,
                sent,
                received,
            }),
        }
    }

    /// Queue `text` for sending.
    ///
    /// `on_sent` receives `Ok(())` once every byte of `text` has been written,
    /// or the error that prevented it. Texts queued while a write is in
    /// flight are coalesced into the next write. An empty text writes nothing
    /// and completes in its turn.
    pub fn send<F>(&self, text: &str, on_sent: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        writer::enqueue(&self.shared, text, Box::new(on_sent));
    }

    /// Queue a request for the next line, newline removed.
    ///
    /// The request stays pending until a `\n` arrives, the stream ends
    /// (`Ok(None)`), or an error occurs.
    pub fn receive_line<F>(&self, on_received: F)
    where
        F: FnOnce(Result<Option<String>>) + Send + 'static,
    {
        reader::enqueue(&self.shared, ReceiveMode::Line, Box::new(on_received));
    }

    /// Queue a request for exactly `count` characters, newlines included.
    ///
    /// A `count` of zero is a programming error and is rejected here rather
    /// than through the callback.
    pub fn receive_exact<F>(&self, count: usize, on_received: F) -> Result<()>
    where
        F: FnOnce(Result<Option<String>>) + Send + 'static,
    {
        if count == 0 {
            return Err(ChannelError::InvalidLength);
        }
        reader::enqueue(
            &self.shared,
            ReceiveMode::Exact(count),
            Box::new(on_received),
        );
        Ok(())
    }

    /// Send `text` and wait until it has been written.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(text, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(ChannelError::Shutdown))
    }

    /// Wait for the next line. `Ok(None)` means end of stream.
    pub async fn read_line(&self) -> Result<Option<String>> {
        let (tx, rx) = oneshot::channel();
        self.receive_line(move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(ChannelError::Shutdown))
    }

    /// Wait for exactly `count` characters. `Ok(None)` means end of stream.
    pub async fn read_exact_chars(&self, count: usize) -> Result<Option<String>> {
        let (tx, rx) = oneshot::channel();
        self.receive_exact(count, move |result| {
            let _ = tx.send(result);
        })?;
        rx.await.unwrap_or(Err(ChannelError::Shutdown))
    }

    /// Close the connection in both directions.
    ///
    /// Best effort: errors from the close itself are ignored. Safe to call
    /// repeatedly, from any thread, and after a transport failure. Requests
    /// still queued, and any made afterwards, complete with
    /// [`ChannelError::Shutdown`].
    pub fn shutdown(&self) {
        let shared = &self.shared;
        if shared.closed.is_cancelled() {
            trace!(channel = %shared.config.label, "shutdown already requested");
            return;
        }
        shared.closed.cancel();

        let write_half = lock(&shared.outgoing).writer.take();
        let read_half = lock(&shared.incoming).reader.take();
        info!(channel = %shared.config.label, "shutting down text channel");

        let label = shared.config.label.clone();
        shared.runtime.spawn(async move {
            if let Some(mut write_half) = write_half {
                if let Err(err) = write_half.shutdown().await {
                    debug!(channel = %label, error = %err, "ignoring error while closing");
                }
            }
            drop(read_half);
        });
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Sends queued but not yet completed.
    pub fn pending_sends(&self) -> usize {
        lock(&self.shared.outgoing).pending()
    }

    /// Receive requests queued but not yet completed.
    pub fn pending_receives(&self) -> usize {
        lock(&self.shared.incoming).pending()
    }

    /// The channel's text encoding.
    pub fn encoding(&self) -> TextEncoding {
        self.shared.encoding
    }

    /// The label used in this channel's log events.
    pub fn label(&self) -> &str {
        &self.shared.config.label
    }
}

impl std::fmt::Debug for TextChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextChannel")
            .field("label", &self.shared.config.label)
            .field("encoding", &self.shared.encoding)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
