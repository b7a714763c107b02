use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use crate::channel::{lock, within, BoxedWriter, SendCallback, Shared};
use crate::error::{ChannelError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// A queued send, completed once the byte stream reaches `end`.
struct PendingSend {
    end: u64,
    failure: Option<ChannelError>,
    on_sent: SendCallback,
}

/// Send-side state. Only touched under the channel's send lock.
pub(crate) struct Outgoing {
    /// Idle write half. Taken by the pump while a write is in flight.
    pub(crate) writer: Option<BoxedWriter>,
    /// Encoded bytes not yet handed to a write.
    buffer: BytesMut,
    queue: VecDeque<PendingSend>,
    /// Total bytes ever queued.
    enqueued: u64,
    /// Total bytes written, or skipped because their send failed.
    written: u64,
    pumping: bool,
}

impl Outgoing {
    pub(crate) fn new(writer: BoxedWriter) -> Self {
        Self {
            writer: Some(writer),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            queue: VecDeque::new(),
            enqueued: 0,
            written: 0,
            pumping: false,
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Complete, in order, every send whose bytes are all written.
    fn complete_written(&mut self, shared: &Shared) {
        while self.queue.front().is_some_and(|head| head.end <= self.written) {
            let Some(done) = self.queue.pop_front() else {
                break;
            };
            let result = match done.failure {
                Some(err) => Err(err),
                None => Ok(()),
            };
            shared.complete_send(done.on_sent, result);
        }
    }

    /// Fail the oldest unfinished send with `err` after a write or flush
    /// failure. `progress` bytes went out before the failure. Returns how
    /// many of the failed send's bytes will never be written.
    fn fail_head(
        &mut self,
        shared: &Shared,
        progress: u64,
        err: ChannelError,
        flushing: bool,
    ) -> u64 {
        self.written += progress;
        if !flushing {
            // Sends whose bytes all went out before the failure succeeded.
            self.complete_written(shared);
        }
        let Some(head) = self.queue.pop_front() else {
            return 0;
        };
        let skipped = head.end.saturating_sub(self.written);
        self.written += skipped;
        shared.complete_send(head.on_sent, Err(head.failure.unwrap_or(err)));
        skipped
    }

    /// Fail every queued send with `err` and drop bytes not yet written.
    fn fail_all(&mut self, shared: &Shared, err: &ChannelError) {
        self.buffer.clear();
        self.written = self.enqueued;
        for pending in self.queue.drain(..) {
            let err = pending.failure.unwrap_or_else(|| err.clone());
            shared.complete_send(pending.on_sent, Err(err));
        }
    }
}

/// Queue `text` and start the write pump if it is idle.
pub(crate) fn enqueue(shared: &Arc<Shared>, text: &str, on_sent: SendCallback) {
    let start = {
        let mut out = lock(&shared.outgoing);
        if shared.closed.is_cancelled() {
            let end = out.enqueued;
            out.queue.push_back(PendingSend {
                end,
                failure: Some(ChannelError::Shutdown),
                on_sent,
            });
            // A running pump fails the queue itself on its way out.
            if !out.pumping {
                out.fail_all(shared, &ChannelError::Shutdown);
            }
            return;
        }

        let before = out.buffer.len();
        let failure = shared.encoding.encode(text, &mut out.buffer).err();
        if let Some(err) = &failure {
            warn!(channel = %shared.config.label, error = %err, "send rejected");
        }
        out.enqueued += (out.buffer.len() - before) as u64;
        let end = out.enqueued;
        out.queue.push_back(PendingSend {
            end,
            failure,
            on_sent,
        });
        trace!(
            channel = %shared.config.label,
            queued = out.queue.len(),
            buffered = out.buffer.len(),
            "send queued"
        );

        if out.pumping {
            false
        } else {
            out.pumping = true;
            true
        }
    };

    if start {
        shared.runtime.spawn(write_pump(Arc::clone(shared)));
    }
}

/// Write buffered bytes until the buffer is drained.
///
/// Exactly one pump runs while `pumping` is set. Going idle (restoring the
/// write half and clearing `pumping`) happens in one critical section, so a
/// concurrent `enqueue` either sees the pump still running or starts a new
/// one that finds the write half in place.
async fn write_pump(shared: Arc<Shared>) {
    let label = &shared.config.label;
    let taken = lock(&shared.outgoing).writer.take();
    let Some(mut writer) = taken else {
        let mut out = lock(&shared.outgoing);
        out.fail_all(&shared, &ChannelError::Shutdown);
        out.pumping = false;
        return;
    };
    // Bytes taken from the buffer but not yet written.
    let mut unsent = Bytes::new();

    loop {
        let idle = {
            let mut out = lock(&shared.outgoing);
            out.complete_written(&shared);
            if unsent.is_empty() && out.buffer.is_empty() {
                out.pumping = false;
                if !shared.closed.is_cancelled() {
                    out.writer = Some(writer);
                    trace!(channel = %label, "write pump idle");
                    return;
                }
                true
            } else {
                if unsent.is_empty() {
                    // Everything queued so far goes out as one batch.
                    unsent = out.buffer.split().freeze();
                }
                false
            }
        };

        if idle {
            close(writer, label).await;
            return;
        }

        let before = unsent.len();
        let result = write_batch(&shared, &mut writer, &mut unsent).await;
        let progress = (before - unsent.len()) as u64;

        match result {
            Ok(()) => {
                lock(&shared.outgoing).written += progress;
            }
            Err(ChannelError::Shutdown) => {
                {
                    let mut out = lock(&shared.outgoing);
                    out.fail_all(&shared, &ChannelError::Shutdown);
                    out.pumping = false;
                }
                close(writer, label).await;
                return;
            }
            Err(err) => {
                warn!(channel = %label, error = %err, "write failed");
                let flushing = unsent.is_empty();
                let skipped =
                    lock(&shared.outgoing).fail_head(&shared, progress, err, flushing);
                let skipped = usize::try_from(skipped).unwrap_or(usize::MAX);
                unsent.advance(skipped.min(unsent.len()));
            }
        }
    }
}

/// Write `batch` out, resuming after short writes, then flush. Written
/// bytes are consumed from `batch`, so on error it holds what is left.
async fn write_batch(
    shared: &Shared,
    writer: &mut BoxedWriter,
    batch: &mut Bytes,
) -> Result<()> {
    let limit = shared.config.write_timeout;
    while !batch.is_empty() {
        let written = tokio::select! {
            biased;
            _ = shared.closed.cancelled() => return Err(ChannelError::Shutdown),
            res = within(limit, writer.write(&batch[..])) => res,
        };
        match written {
            Ok(0) => return Err(std::io::Error::from(ErrorKind::WriteZero).into()),
            Ok(n) => {
                batch.advance(n);
                trace!(
                    channel = %shared.config.label,
                    written = n,
                    remaining = batch.len(),
                    "wrote bytes"
                );
            }
            Err(ChannelError::Io(err)) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }

    tokio::select! {
        biased;
        _ = shared.closed.cancelled() => Err(ChannelError::Shutdown),
        res = within(limit, writer.flush()) => res,
    }
}

async fn close(mut writer: BoxedWriter, label: &str) {
    if let Err(err) = writer.shutdown().await {
        debug!(channel = %label, error = %err, "ignoring error while closing write side");
    }
}
