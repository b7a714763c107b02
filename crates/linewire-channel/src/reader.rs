use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tracing::{debug, trace, warn};

use crate::buffer::DecodedText;
use crate::channel::{lock, within, BoxedReader, ReceiveCallback, Shared};
use crate::codec::Decoder;
use crate::error::{ChannelError, Result};

/// How much text a receive request wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReceiveMode {
    /// Up to the next `\n`, which is consumed but not returned.
    Line,
    /// Exactly this many characters.
    Exact(usize),
}

struct PendingReceive {
    mode: ReceiveMode,
    on_received: ReceiveCallback,
}

/// Receive-side state. Only touched under the channel's receive lock.
pub(crate) struct Incoming {
    /// Idle read half. Taken by the pump while a read is in flight.
    pub(crate) reader: Option<BoxedReader>,
    decoder: Decoder,
    text: DecodedText,
    queue: VecDeque<PendingReceive>,
    /// Decode error reached while no request was waiting. Bytes after it
    /// stay in the decoder until the error has been delivered.
    held_error: Option<ChannelError>,
    reading: bool,
}

impl Incoming {
    pub(crate) fn new(reader: BoxedReader, decoder: Decoder) -> Self {
        Self {
            reader: Some(reader),
            decoder,
            text: DecodedText::default(),
            queue: VecDeque::new(),
            held_error: None,
            reading: false,
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Complete, in order, every request at the head of the queue that the
    /// buffered text can satisfy.
    fn drain(&mut self, shared: &Shared) {
        while let Some(head) = self.queue.front() {
            let taken = match head.mode {
                ReceiveMode::Line => self.text.take_line(),
                ReceiveMode::Exact(count) => self.text.take_exact(count),
            };
            let Some(text) = taken else {
                break;
            };
            if let Some(done) = self.queue.pop_front() {
                shared.complete_receive(done.on_received, Ok(Some(text)));
            }
        }
    }

    /// Resolve the oldest request with `result`.
    fn complete_head(&mut self, shared: &Shared, result: Result<Option<String>>) {
        if let Some(head) = self.queue.pop_front() {
            shared.complete_receive(head.on_received, result);
        }
    }

    /// Serve newly queued requests. Buffered text goes first; a held decode
    /// error follows it, and decoding resumes after that.
    fn serve(&mut self, shared: &Shared) {
        self.drain(shared);
        if self.queue.is_empty() {
            return;
        }
        if let Some(err) = self.held_error.take() {
            self.complete_head(shared, Err(err));
            self.accept_bytes(shared, &[]);
        }
    }

    fn fail_all(&mut self, shared: &Shared, err: &ChannelError) {
        for pending in self.queue.drain(..) {
            shared.complete_receive(pending.on_received, Err(err.clone()));
        }
    }

    /// Decode freshly read bytes and serve waiting requests.
    ///
    /// A malformed sequence fails whichever request is waiting when it is
    /// reached; decoding then resumes after it. With nothing waiting, the
    /// error is held for the next request.
    fn accept_bytes(&mut self, shared: &Shared, bytes: &[u8]) {
        let mut input = bytes;
        loop {
            let mut decoded = String::new();
            let result = self.decoder.decode(input, &mut decoded);
            self.text.push(&decoded);
            trace!(
                channel = %shared.config.label,
                bytes = input.len(),
                chars = decoded.chars().count(),
                buffered = self.text.len_chars(),
                "decoded incoming bytes"
            );
            self.drain(shared);

            let Err(err) = result else {
                return;
            };
            warn!(channel = %shared.config.label, error = %err, "incoming text is not decodable");
            if self.queue.is_empty() {
                debug!(
                    channel = %shared.config.label,
                    "holding decode error for the next receive"
                );
                self.held_error = Some(err);
                return;
            }
            self.complete_head(shared, Err(err));
            input = &[];
        }
    }
}

/// Queue a receive request and start the read pump if it is needed.
pub(crate) fn enqueue(shared: &Arc<Shared>, mode: ReceiveMode, on_received: ReceiveCallback) {
    let start = {
        let mut inc = lock(&shared.incoming);
        inc.queue.push_back(PendingReceive { mode, on_received });
        if shared.closed.is_cancelled() {
            inc.fail_all(shared, &ChannelError::Shutdown);
            return;
        }
        inc.serve(shared);
        trace!(
            channel = %shared.config.label,
            ?mode,
            queued = inc.queue.len(),
            "receive queued"
        );

        if inc.queue.is_empty() || inc.reading {
            false
        } else {
            inc.reading = true;
            true
        }
    };

    if start {
        shared.runtime.spawn(read_pump(Arc::clone(shared)));
    }
}

/// Read from the connection while any receive request is waiting.
///
/// Exactly one pump runs while `reading` is set. The connection is never
/// read ahead of demand, so buffered-but-unrequested text is bounded by one
/// read's worth. After end of stream the pump stops; the next request
/// starts a fresh read.
async fn read_pump(shared: Arc<Shared>) {
    let label = &shared.config.label;
    let taken = lock(&shared.incoming).reader.take();
    let Some(mut reader) = taken else {
        let mut inc = lock(&shared.incoming);
        inc.fail_all(&shared, &ChannelError::Shutdown);
        inc.reading = false;
        return;
    };
    let mut scratch = vec![0u8; shared.config.read_buffer_size];
    let mut at_eof = false;

    loop {
        {
            let mut inc = lock(&shared.incoming);
            if inc.queue.is_empty() || at_eof {
                inc.reading = false;
                if !shared.closed.is_cancelled() {
                    inc.reader = Some(reader);
                }
                trace!(channel = %label, waiting = inc.queue.len(), "read pump idle");
                return;
            }
        }

        let read = tokio::select! {
            biased;
            _ = shared.closed.cancelled() => Err(ChannelError::Shutdown),
            res = within(shared.config.read_timeout, reader.read(&mut scratch)) => res,
        };

        let mut inc = lock(&shared.incoming);
        match read {
            Ok(0) => {
                debug!(channel = %label, "end of stream");
                let end = match inc.decoder.finish() {
                    Ok(()) => Ok(None),
                    Err(err) => {
                        warn!(channel = %label, error = %err, "stream ended inside a character");
                        Err(err)
                    }
                };
                inc.complete_head(&shared, end);
                inc.drain(&shared);
                at_eof = true;
            }
            Ok(n) => inc.accept_bytes(&shared, &scratch[..n]),
            Err(ChannelError::Io(err)) if err.kind() == ErrorKind::Interrupted => {}
            Err(ChannelError::Shutdown) => {
                inc.fail_all(&shared, &ChannelError::Shutdown);
                inc.reading = false;
                return;
            }
            Err(err) => {
                warn!(channel = %label, error = %err, "read failed");
                inc.complete_head(&shared, Err(err));
            }
        }
    }
}
