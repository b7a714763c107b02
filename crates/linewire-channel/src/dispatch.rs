use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{trace, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs completion callbacks one at a time, in submission order, on a
/// runtime worker.
///
/// Callbacks are never invoked inline by the code that completes them, so a
/// callback may freely call back into the channel.
pub(crate) struct Dispatcher {
    tx: mpsc::UnboundedSender<Job>,
}

impl Dispatcher {
    pub(crate) fn spawn(runtime: &Handle, direction: &'static str, label: String) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        runtime.spawn(async move {
            while let Some(job) = rx.recv().await {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    warn!(channel = %label, direction, "completion callback panicked");
                }
            }
            trace!(channel = %label, direction, "dispatcher finished");
        });
        Self { tx }
    }

    /// Queue `job` behind every job dispatched before it.
    pub(crate) fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if self.tx.send(Box::new(job)).is_err() {
            warn!("callback dispatcher stopped; completion dropped");
        }
    }
}
