//! Mutation watch pipeline.
//!
//! Coalesces the host's mutation batches into quiet periods: each batch
//! restarts the debounce window, and only when the window elapses without
//! another batch is the trigger fired, exactly once. The watcher never runs
//! pass logic itself; the trigger is expected to schedule it.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::document::MutationReceiver;

/// Callback fired once per quiet period.
pub type QuietTrigger = Arc<dyn Fn() + Send + Sync>;

pub struct ChangeWatcher {
    debounce_window: Duration,
    loop_task: JoinHandle<()>,
}

impl fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("debounce_window", &self.debounce_window)
            .field("loop_finished", &self.loop_task.is_finished())
            .finish()
    }
}

impl ChangeWatcher {
    /// Start the debounce loop over `mutations`. Must be called from within a
    /// Tokio runtime.
    pub fn spawn(
        mutations: MutationReceiver,
        debounce_window: Duration,
        on_quiet: QuietTrigger,
    ) -> Self {
        let loop_task = spawn_watch_loop(mutations, debounce_window, on_quiet);
        Self {
            debounce_window,
            loop_task,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.loop_task.is_finished()
    }

    /// Cancel the pending window and drop the subscription.
    pub fn shutdown(self) {
        self.loop_task.abort();
        // The receiver lives inside the aborted task; dropping it unsubscribes.
    }
}

fn spawn_watch_loop(
    mut rx: MutationReceiver,
    debounce_window: Duration,
    on_quiet: QuietTrigger,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut pending_batches = 0usize;

        loop {
            let msg = if pending_batches == 0 {
                rx.recv().await
            } else {
                match timeout(debounce_window, rx.recv()).await {
                    Ok(msg) => msg,
                    Err(_) => {
                        trace!(coalesced = pending_batches, "mutation burst settled");
                        pending_batches = 0;
                        on_quiet();
                        continue;
                    }
                }
            };

            let Some(batch) = msg else {
                if pending_batches > 0 {
                    on_quiet();
                }
                debug!("mutation stream closed; watcher exiting");
                break;
            };

            trace!(records = batch.len(), "mutation batch");
            pending_batches += 1;
        }
    })
}
