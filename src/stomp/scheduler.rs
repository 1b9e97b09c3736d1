//! Single-lane task executor for timer-driven work.
//!
//! Heartbeats, liveness checks, queue drains and reconnect attempts all run on one worker task,
//! one job at a time, so they never race each other. They still race transport callbacks, which
//! arrive on the transport's own tasks.
//!
//! Every timer returns a [`CancellationToken`]. A job whose token was cancelled after it was
//! queued is skipped when the worker reaches it.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle to the worker lane. Dropping it stops every timer and, once queued jobs are done,
/// the worker itself.
#[derive(Debug)]
pub(crate) struct Scheduler {
    jobs_tx: mpsc::UnboundedSender<Job>,
    shutdown: CancellationToken,
}

impl Scheduler {
    /// Spawn the worker lane. Must be called from within a Tokio runtime.
    pub(crate) fn new() -> Self {
        let (jobs_tx, mut jobs_rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            while let Some(job) = jobs_rx.recv().await {
                if let Err(panic) = catch_unwind(AssertUnwindSafe(job)) {
                    #[cfg(feature = "tracing")]
                    tracing::error!(?panic, "Scheduled job panicked");
                    #[cfg(not(feature = "tracing"))]
                    let _ = &panic;
                }
            }
        });

        Self {
            jobs_tx,
            shutdown: CancellationToken::new(),
        }
    }

    /// Run `job` on the lane as soon as possible.
    pub(crate) fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        _ = self.jobs_tx.send(Box::new(job));
    }

    /// Run `job` on the lane once, after `delay`.
    pub(crate) fn schedule<F>(&self, delay: Duration, job: F) -> CancellationToken
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.shutdown.child_token();
        let timer_token = token.clone();
        let jobs_tx = self.jobs_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = timer_token.cancelled() => {}
                () = sleep(delay) => {
                    let guard = timer_token.clone();
                    _ = jobs_tx.send(Box::new(move || {
                        if !guard.is_cancelled() {
                            job();
                        }
                    }));
                }
            }
        });

        token
    }

    /// Run `job` on the lane every `period`, first after `period`, until the token is cancelled.
    pub(crate) fn schedule_repeating<F>(&self, period: Duration, job: F) -> CancellationToken
    where
        F: Fn() + Send + Sync + 'static,
    {
        let token = self.shutdown.child_token();
        let timer_token = token.clone();
        let jobs_tx = self.jobs_tx.clone();
        let job = Arc::new(job);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = timer_token.cancelled() => break,
                    () = sleep(period) => {
                        let guard = timer_token.clone();
                        let job = Arc::clone(&job);
                        let queued = jobs_tx.send(Box::new(move || {
                            if !guard.is_cancelled() {
                                job();
                            }
                        }));
                        if queued.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        token
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
