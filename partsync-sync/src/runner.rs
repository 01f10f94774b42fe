//! Single-flight job runner.
//!
//! At most one job per [`JobKind`] is in flight. A submission while the slot
//! is busy is dropped (not queued). Each accepted job yields exactly one
//! [`JobCompletion`] through the completion sink, even if the job panics.
//!
//! The slot stays held until the consumer of the completion calls
//! [`JobRunner::complete`]; only if the completion cannot be delivered does
//! the worker release the slot itself.

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use partsync_core::{DispatchError, JobCompletion, JobKind, JobOutcome};

use crate::jobs::JobExecutor;

/// Receives finished jobs, normally by queueing them onto the control task.
pub type CompletionSink = Arc<dyn Fn(JobCompletion) -> Result<(), DispatchError> + Send + Sync>;

/// One in-progress flag per job kind.
#[derive(Debug, Default)]
pub struct JobSlots {
    pull: AtomicBool,
    push: AtomicBool,
}

impl JobSlots {
    fn slot(&self, kind: JobKind) -> &AtomicBool {
        match kind {
            JobKind::Pull => &self.pull,
            JobKind::Push => &self.push,
        }
    }

    /// `true` if the slot was free and is now held.
    pub fn try_acquire(&self, kind: JobKind) -> bool {
        self.slot(kind)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self, kind: JobKind) {
        self.slot(kind).store(false, Ordering::Release);
    }

    pub fn is_busy(&self, kind: JobKind) -> bool {
        self.slot(kind).load(Ordering::Acquire)
    }
}

#[derive(Clone)]
pub struct JobRunner {
    slots: Arc<JobSlots>,
    on_complete: CompletionSink,
}

impl JobRunner {
    pub fn new(on_complete: CompletionSink) -> Self {
        Self {
            slots: Arc::new(JobSlots::default()),
            on_complete,
        }
    }

    pub fn in_progress(&self, kind: JobKind) -> bool {
        self.slots.is_busy(kind)
    }

    /// Run `job` on a worker task unless a job of `kind` is already running.
    ///
    /// Returns whether the job was accepted.
    pub fn submit<F>(&self, kind: JobKind, job: F) -> bool
    where
        F: Future<Output = JobOutcome> + Send + 'static,
    {
        if !self.slots.try_acquire(kind) {
            tracing::info!(kind = %kind, "job already in progress; request ignored");
            return false;
        }
        tracing::info!(kind = %kind, "job started");

        let slots = self.slots.clone();
        let on_complete = self.on_complete.clone();
        tokio::spawn(async move {
            let outcome = match tokio::spawn(job).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    let detail = if err.is_panic() {
                        panic_message(err.into_panic())
                    } else {
                        "job was cancelled".to_string()
                    };
                    tracing::error!(kind = %kind, error = %detail, "job crashed");
                    JobOutcome::failure(format!("Unexpected error in {kind} job: {detail}"))
                }
            };
            tracing::info!(kind = %kind, success = outcome.success, "job finished");

            if let Err(err) = on_complete(JobCompletion { kind, outcome }) {
                tracing::warn!(kind = %kind, error = %err, "releasing job slot after failed delivery");
                slots.release(kind);
            }
        });
        true
    }

    /// Submit `kind` to an executor.
    pub fn submit_to(&self, kind: JobKind, executor: Arc<dyn JobExecutor>) -> bool {
        self.submit(kind, async move { executor.run(kind).await })
    }

    /// Release the slot for `kind` once its completion has been handled.
    pub fn complete(&self, kind: JobKind) {
        self.slots.release(kind);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
