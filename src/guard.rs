//! Bounded, retrying calls into collaborators.
//!
//! Every call runs on its own thread so a hung collaborator can be abandoned
//! once the timeout elapses. The abandoned thread finishes in the background
//! and its late answer is dropped; a collaborator that never returns keeps its
//! thread for the life of the process, one per timed-out attempt.
use super::collaborators::{CollaboratorError, LifecycleEvent, Notifier};
use super::config::{RetryPolicy, SchedulerConfig};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct CollaboratorGuard {
    timeout: Duration,
    retry: RetryPolicy,
}

impl CollaboratorGuard {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::new(config.collaborator_timeout, config.retry)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Call `f` with the configured timeout, retrying transient failures
    /// according to the retry policy.
    pub fn call<T, F>(&self, collaborator: &'static str, f: F) -> Result<T, CollaboratorError>
    where
        T: Send + 'static,
        F: Fn() -> Result<T, CollaboratorError> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let mut attempt = 1;

        loop {
            let call = Arc::clone(&f);
            match self.call_once(collaborator, move || (*call)()) {
                Err(err) if err.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    tracing::warn!(
                        collaborator,
                        attempt,
                        error = %err,
                        retry_in = ?delay,
                        "collaborator call failed, retrying"
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        tracing::warn!(
                            collaborator,
                            attempt,
                            error = %err,
                            "collaborator call failed"
                        );
                    }
                    return Err(err);
                }
                ok => return ok,
            }
        }
    }

    fn call_once<T, F>(&self, collaborator: &'static str, f: F) -> Result<T, CollaboratorError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, CollaboratorError> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("{collaborator} call"))
            .spawn(move || {
                // the receiver is gone once the caller timed out
                let _ = tx.send(f());
            })
            .map_err(|err| CollaboratorError::Unavailable(err.to_string()))?;

        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CollaboratorError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(CollaboratorError::Unavailable(format!(
                "{collaborator} call ended without an answer"
            ))),
        }
    }
}

/// Delivers lifecycle events on a background thread, one at a time and in the
/// order they were handed over. `notify` never waits for the notifier.
pub struct NotificationDispatcher {
    tx: mpsc::Sender<LifecycleEvent>,
}

impl NotificationDispatcher {
    pub fn spawn(notifier: Arc<dyn Notifier>) -> Self {
        let (tx, rx) = mpsc::channel::<LifecycleEvent>();
        let worker = thread::Builder::new()
            .name("notifier".into())
            .spawn(move || {
                // ends once every sender is dropped
                for event in rx {
                    deliver(notifier.as_ref(), &event);
                }
            });

        if let Err(err) = worker {
            tracing::error!(error = %err, "notifier thread not started, events will be dropped");
        }
        Self { tx }
    }

    /// Queue `event` for delivery. The mutation that produced it is already
    /// committed, so a lost event is only logged.
    pub fn notify(&self, event: LifecycleEvent) {
        if self.tx.send(event).is_err() {
            tracing::warn!(
                event = %event.kind,
                appointment_id = %event.appointment_id,
                "notifier thread gone, event dropped"
            );
        }
    }
}

fn deliver(notifier: &dyn Notifier, event: &LifecycleEvent) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| notifier.emit(event)));
    if outcome.is_err() {
        tracing::warn!(
            event = %event.kind,
            appointment_id = %event.appointment_id,
            "notification not delivered"
        );
    }
}
