use crate::application::state_machine::PaymentStateMachine;
use crate::domain::payment::{PaymentId, PaymentStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// How a poll run ended. A timeout is a soft, client-side give-up: the
/// payment may still resolve server-side afterwards.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Settled(PaymentStatus),
    TimedOut { attempts: u32 },
}

struct ActivePoll {
    handle: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
    outcome: watch::Receiver<Option<PollOutcome>>,
}

/// Bounded, cancellable status loop for the mobile-money rail.
///
/// At most one poll runs per poller; starting a new one cancels the previous
/// task first. `stop()` takes effect before the next tick fires, and a tick
/// already in flight has its result discarded.
#[derive(Default)]
pub struct StatusPoller {
    active: Option<ActivePoll>,
}

impl StatusPoller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|poll| !poll.handle.is_finished())
    }

    /// Schedules `max_attempts` refreshes at `interval` spacing, stopping
    /// early once the status reaches `completed` or `failed`.
    pub fn start(
        &mut self,
        machine: Arc<Mutex<PaymentStateMachine>>,
        payment_id: PaymentId,
        interval: Duration,
        max_attempts: u32,
    ) {
        self.stop();

        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, rx) = watch::channel(None);
        let flag = Arc::clone(&cancelled);

        tracing::info!(payment_id = %payment_id, ?interval, max_attempts, "status polling started");

        let handle = tokio::spawn(async move {
            for attempt in 1..=max_attempts {
                tokio::time::sleep(interval).await;
                if flag.load(Ordering::SeqCst) {
                    return;
                }

                let refreshed = {
                    let mut machine = machine.lock().await;
                    machine.refresh().await
                };

                // A stop() issued while the refresh was in flight wins: the
                // result is discarded rather than resurrecting the poll.
                if flag.load(Ordering::SeqCst) {
                    return;
                }

                match refreshed {
                    Ok(snapshot) => {
                        if let Some(
                            status @ (PaymentStatus::Completed | PaymentStatus::Failed),
                        ) = snapshot.status
                        {
                            tracing::info!(payment_id = %payment_id, %status, "polling settled");
                            let _ = tx.send(Some(PollOutcome::Settled(status)));
                            return;
                        }
                    }
                    Err(err) => {
                        // Transport hiccup: the attempt is spent, the loop
                        // carries on.
                        tracing::debug!(payment_id = %payment_id, attempt, error = %err, "status check failed");
                    }
                }
            }

            tracing::info!(payment_id = %payment_id, max_attempts, "polling timed out");
            let _ = tx.send(Some(PollOutcome::TimedOut {
                attempts: max_attempts,
            }));
        });

        self.active = Some(ActivePoll {
            handle,
            cancelled,
            outcome: rx,
        });
    }

    /// Cancels the active poll, if any. Idempotent.
    pub fn stop(&mut self) {
        if let Some(poll) = self.active.take() {
            poll.cancelled.store(true, Ordering::SeqCst);
            poll.handle.abort();
        }
    }

    /// Waits for the current poll to finish. `None` when no poll is active
    /// or the poll was stopped before producing an outcome.
    pub async fn wait(&mut self) -> Option<PollOutcome> {
        let mut rx = self.active.as_ref()?.outcome.clone();
        loop {
            if let Some(outcome) = rx.borrow_and_update().clone() {
                return Some(outcome);
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
