//! Cancellable periodic tasks.
//!
//! Polling is the only timer in the crate. Instead of a bare interval that
//! someone has to remember to clear, [`every`] runs a task on a fixed period
//! inside one spawned tokio task and stops as soon as either the task says
//! so or the paired [`PollHandle`] is cancelled. The handle is owned by the
//! `processing` tracker state, so leaving that state (or dropping it) is what
//! stops the timer.
//!
//! Ticks never overlap: the next tick is only awaited after the previous
//! task future resolved. If a tick's work outlasts the period, the schedule
//! slides ([`MissedTickBehavior::Delay`]) rather than bursting to catch up.

use std::fmt;
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Shortest period [`every`] will tick at.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Owner-side handle of a periodic task. Cancelling is idempotent, and
/// dropping the handle cancels too.
pub struct PollHandle {
    token: CancellationToken,
}

impl PollHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// A token for the task side. It observes this handle's cancellation.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for PollHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl fmt::Debug for PollHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PollHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Run `task` every `period`, first one period from now, until it returns
/// [`ControlFlow::Break`] or `token` is cancelled.
///
/// A zero `period` is treated as [`MIN_PERIOD`].
///
/// Cancellation also interrupts a tick that is in progress: its future is
/// dropped and whatever it would have produced is lost.
pub fn every<F, Fut>(period: Duration, token: CancellationToken, mut task: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ControlFlow<()>> + Send + 'static,
{
    let period = period.max(MIN_PERIOD);
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let flow = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                flow = task() => flow,
            };

            if flow.is_break() {
                break;
            }
        }
    })
}
