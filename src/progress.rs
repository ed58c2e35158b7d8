//! Observer trait for tracker state changes.
//!
//! Inject an [`Arc<dyn TrackerObserver>`] via
//! [`crate::tracker::JobTracker::with_observer`] to hear about every applied
//! transition. The observer is how the UI layer (the CLI spinner, a web
//! socket, a test recorder) follows a job without polling the tracker.
//!
//! # Example
//!
//! ```rust
//! use disclosure_intake::{Phase, TrackerObserver};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Log(Mutex<Vec<String>>);
//!
//! impl TrackerObserver for Log {
//!     fn on_phase_change(&self, from: Phase, to: Phase) {
//!         self.0.lock().unwrap().push(format!("{from} -> {to}"));
//!     }
//! }
//! ```

use crate::machine::Phase;
use std::sync::Arc;

/// Called by the tracker after each applied transition.
///
/// All methods default to no-ops. Implementations must be `Send + Sync`:
/// the tracker may live on any tokio worker thread.
pub trait TrackerObserver: Send + Sync {
    /// The phase changed. Not called for `processing` → `processing`.
    fn on_phase_change(&self, from: Phase, to: Phase) {
        let _ = (from, to);
    }

    /// The displayed message changed while uploading or processing.
    fn on_progress(&self, message: &str) {
        let _ = message;
    }

    /// The job reached `success` or `error`.
    ///
    /// # Arguments
    /// * `phase`   — the terminal phase
    /// * `message` — the message the UI should show
    fn on_finished(&self, phase: Phase, message: &str) {
        let _ = (phase, message);
    }
}

/// A no-op observer; the default when none is configured.
pub struct NoopObserver;

impl TrackerObserver for NoopObserver {}

/// Convenience alias for the type stored in the tracker.
pub type SharedObserver = Arc<dyn TrackerObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        changes: AtomicUsize,
        finished: AtomicUsize,
    }

    impl TrackerObserver for Counting {
        fn on_phase_change(&self, _from: Phase, _to: Phase) {
            self.changes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_finished(&self, _phase: Phase, _message: &str) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let o = NoopObserver;
        o.on_phase_change(Phase::Idle, Phase::Staged);
        o.on_progress("parsing");
        o.on_finished(Phase::Success, "done");
    }

    #[test]
    fn arc_dyn_observer_dispatches() {
        let c = Arc::new(Counting {
            changes: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        });
        let o: SharedObserver = c.clone();
        o.on_phase_change(Phase::Staged, Phase::Uploading);
        o.on_progress("ignored by default");
        o.on_finished(Phase::Error, "Lost connection to server.");
        assert_eq!(c.changes.load(Ordering::SeqCst), 1);
        assert_eq!(c.finished.load(Ordering::SeqCst), 1);
    }
}
