//! The job tracker: drives the state machine and runs its effects.
//!
//! ## Execution model
//!
//! `JobTracker` is a single logical actor. All state changes happen inside
//! `&mut self` methods, one event at a time. Network calls run in spawned
//! tokio tasks that never touch the state: they send their result back as
//! an [`Event`] over an unbounded channel, and the owner applies it with
//! [`JobTracker::next_update`] (or [`JobTracker::run_to_completion`]).
//!
//! ```text
//!  submit() ──▶ transition ──▶ Effect::Submit ──▶ spawn(post /process-pdf)
//!                                                        │ Event::Submitted
//!  next_update() ◀────────────── channel ◀───────────────┘
//!       │
//!       └──▶ transition ──▶ Effect::StartPolling ──▶ schedule::every(get /status/{id})
//!                                                        │ Event::Polled (×N)
//!  next_update() ◀────────────── channel ◀───────────────┘
//! ```
//!
//! Completions that belong to an abandoned job still arrive on the channel;
//! the state machine discards them as stale. A network task that panics
//! still reports back, as a connectivity failure, so `uploading` and
//! `processing` always resolve.

use crate::backend::{protocol, HttpTransport};
use crate::candidate::CandidateFile;
use crate::config::{ClientConfig, JobConfig};
use crate::error::JobFailure;
use crate::machine::{
    transition, Disposition, Effect, Event, Generation, Ignored, Phase, PollOutcome,
    SubmissionOutcome, TrackerState,
};
use crate::progress::{NoopObserver, SharedObserver};
use crate::schedule;
use futures::FutureExt;
use std::any::Any;
use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Owns one tracked job at a time.
pub struct JobTracker {
    state: TrackerState,
    generation: Generation,
    transport: Arc<dyn HttpTransport>,
    config: ClientConfig,
    observer: SharedObserver,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

impl JobTracker {
    pub fn new(transport: Arc<dyn HttpTransport>, config: ClientConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: TrackerState::Idle,
            generation: Generation::default(),
            transport,
            config,
            observer: Arc::new(NoopObserver),
            events_tx,
            events_rx,
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn HttpTransport> {
        &self.transport
    }

    /// Generation of the most recent submission (zero before the first).
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Stage a candidate. The caller has already validated it.
    pub fn select(&mut self, candidate: CandidateFile) -> Disposition {
        self.apply(Event::Select(candidate))
    }

    pub fn clear(&mut self) -> Disposition {
        self.apply(Event::Clear)
    }

    /// Submit the staged candidate with `config`.
    ///
    /// Issues exactly one upload call. Must be called from within a tokio
    /// runtime.
    pub fn submit(&mut self, config: JobConfig) -> Disposition {
        let generation = self.generation.next();
        let disposition = self.apply(Event::Begin { generation, config });
        if disposition == Disposition::Applied {
            self.generation = generation;
        }
        disposition
    }

    /// Return to `idle` from any state, abandoning any in-flight job.
    pub fn reset(&mut self) {
        if self.phase().is_in_flight() {
            info!("Abandoning job in phase {}", self.phase());
        }
        self.apply(Event::Reset);
    }

    /// Wait for the next network completion and apply it.
    ///
    /// Returns `None` immediately when nothing is in flight. Stale
    /// completions are drained silently; the call returns after the first
    /// event that changed the state.
    pub async fn next_update(&mut self) -> Option<Phase> {
        while self.phase().is_in_flight() {
            let event = self.events_rx.recv().await?;
            if self.apply(event) == Disposition::Applied {
                return Some(self.phase());
            }
        }
        None
    }

    /// Apply completions until the job leaves `uploading`/`processing`.
    pub async fn run_to_completion(&mut self) -> Phase {
        while self.next_update().await.is_some() {}
        self.phase()
    }

    /// Feed one event through the state machine and run its effects.
    pub(crate) fn apply(&mut self, event: Event) -> Disposition {
        let from = self.state.phase();
        let before = self.state.message();

        let t = transition(std::mem::take(&mut self.state), event);
        self.state = t.state;

        match t.disposition {
            Disposition::Applied => self.notify(from, &before),
            Disposition::Ignored(Ignored::Stale) => {
                warn!("Discarded stale completion while {}", self.state.phase());
            }
            Disposition::Ignored(Ignored::NotApplicable { phase }) => {
                debug!("Event not applicable while {}", phase);
            }
        }

        for effect in t.effects {
            self.run(effect);
        }

        t.disposition
    }

    fn notify(&self, from: Phase, before: &str) {
        let to = self.state.phase();
        let message = self.state.message();

        if from != to {
            info!("Tracker {} -> {}", from, to);
            self.observer.on_phase_change(from, to);
        }
        if to.is_in_flight() && message != before {
            debug!("Progress: {}", message);
            self.observer.on_progress(&message);
        }
        if to.is_terminal() && from != to {
            match self.state.failure() {
                Some(failure) => warn!("Job failed: {:?}", failure),
                None => info!("Job finished: {}", message),
            }
            self.observer.on_finished(to, &message);
        }
    }

    fn run(&self, effect: Effect) {
        match effect {
            Effect::Submit { generation, request } => {
                let transport = Arc::clone(&self.transport);
                let path = self.config.submit_path.clone();
                let tx = self.events_tx.clone();
                info!(
                    "Submitting {} ({}) against {}",
                    request.file().name(),
                    request.file().size_label(),
                    request.config().standard
                );
                tokio::spawn(async move {
                    let call = async {
                        let body = protocol::submission_body(&request);
                        protocol::classify_submission(transport.post_multipart(&path, body).await)
                    };
                    let outcome = match AssertUnwindSafe(call).catch_unwind().await {
                        Ok(outcome) => outcome,
                        Err(panic) => {
                            let detail = format!("submit task panicked: {}", panic_message(&*panic));
                            error!("{}", detail);
                            SubmissionOutcome::Rejected(JobFailure::connectivity(detail))
                        }
                    };
                    // The receiver lives as long as the tracker; a closed
                    // channel means nobody is left to care.
                    let _ = tx.send(Event::Submitted { generation, outcome });
                });
            }
            Effect::StartPolling {
                generation,
                job,
                cancel,
            } => {
                let transport = Arc::clone(&self.transport);
                let path = self.config.status_path_for(job.as_str());
                let tx = self.events_tx.clone();
                info!(
                    "Polling job {} every {}ms",
                    job, self.config.poll_interval_ms
                );
                schedule::every(self.config.poll_interval(), cancel, move || {
                    let transport = Arc::clone(&transport);
                    let path = path.clone();
                    let tx = tx.clone();
                    let job = job.clone();
                    async move {
                        debug!("Polling {}", path);
                        let call = async { protocol::classify_poll(transport.get(&path).await) };
                        let outcome = match AssertUnwindSafe(call).catch_unwind().await {
                            Ok(outcome) => outcome,
                            Err(panic) => {
                                let detail = format!("poll task panicked: {}", panic_message(&*panic));
                                error!("{}", detail);
                                PollOutcome::Transport { detail }
                            }
                        };
                        let terminal = outcome.is_terminal();
                        let _ = tx.send(Event::Polled {
                            generation,
                            job,
                            outcome,
                        });
                        if terminal {
                            ControlFlow::Break(())
                        } else {
                            ControlFlow::Continue(())
                        }
                    }
                });
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

impl std::fmt::Debug for JobTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTracker")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("config", &self.config)
            .finish()
    }
}
