//! The job-tracking state machine.
//!
//! [`transition`] is the only place tracker state changes. It is a pure
//! function of `(state, event)`: it never performs I/O, it only returns the
//! next state plus the [`Effect`]s the driver ([`crate::tracker::JobTracker`])
//! must run. Every pair is handled; pairs that make no sense return the
//! state untouched with [`Disposition::Ignored`].
//!
//! ```text
//!            select            begin              accepted
//!   idle ───────────▶ staged ───────▶ uploading ───────────▶ processing ◀─┐
//!    ▲    ◀───────────   │               │                    │  │  │     │ running
//!    │       clear       │ select        │ rejected / lost    │  │  └─────┘
//!    │                   └──┘            ▼                    │  │
//!    │                                 error ◀────────────────┘  │ failed / lost
//!    │  reset (from anywhere)            │                       ▼ completed
//!    └───────────────────────────────────┴─────────────────── success
//! ```
//!
//! Two structural guarantees fall out of the types:
//!
//! * The poll timer's [`PollHandle`] exists only inside
//!   [`TrackerState::Processing`]. Every transition out of `processing`
//!   cancels it, and dropping the state cancels it too.
//! * Network completions carry the [`Generation`] (and for polls, the
//!   [`JobHandle`]) they were issued for. Anything that does not match the
//!   live job is discarded as [`Ignored::Stale`].

use crate::candidate::CandidateFile;
use crate::config::JobConfig;
use crate::error::JobFailure;
use crate::schedule::PollHandle;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Message shown while the upload call is in flight.
pub const UPLOADING_MESSAGE: &str = "Uploading PDF & Starting Pipeline...";

/// Shown for a non-terminal poll that carried no message.
pub const ANALYZING_MESSAGE: &str = "AI is analyzing...";

/// Fallback success message when the backend sends none.
pub const COMPLETED_MESSAGE: &str = "Pipeline completed.";

// ── Identifiers ──────────────────────────────────────────────────────────

/// Opaque job identifier issued by the backend on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Submission counter. Bumped by the driver for every submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Generation(u64);

impl Generation {
    pub fn next(self) -> Self {
        Generation(self.0 + 1)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

// ── Requests and outcomes ────────────────────────────────────────────────

/// Immutable snapshot of file + configuration taken when a job starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    file: CandidateFile,
    config: JobConfig,
}

impl SubmissionRequest {
    pub fn new(file: CandidateFile, config: JobConfig) -> Self {
        Self { file, config }
    }

    pub fn file(&self) -> &CandidateFile {
        &self.file
    }

    pub fn config(&self) -> JobConfig {
        self.config
    }
}

/// How the submission call resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The backend accepted the file and started a job.
    Accepted {
        job: JobHandle,
        message: Option<String>,
    },
    /// Anything else: non-2xx, malformed body, network failure.
    Rejected(JobFailure),
}

/// Classification of one status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Non-terminal; the message replaces the previous one.
    Running { message: String },
    /// Terminal success.
    Completed { message: String },
    /// Terminal failure reported by the pipeline.
    Failed { message: String },
    /// The poll itself failed or the response was unreadable. Terminal.
    Transport { detail: String },
}

impl PollOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollOutcome::Running { .. })
    }
}

// ── States ───────────────────────────────────────────────────────────────

/// Payload-free tag of a [`TrackerState`], for display and authorisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Staged,
    Uploading,
    Processing,
    Success,
    Error,
}

impl Phase {
    /// File selection and configuration changes are allowed.
    pub fn accepts_input(self) -> bool {
        matches!(self, Phase::Idle | Phase::Staged)
    }

    /// A network call is outstanding or scheduled.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Phase::Uploading | Phase::Processing)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Success | Phase::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Staged => "staged",
            Phase::Uploading => "uploading",
            Phase::Processing => "processing",
            Phase::Success => "success",
            Phase::Error => "error",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single source of truth for rendering.
#[derive(Debug, Default)]
pub enum TrackerState {
    /// No candidate.
    #[default]
    Idle,
    /// Candidate validated and held; no network activity.
    Staged { candidate: CandidateFile },
    /// Submission call in flight; no job handle yet.
    Uploading {
        generation: Generation,
        request: SubmissionRequest,
        message: String,
    },
    /// Job handle obtained; polling active.
    Processing {
        generation: Generation,
        request: SubmissionRequest,
        job: JobHandle,
        message: String,
        poll: PollHandle,
    },
    /// The job completed.
    Success { job: JobHandle, message: String },
    /// Submission or processing failed, or the connection was lost.
    Error {
        job: Option<JobHandle>,
        failure: JobFailure,
    },
}

impl TrackerState {
    pub fn phase(&self) -> Phase {
        match self {
            TrackerState::Idle => Phase::Idle,
            TrackerState::Staged { .. } => Phase::Staged,
            TrackerState::Uploading { .. } => Phase::Uploading,
            TrackerState::Processing { .. } => Phase::Processing,
            TrackerState::Success { .. } => Phase::Success,
            TrackerState::Error { .. } => Phase::Error,
        }
    }

    /// The message the UI shows; empty in `idle` and `staged`.
    pub fn message(&self) -> String {
        match self {
            TrackerState::Idle | TrackerState::Staged { .. } => String::new(),
            TrackerState::Uploading { message, .. }
            | TrackerState::Processing { message, .. }
            | TrackerState::Success { message, .. } => message.clone(),
            TrackerState::Error { failure, .. } => failure.to_string(),
        }
    }

    pub fn candidate(&self) -> Option<&CandidateFile> {
        match self {
            TrackerState::Staged { candidate } => Some(candidate),
            TrackerState::Uploading { request, .. } | TrackerState::Processing { request, .. } => {
                Some(request.file())
            }
            _ => None,
        }
    }

    pub fn job(&self) -> Option<&JobHandle> {
        match self {
            TrackerState::Processing { job, .. } | TrackerState::Success { job, .. } => Some(job),
            TrackerState::Error { job, .. } => job.as_ref(),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        match self {
            TrackerState::Error { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// True only while a live, uncancelled poll timer exists.
    pub fn is_polling(&self) -> bool {
        matches!(self, TrackerState::Processing { poll, .. } if !poll.is_cancelled())
    }
}

// ── Events, effects, transitions ─────────────────────────────────────────

/// Everything that can happen to the tracker.
#[derive(Debug, Clone)]
pub enum Event {
    /// A validated candidate was selected (picker or drop).
    Select(CandidateFile),
    /// The user discarded the staged candidate.
    Clear,
    /// The user started processing with this configuration.
    Begin {
        generation: Generation,
        config: JobConfig,
    },
    /// The submission call resolved.
    Submitted {
        generation: Generation,
        outcome: SubmissionOutcome,
    },
    /// A status poll resolved.
    Polled {
        generation: Generation,
        job: JobHandle,
        outcome: PollOutcome,
    },
    /// Return to `idle`, abandoning any job.
    Reset,
}

/// Work the driver must perform after a transition.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Issue the submission call exactly once.
    Submit {
        generation: Generation,
        request: SubmissionRequest,
    },
    /// Start the poll timer. It must stop when `cancel` fires.
    StartPolling {
        generation: Generation,
        job: JobHandle,
        cancel: CancellationToken,
    },
}

/// Why an event did not change anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ignored {
    /// A network completion for a job that is no longer live.
    Stale,
    /// The event has no meaning in this phase.
    NotApplicable { phase: Phase },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Applied,
    Ignored(Ignored),
}

/// Result of [`transition`].
#[derive(Debug)]
pub struct Transition {
    pub state: TrackerState,
    pub effects: Vec<Effect>,
    pub disposition: Disposition,
}

impl Transition {
    fn applied(state: TrackerState) -> Self {
        Self {
            state,
            effects: Vec::new(),
            disposition: Disposition::Applied,
        }
    }

    fn with_effect(state: TrackerState, effect: Effect) -> Self {
        Self {
            state,
            effects: vec![effect],
            disposition: Disposition::Applied,
        }
    }

    fn ignored(state: TrackerState, why: Ignored) -> Self {
        Self {
            state,
            effects: Vec::new(),
            disposition: Disposition::Ignored(why),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.disposition == Disposition::Applied
    }
}

/// Compute the next state for `event`.
pub fn transition(state: TrackerState, event: Event) -> Transition {
    use TrackerState as S;

    match (state, event) {
        (_, Event::Reset) => Transition::applied(S::Idle),

        (S::Idle | S::Staged { .. }, Event::Select(candidate)) if candidate.is_pdf() => {
            Transition::applied(S::Staged { candidate })
        }

        (S::Idle | S::Staged { .. }, Event::Clear) => Transition::applied(S::Idle),

        (S::Staged { candidate }, Event::Begin { generation, config }) => Transition::with_effect(
            S::Uploading {
                generation,
                request: SubmissionRequest::new(candidate.clone(), config),
                message: UPLOADING_MESSAGE.to_string(),
            },
            Effect::Submit {
                generation,
                request: SubmissionRequest::new(candidate, config),
            },
        ),

        (
            S::Uploading {
                generation,
                request,
                message,
            },
            Event::Submitted {
                generation: issued,
                outcome,
            },
        ) if issued == generation => match outcome {
            SubmissionOutcome::Accepted {
                job,
                message: accepted,
            } => {
                let poll = PollHandle::new();
                let cancel = poll.token();
                Transition::with_effect(
                    S::Processing {
                        generation,
                        request,
                        job: job.clone(),
                        message: accepted.filter(|m| !m.is_empty()).unwrap_or(message),
                        poll,
                    },
                    Effect::StartPolling {
                        generation,
                        job,
                        cancel,
                    },
                )
            }
            SubmissionOutcome::Rejected(failure) => {
                Transition::applied(S::Error { job: None, failure })
            }
        },

        (
            S::Processing {
                generation,
                request,
                job,
                poll,
                ..
            },
            Event::Polled {
                generation: issued,
                job: polled,
                outcome,
            },
        ) if issued == generation && polled == job => match outcome {
            PollOutcome::Running { message } => Transition::applied(S::Processing {
                generation,
                request,
                job,
                message: if message.is_empty() {
                    ANALYZING_MESSAGE.to_string()
                } else {
                    message
                },
                poll,
            }),
            PollOutcome::Completed { message } => {
                poll.cancel();
                Transition::applied(S::Success { job, message })
            }
            PollOutcome::Failed { message } => {
                poll.cancel();
                Transition::applied(S::Error {
                    job: Some(job),
                    failure: JobFailure::Processing { message },
                })
            }
            PollOutcome::Transport { detail } => {
                poll.cancel();
                Transition::applied(S::Error {
                    job: Some(job),
                    failure: JobFailure::Connectivity { detail },
                })
            }
        },

        (state, Event::Submitted { .. } | Event::Polled { .. }) => {
            Transition::ignored(state, Ignored::Stale)
        }

        (state, Event::Select(_) | Event::Clear | Event::Begin { .. }) => {
            let phase = state.phase();
            Transition::ignored(state, Ignored::NotApplicable { phase })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Standard;

    fn pdf() -> CandidateFile {
        CandidateFile::from_bytes("report.pdf", b"%PDF-1.7".to_vec())
    }

    fn gen(n: u64) -> Generation {
        (0..n).fold(Generation::default(), |g, _| g.next())
    }

    fn staged() -> TrackerState {
        transition(TrackerState::Idle, Event::Select(pdf())).state
    }

    fn uploading(g: Generation) -> TrackerState {
        transition(
            staged(),
            Event::Begin {
                generation: g,
                config: JobConfig::default(),
            },
        )
        .state
    }

    /// Returns the processing state and the poll token handed to the driver.
    fn processing(g: Generation, id: &str) -> (TrackerState, CancellationToken) {
        let t = transition(
            uploading(g),
            Event::Submitted {
                generation: g,
                outcome: SubmissionOutcome::Accepted {
                    job: JobHandle::new(id),
                    message: None,
                },
            },
        );
        let token = match t.effects.as_slice() {
            [Effect::StartPolling { cancel, .. }] => cancel.clone(),
            other => panic!("expected StartPolling, got {other:?}"),
        };
        (t.state, token)
    }

    fn poll(g: Generation, id: &str, outcome: PollOutcome) -> Event {
        Event::Polled {
            generation: g,
            job: JobHandle::new(id),
            outcome,
        }
    }

    fn running(msg: &str) -> PollOutcome {
        PollOutcome::Running {
            message: msg.into(),
        }
    }

    #[test]
    fn select_stages_pdf() {
        let t = transition(TrackerState::Idle, Event::Select(pdf()));
        assert!(t.is_applied());
        assert_eq!(t.state.phase(), Phase::Staged);
        assert_eq!(t.state.candidate().unwrap().name(), "report.pdf");
    }

    #[test]
    fn select_non_pdf_is_not_applicable() {
        let png = CandidateFile::from_bytes("image.png", vec![0x89, b'P']);
        let t = transition(TrackerState::Idle, Event::Select(png));
        assert_eq!(
            t.disposition,
            Disposition::Ignored(Ignored::NotApplicable { phase: Phase::Idle })
        );
        assert_eq!(t.state.phase(), Phase::Idle);
    }

    #[test]
    fn reselect_replaces_candidate() {
        let other = CandidateFile::from_bytes("other.pdf", b"%PDF".to_vec());
        let t = transition(staged(), Event::Select(other));
        assert_eq!(t.state.candidate().unwrap().name(), "other.pdf");
    }

    #[test]
    fn clear_returns_to_idle() {
        let t = transition(staged(), Event::Clear);
        assert_eq!(t.state.phase(), Phase::Idle);
        assert!(t.state.candidate().is_none());
    }

    #[test]
    fn begin_issues_exactly_one_submit() {
        let config = JobConfig {
            standard: Standard::Sasb,
            force_update: true,
        };
        let t = transition(
            staged(),
            Event::Begin {
                generation: gen(1),
                config,
            },
        );
        assert_eq!(t.state.phase(), Phase::Uploading);
        assert_eq!(t.state.message(), UPLOADING_MESSAGE);
        match t.effects.as_slice() {
            [Effect::Submit {
                generation,
                request,
            }] => {
                assert_eq!(*generation, gen(1));
                assert_eq!(request.config(), config);
                assert_eq!(request.file().name(), "report.pdf");
            }
            other => panic!("expected one Submit, got {other:?}"),
        }
    }

    #[test]
    fn begin_without_candidate_is_not_applicable() {
        let t = transition(
            TrackerState::Idle,
            Event::Begin {
                generation: gen(1),
                config: JobConfig::default(),
            },
        );
        assert!(!t.is_applied());
        assert!(t.effects.is_empty());
    }

    #[test]
    fn accepted_submission_starts_polling() {
        let (state, token) = processing(gen(1), "abc123");
        assert_eq!(state.phase(), Phase::Processing);
        assert_eq!(state.job().unwrap().as_str(), "abc123");
        assert!(state.is_polling());
        assert!(!token.is_cancelled());
        // No server message: the uploading message stays.
        assert_eq!(state.message(), UPLOADING_MESSAGE);
    }

    #[test]
    fn accepted_message_replaces_uploading_message() {
        let t = transition(
            uploading(gen(1)),
            Event::Submitted {
                generation: gen(1),
                outcome: SubmissionOutcome::Accepted {
                    job: JobHandle::new("j"),
                    message: Some("Processing started.".into()),
                },
            },
        );
        assert_eq!(t.state.message(), "Processing started.");
    }

    #[test]
    fn rejected_submission_is_error_without_job() {
        let t = transition(
            uploading(gen(1)),
            Event::Submitted {
                generation: gen(1),
                outcome: SubmissionOutcome::Rejected(JobFailure::submission(Some(
                    "Standard not found".into(),
                ))),
            },
        );
        assert_eq!(t.state.phase(), Phase::Error);
        assert_eq!(t.state.message(), "Standard not found");
        assert!(t.state.job().is_none());
        assert!(t.effects.is_empty());
    }

    #[test]
    fn submission_from_other_generation_is_stale() {
        let t = transition(
            uploading(gen(2)),
            Event::Submitted {
                generation: gen(1),
                outcome: SubmissionOutcome::Accepted {
                    job: JobHandle::new("old"),
                    message: None,
                },
            },
        );
        assert_eq!(t.disposition, Disposition::Ignored(Ignored::Stale));
        assert_eq!(t.state.phase(), Phase::Uploading);
    }

    #[test]
    fn running_polls_only_change_message() {
        let (mut state, token) = processing(gen(1), "abc123");
        for msg in ["Step 1/3: Vectorizing...", "Step 2/3: Matching...", ""] {
            let t = transition(state, poll(gen(1), "abc123", running(msg)));
            assert!(t.is_applied());
            assert!(t.effects.is_empty());
            state = t.state;
            assert_eq!(state.phase(), Phase::Processing);
            assert!(!token.is_cancelled());
        }
        assert_eq!(state.message(), ANALYZING_MESSAGE);
    }

    #[test]
    fn completed_stops_timer() {
        let (state, token) = processing(gen(1), "abc123");
        let t = transition(
            state,
            poll(
                gen(1),
                "abc123",
                PollOutcome::Completed {
                    message: "done".into(),
                },
            ),
        );
        assert_eq!(t.state.phase(), Phase::Success);
        assert_eq!(t.state.message(), "done");
        assert!(token.is_cancelled());
        assert!(!t.state.is_polling());
    }

    #[test]
    fn failed_stops_timer_with_processing_error() {
        let (state, token) = processing(gen(1), "abc123");
        let t = transition(
            state,
            poll(
                gen(1),
                "abc123",
                PollOutcome::Failed {
                    message: "rerank crashed".into(),
                },
            ),
        );
        assert_eq!(t.state.phase(), Phase::Error);
        assert_eq!(t.state.message(), "Processing Error: rerank crashed");
        assert!(token.is_cancelled());
    }

    #[test]
    fn transport_error_then_late_response_is_discarded() {
        let (state, token) = processing(gen(1), "abc123");
        let t = transition(
            state,
            poll(
                gen(1),
                "abc123",
                PollOutcome::Transport {
                    detail: "connection reset".into(),
                },
            ),
        );
        assert_eq!(t.state.phase(), Phase::Error);
        assert_eq!(t.state.message(), crate::error::CONNECTION_LOST);
        assert!(token.is_cancelled());

        let late = transition(
            t.state,
            poll(
                gen(1),
                "abc123",
                PollOutcome::Completed {
                    message: "done".into(),
                },
            ),
        );
        assert_eq!(late.disposition, Disposition::Ignored(Ignored::Stale));
        assert_eq!(late.state.phase(), Phase::Error);
        assert_eq!(late.state.message(), crate::error::CONNECTION_LOST);
    }

    #[test]
    fn poll_for_other_job_is_stale() {
        let (state, token) = processing(gen(3), "new");
        let t = transition(state, poll(gen(3), "old", running("nope")));
        assert_eq!(t.disposition, Disposition::Ignored(Ignored::Stale));
        assert_eq!(t.state.message(), UPLOADING_MESSAGE);
        assert!(!token.is_cancelled());

        let t = transition(t.state, poll(gen(2), "new", running("nope")));
        assert_eq!(t.disposition, Disposition::Ignored(Ignored::Stale));
    }

    #[test]
    fn reset_from_processing_cancels_timer() {
        let (state, token) = processing(gen(1), "abc123");
        let t = transition(state, Event::Reset);
        assert_eq!(t.state.phase(), Phase::Idle);
        assert!(token.is_cancelled());
    }

    #[test]
    fn reset_from_every_state_is_idle_and_idempotent() {
        let states = vec![
            TrackerState::Idle,
            staged(),
            uploading(gen(1)),
            processing(gen(1), "a").0,
            TrackerState::Success {
                job: JobHandle::new("a"),
                message: "done".into(),
            },
            TrackerState::Error {
                job: None,
                failure: JobFailure::submission(None),
            },
        ];
        for s in states {
            let once = transition(s, Event::Reset).state;
            let twice = transition(once, Event::Reset).state;
            assert_eq!(twice.phase(), Phase::Idle);
            assert!(twice.candidate().is_none());
            assert!(twice.job().is_none());
            assert!(twice.message().is_empty());
        }
    }

    #[test]
    fn input_events_are_refused_while_busy() {
        let (state, _token) = processing(gen(1), "a");
        let t = transition(state, Event::Select(pdf()));
        assert_eq!(
            t.disposition,
            Disposition::Ignored(Ignored::NotApplicable {
                phase: Phase::Processing
            })
        );
        let t = transition(t.state, Event::Clear);
        assert!(!t.is_applied());
        assert_eq!(t.state.phase(), Phase::Processing);
        assert!(t.state.is_polling());
    }

    #[test]
    fn phase_predicates() {
        assert!(Phase::Idle.accepts_input());
        assert!(Phase::Staged.accepts_input());
        assert!(!Phase::Uploading.accepts_input());
        assert!(Phase::Processing.is_in_flight());
        assert!(Phase::Success.is_terminal());
        assert!(Phase::Error.is_terminal());
        assert_eq!(Phase::Uploading.to_string(), "uploading");
    }
}
