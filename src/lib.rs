//! # disclosure-intake
//!
//! Submit a PDF disclosure report to a remote analysis backend and track the
//! resulting pipeline job until it finishes.
//!
//! ## Why this crate?
//!
//! The backend's pipeline (vectorise the report, match it against a
//! standard's rules, rerank) takes minutes and runs asynchronously: the
//! upload call only returns a job id, and progress has to be polled. Doing
//! that with ad hoc callbacks and a bare interval invites every classic bug:
//! a timer that is never cleared, a late response from an abandoned job
//! overwriting the new one, a file swapped while its upload is in flight.
//! This crate models the client side as an explicit state machine so each of
//! those is ruled out by construction.
//!
//! ## Overview
//!
//! ```text
//! user input
//!  │
//!  ├─ 1. Intake    validate the candidate (PDF only) and job configuration
//!  ├─ 2. Submit    one multipart POST → job id            (uploading)
//!  ├─ 3. Poll      GET /status/{id} on a fixed interval   (processing)
//!  └─ 4. Outcome   completed / failed / connection lost   (success | error)
//!                  reset → back to idle
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use disclosure_intake::{
//!     ClientConfig, Intake, JobTracker, ReqwestTransport, Standard, resolve_candidate,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder().base_url("http://localhost:8000").build()?;
//!     let transport = Arc::new(ReqwestTransport::new(config.clone())?);
//!     let mut intake = Intake::new(JobTracker::new(transport, config.clone()));
//!
//!     intake.select_file(resolve_candidate("report.pdf", config.download_timeout_secs).await?)?;
//!     intake.set_standard(Standard::Tcfd)?;
//!     intake.begin_submission()?;
//!
//!     let phase = intake.run_to_completion().await;
//!     println!("{phase}: {}", intake.snapshot().message);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `intake` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod candidate;
pub mod config;
pub mod error;
pub mod intake;
pub mod machine;
pub mod progress;
pub mod schedule;
pub mod tracker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::http::ReqwestTransport;
pub use backend::standards::upload_standard_rules;
pub use backend::{HttpResponse, HttpTransport, MultipartBody, TransportError};
pub use candidate::{resolve_candidate, CandidateFile, PDF_MEDIA_TYPE};
pub use config::{ClientConfig, ClientConfigBuilder, JobConfig, Standard};
pub use error::{IntakeError, JobFailure};
pub use intake::{DragEvent, Intake, IntakeSnapshot};
pub use machine::{JobHandle, Phase, PollOutcome, SubmissionOutcome, TrackerState};
pub use progress::{NoopObserver, SharedObserver, TrackerObserver};
pub use tracker::JobTracker;
