//! The intake controller: gatekeeping before any network activity.
//!
//! [`Intake`] owns the [`JobConfig`] and the drop-zone highlight, and wraps
//! the [`JobTracker`]. It is the only writer the UI layer talks to: every
//! mutation is authorised against the tracker's phase first, and rejected
//! synchronously with an [`IntakeError`] if the phase does not allow it.
//! A rejected call never touches tracker state.

use crate::backend::standards;
use crate::candidate::CandidateFile;
use crate::config::{JobConfig, Standard};
use crate::error::IntakeError;
use crate::machine::Phase;
use crate::tracker::JobTracker;
use serde::Serialize;
use tracing::{debug, info};

/// Pointer events over the drop zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragEvent {
    Enter,
    Over,
    Leave,
}

/// Everything a renderer needs, in one serialisable value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeSnapshot {
    pub phase: Phase,
    pub message: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub job_id: Option<String>,
    pub standard: Standard,
    pub force_update: bool,
    pub drag_active: bool,
}

/// Validates and stages one candidate, then hands it to the tracker.
#[derive(Debug)]
pub struct Intake {
    tracker: JobTracker,
    job_config: JobConfig,
    drag_active: bool,
}

impl Intake {
    pub fn new(tracker: JobTracker) -> Self {
        Self {
            tracker,
            job_config: JobConfig::default(),
            drag_active: false,
        }
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub fn phase(&self) -> Phase {
        self.tracker.phase()
    }

    pub fn job_config(&self) -> JobConfig {
        self.job_config
    }

    fn ensure_accepting_input(&self) -> Result<(), IntakeError> {
        let phase = self.phase();
        if phase.accepts_input() {
            Ok(())
        } else {
            Err(IntakeError::Busy { phase })
        }
    }

    /// Stage `candidate`, replacing any previous one.
    ///
    /// Refused with [`IntakeError::Busy`] outside `idle`/`staged`, and with
    /// [`IntakeError::InvalidMediaType`] for anything but a PDF.
    pub fn select_file(&mut self, candidate: CandidateFile) -> Result<(), IntakeError> {
        self.ensure_accepting_input()?;
        if !candidate.is_pdf() {
            debug!("Rejected {} ({})", candidate.name(), candidate.media_type());
            return Err(IntakeError::InvalidMediaType {
                name: candidate.name().to_string(),
                media_type: candidate.media_type().to_string(),
            });
        }
        info!("Staged {} ({})", candidate.name(), candidate.size_label());
        self.tracker.select(candidate);
        Ok(())
    }

    pub fn set_standard(&mut self, standard: Standard) -> Result<(), IntakeError> {
        self.ensure_accepting_input()?;
        self.job_config.standard = standard;
        Ok(())
    }

    pub fn set_force_update(&mut self, force: bool) -> Result<(), IntakeError> {
        self.ensure_accepting_input()?;
        self.job_config.force_update = force;
        Ok(())
    }

    /// Discard the staged candidate and the force flag.
    pub fn clear(&mut self) -> Result<(), IntakeError> {
        self.ensure_accepting_input()?;
        self.tracker.clear();
        self.job_config.force_update = false;
        Ok(())
    }

    /// Freeze the staged candidate and configuration into a submission.
    pub fn begin_submission(&mut self) -> Result<(), IntakeError> {
        match self.phase() {
            Phase::Staged => {}
            Phase::Idle => return Err(IntakeError::NothingStaged),
            phase => return Err(IntakeError::Busy { phase }),
        }
        self.drag_active = false;
        self.tracker.submit(self.job_config);
        Ok(())
    }

    /// Back to the initial state from anywhere. The standard is kept.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.job_config.force_update = false;
        self.drag_active = false;
    }

    /// Track hover over the drop zone. Returns the new highlight state.
    ///
    /// Ignored unless a file may be selected.
    pub fn drag(&mut self, event: DragEvent) -> bool {
        if self.phase().accepts_input() {
            self.drag_active = matches!(event, DragEvent::Enter | DragEvent::Over);
        }
        self.drag_active
    }

    /// A file was dropped: same rules as [`Intake::select_file`].
    pub fn drop_file(&mut self, candidate: CandidateFile) -> Result<(), IntakeError> {
        self.drag_active = false;
        self.select_file(candidate)
    }

    /// Wait for the next tracker update. See [`JobTracker::next_update`].
    pub async fn next_update(&mut self) -> Option<Phase> {
        self.tracker.next_update().await
    }

    /// Wait until the job is finished. See [`JobTracker::run_to_completion`].
    pub async fn run_to_completion(&mut self) -> Phase {
        self.tracker.run_to_completion().await
    }

    /// Upload the rules workbook for the currently selected standard.
    ///
    /// Independent of the tracked job.
    pub async fn upload_standard_rules(&self, workbook: &CandidateFile) -> Result<String, IntakeError> {
        standards::upload_standard_rules(
            self.tracker.transport().as_ref(),
            self.tracker.config(),
            self.job_config.standard,
            workbook,
        )
        .await
    }

    pub fn snapshot(&self) -> IntakeSnapshot {
        let state = self.tracker.state();
        let candidate = state.candidate();
        IntakeSnapshot {
            phase: state.phase(),
            message: state.message(),
            file_name: candidate.map(|c| c.name().to_string()),
            file_size: candidate.map(|c| c.size()),
            job_id: state.job().map(|j| j.to_string()),
            standard: self.job_config.standard,
            force_update: self.job_config.force_update,
            drag_active: self.drag_active,
        }
    }
}
