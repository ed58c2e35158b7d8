//! Error types for the disclosure-intake library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IntakeError`] — **Synchronous**: the caller asked for something the
//!   current state does not allow (wrong media type, mutation while a job is
//!   in flight, nothing staged) or a local resource could not be read.
//!   Returned as `Err(IntakeError)` at the call site; tracker state is left
//!   untouched.
//!
//! * [`JobFailure`] — **Stored**: the remote job could not be submitted, the
//!   pipeline reported a failure, or the connection was lost. It never
//!   propagates as an `Err`; it becomes the payload of the `error` tracker
//!   state so the UI layer can render it.

use std::path::PathBuf;
use thiserror::Error;

use crate::machine::Phase;

/// All errors returned synchronously by the intake controller and helpers.
#[derive(Debug, Error)]
pub enum IntakeError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// The candidate's declared media type is not `application/pdf`.
    #[error("Only PDF files are allowed: '{name}' is {media_type}")]
    InvalidMediaType { name: String, media_type: String },

    /// A file or configuration mutation was attempted while a job is active.
    #[error("A job is {phase}; reset before changing the file or configuration")]
    Busy { phase: Phase },

    /// `begin_submission` was called without a staged candidate.
    #[error("No PDF is staged for submission")]
    NothingStaged,

    /// The rules workbook for a standard is not an Excel file.
    #[error("Standard rules must be an Excel workbook (.xlsx or .xls): '{name}'")]
    InvalidRulesFile { name: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    // ── Backend errors ────────────────────────────────────────────────────
    /// The auxiliary standard-rules upload was rejected or could not be sent.
    #[error("{message}")]
    StandardUpload { message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Generic message when the upload endpoint gives no `detail`.
pub const SUBMISSION_FAILED: &str = "Upload failed";

/// Message shown for any transport-level failure or malformed response.
pub const CONNECTION_LOST: &str = "Lost connection to server.";

/// Why a tracked job ended in the `error` state.
///
/// Stored inside [`crate::machine::TrackerState::Error`]. The `Display`
/// output is exactly the message the UI shows.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobFailure {
    /// The upload call returned non-2xx or no job id. `message` is the
    /// server's `detail` verbatim when it sent one.
    #[error("{message}")]
    Submission { message: String },

    /// A status poll reported the pipeline failed.
    #[error("Processing Error: {message}")]
    Processing { message: String },

    /// The network call failed or the response could not be understood.
    /// `detail` is for logs only.
    #[error("Lost connection to server.")]
    Connectivity { detail: String },
}

impl JobFailure {
    pub fn submission(detail: Option<String>) -> Self {
        JobFailure::Submission {
            message: detail
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| SUBMISSION_FAILED.to_string()),
        }
    }

    pub fn connectivity(detail: impl Into<String>) -> Self {
        JobFailure::Connectivity {
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_detail_is_verbatim() {
        let e = JobFailure::submission(Some("Standard not found".into()));
        assert_eq!(e.to_string(), "Standard not found");
    }

    #[test]
    fn submission_without_detail_is_generic() {
        assert_eq!(JobFailure::submission(None).to_string(), SUBMISSION_FAILED);
        assert_eq!(
            JobFailure::submission(Some("   ".into())).to_string(),
            SUBMISSION_FAILED
        );
    }

    #[test]
    fn processing_display_is_prefixed() {
        let e = JobFailure::Processing {
            message: "excel sheet missing".into(),
        };
        assert_eq!(e.to_string(), "Processing Error: excel sheet missing");
    }

    #[test]
    fn connectivity_hides_detail() {
        let e = JobFailure::connectivity("connection refused (os error 111)");
        assert_eq!(e.to_string(), CONNECTION_LOST);
    }

    #[test]
    fn busy_display_names_phase() {
        let e = IntakeError::Busy {
            phase: Phase::Processing,
        };
        assert!(e.to_string().contains("processing"), "got: {e}");
    }

    #[test]
    fn invalid_media_type_display() {
        let e = IntakeError::InvalidMediaType {
            name: "image.png".into(),
            media_type: "image/png".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("image.png"));
        assert!(msg.contains("image/png"));
    }
}
