//! Wire format of the analysis backend.
//!
//! Builds the multipart bodies and turns raw [`HttpResponse`]s into the
//! outcomes the state machine understands. Every response maps to exactly
//! one outcome; anything unreadable is a transport problem, never a panic.

use super::{HttpResponse, MultipartBody, TransportError};
use crate::error::JobFailure;
use crate::machine::{JobHandle, PollOutcome, SubmissionOutcome, SubmissionRequest, COMPLETED_MESSAGE};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Status string for a finished job.
pub const STATUS_COMPLETED: &str = "completed";
/// Status string for a job the pipeline gave up on.
pub const STATUS_FAILED: &str = "failed";
/// Status string the backend answers for an id it does not know.
pub const STATUS_NOT_FOUND: &str = "not_found";

#[derive(Debug, Deserialize)]
struct SubmitAccepted {
    #[serde(alias = "job_id", alias = "jobId")]
    task_id: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
    message: Option<String>,
}

/// Multipart form for the upload-and-start call.
pub fn submission_body(request: &SubmissionRequest) -> MultipartBody {
    let file = request.file();
    let config = request.config();
    MultipartBody::new()
        .file("file", file.name(), file.media_type(), file.content().clone())
        .text("standard", config.standard.as_str())
        .text("force_update", config.force_update.to_string())
}

/// Classify the result of the upload-and-start call.
pub fn classify_submission(result: Result<HttpResponse, TransportError>) -> SubmissionOutcome {
    let response = match result {
        Ok(r) => r,
        Err(TransportError::InvalidRequest { path, reason }) => {
            warn!("Submission to {} never sent: {}", path, reason);
            return SubmissionOutcome::Rejected(JobFailure::submission(None));
        }
        Err(e) => return SubmissionOutcome::Rejected(JobFailure::connectivity(e.to_string())),
    };

    if !response.is_success() {
        return SubmissionOutcome::Rejected(JobFailure::submission(error_detail(&response)));
    }

    match serde_json::from_slice::<SubmitAccepted>(&response.body) {
        Ok(SubmitAccepted {
            task_id: Some(id),
            message,
        }) if !id.trim().is_empty() => SubmissionOutcome::Accepted {
            job: JobHandle::new(id),
            message,
        },
        Ok(_) => SubmissionOutcome::Rejected(JobFailure::connectivity(format!(
            "HTTP {} response carried no job id",
            response.status
        ))),
        Err(e) => SubmissionOutcome::Rejected(JobFailure::connectivity(format!(
            "unreadable submit response: {e}"
        ))),
    }
}

/// Classify the result of one status poll.
pub fn classify_poll(result: Result<HttpResponse, TransportError>) -> PollOutcome {
    let response = match result {
        Ok(r) => r,
        Err(e) => {
            return PollOutcome::Transport {
                detail: e.to_string(),
            }
        }
    };

    if !response.is_success() {
        return PollOutcome::Transport {
            detail: format!("status check failed with HTTP {}", response.status),
        };
    }

    let body: StatusBody = match serde_json::from_slice(&response.body) {
        Ok(b) => b,
        Err(e) => {
            return PollOutcome::Transport {
                detail: format!("unreadable status response: {e}"),
            }
        }
    };

    let message = body.message.unwrap_or_default();
    match body.status.as_str() {
        STATUS_COMPLETED => PollOutcome::Completed {
            message: if message.is_empty() {
                COMPLETED_MESSAGE.to_string()
            } else {
                message
            },
        },
        STATUS_FAILED => PollOutcome::Failed {
            message: if message.is_empty() {
                "unknown error".to_string()
            } else {
                message
            },
        },
        STATUS_NOT_FOUND => PollOutcome::Failed {
            message: "job not found on server".to_string(),
        },
        _ => PollOutcome::Running { message },
    }
}

/// The `detail` of an error body, if there is a usable one.
///
/// FastAPI-style backends send a string for `HTTPException` and a list of
/// objects for request validation errors; the latter is passed through as
/// compact JSON.
pub fn error_detail(response: &HttpResponse) -> Option<String> {
    let body: ErrorBody = serde_json::from_slice(&response.body).ok()?;
    match body.detail? {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// The `message` of a success body, if any.
pub fn success_message(response: &HttpResponse) -> Option<String> {
    #[derive(Deserialize)]
    struct MessageBody {
        message: Option<String>,
    }
    serde_json::from_slice::<MessageBody>(&response.body)
        .ok()
        .and_then(|b| b.message)
}
