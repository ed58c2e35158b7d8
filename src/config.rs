//! Configuration types for talking to the analysis backend.
//!
//! Two kinds of configuration live here:
//!
//! * [`ClientConfig`] — where the backend is and how often to poll it. Built
//!   once via [`ClientConfigBuilder`] and shared by every job.
//! * [`JobConfig`] — the per-job knobs the user picks before submitting
//!   (which [`Standard`] to analyse against, whether to force re-vectorising).
//!   Owned by the intake controller and frozen into a
//!   [`crate::machine::SubmissionRequest`] when a job starts.

use crate::error::IntakeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Connection and polling settings for the backend.
///
/// Built via [`ClientConfig::builder()`] or using [`ClientConfig::default()`].
///
/// # Example
/// ```rust
/// use disclosure_intake::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://analysis.internal:8000")
///     .poll_interval_ms(1000)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Backend origin, without a trailing slash. Default: `http://localhost:8000`.
    pub base_url: String,

    /// Path of the upload-and-start endpoint. Default: `/process-pdf`.
    pub submit_path: String,

    /// Path prefix of the status endpoint; the job id is appended as a
    /// further segment. Default: `/status`.
    pub status_path: String,

    /// Path of the standard-rules upload endpoint. Default: `/upload-standard`.
    pub standard_path: String,

    /// Delay between status polls in milliseconds. Default: 1500.
    ///
    /// The cadence is a tunable, not a correctness property: polls never
    /// overlap regardless of how slow the backend answers.
    pub poll_interval_ms: u64,

    /// Optional per-request timeout in seconds. Default: none.
    pub request_timeout_secs: Option<u64>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            submit_path: "/process-pdf".to_string(),
            status_path: "/status".to_string(),
            standard_path: "/upload-standard".to_string(),
            poll_interval_ms: 1500,
            request_timeout_secs: None,
            download_timeout_secs: 120,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Status path for one job, e.g. `/status/abc123`.
    pub fn status_path_for(&self, job_id: &str) -> String {
        format!("{}/{}", self.status_path.trim_end_matches('/'), job_id)
    }

    /// Join an endpoint path onto the base URL.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn submit_path(mut self, path: impl Into<String>) -> Self {
        self.config.submit_path = path.into();
        self
    }

    pub fn status_path(mut self, path: impl Into<String>) -> Self {
        self.config.status_path = path.into();
        self
    }

    pub fn standard_path(mut self, path: impl Into<String>) -> Self {
        self.config.standard_path = path.into();
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    pub fn request_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ClientConfig, IntakeError> {
        let c = &self.config;
        match reqwest::Url::parse(&c.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(IntakeError::InvalidConfig(format!(
                    "base URL must be http or https, got scheme '{}'",
                    url.scheme()
                )))
            }
            Err(e) => {
                return Err(IntakeError::InvalidConfig(format!(
                    "base URL '{}' does not parse: {e}",
                    c.base_url
                )))
            }
        }
        if c.poll_interval_ms == 0 {
            return Err(IntakeError::InvalidConfig(
                "Poll interval must be ≥ 1 ms".into(),
            ));
        }
        for (name, path) in [
            ("submit", &c.submit_path),
            ("status", &c.status_path),
            ("standard", &c.standard_path),
        ] {
            if !path.starts_with('/') {
                return Err(IntakeError::InvalidConfig(format!(
                    "{name} path must start with '/', got '{path}'"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Job configuration ────────────────────────────────────────────────────

/// Disclosure framework a report is analysed against.
///
/// The backend holds one rules workbook per standard; submitting against a
/// standard whose workbook was never uploaded fails with a 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Standard {
    /// Task Force on Climate-related Financial Disclosures. (default)
    #[default]
    #[serde(rename = "TCFD")]
    Tcfd,
    /// Taskforce on Nature-related Financial Disclosures.
    #[serde(rename = "TNFD")]
    Tnfd,
    /// IFRS S1 general sustainability disclosures.
    #[serde(rename = "S1")]
    S1,
    /// Sustainability Accounting Standards Board.
    #[serde(rename = "SASB")]
    Sasb,
}

impl Standard {
    /// Every standard, in menu order. The first is the default.
    pub const ALL: [Standard; 4] = [Standard::Tcfd, Standard::Tnfd, Standard::S1, Standard::Sasb];

    /// Wire name sent in the multipart `standard` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Standard::Tcfd => "TCFD",
            Standard::Tnfd => "TNFD",
            Standard::S1 => "S1",
            Standard::Sasb => "SASB",
        }
    }
}

impl fmt::Display for Standard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Standard {
    type Err = IntakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Standard::ALL
            .into_iter()
            .find(|std| std.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                IntakeError::InvalidConfig(format!(
                    "unknown standard '{s}', expected one of TCFD, TNFD, S1, SASB"
                ))
            })
    }
}

/// Per-job settings chosen before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobConfig {
    pub standard: Standard,
    /// Re-vectorise the report even if the backend already has it. Default: false.
    pub force_update: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_backend() {
        let c = ClientConfig::default();
        assert_eq!(c.url_for(&c.submit_path), "http://localhost:8000/process-pdf");
        assert_eq!(c.status_path_for("abc123"), "/status/abc123");
        assert_eq!(c.poll_interval(), Duration::from_millis(1500));
        assert!(c.request_timeout_secs.is_none());
    }

    #[test]
    fn builder_trims_trailing_slash() {
        let c = ClientConfig::builder()
            .base_url("https://example.com/")
            .build()
            .unwrap();
        assert_eq!(c.url_for("/status/x"), "https://example.com/status/x");
    }

    #[test]
    fn builder_rejects_zero_interval() {
        let err = ClientConfig::builder().poll_interval_ms(0).build().unwrap_err();
        assert!(matches!(err, IntakeError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_bad_url_and_scheme() {
        assert!(ClientConfig::builder().base_url("not a url").build().is_err());
        assert!(ClientConfig::builder()
            .base_url("ftp://example.com")
            .build()
            .is_err());
    }

    #[test]
    fn builder_rejects_relative_path() {
        let err = ClientConfig::builder()
            .status_path("status")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("status path"), "got: {err}");
    }

    #[test]
    fn standard_parse_is_case_insensitive() {
        assert_eq!("sasb".parse::<Standard>().unwrap(), Standard::Sasb);
        assert_eq!(" TNFD ".parse::<Standard>().unwrap(), Standard::Tnfd);
        assert!("GRI".parse::<Standard>().is_err());
    }

    #[test]
    fn job_config_default_is_first_standard_without_force() {
        let c = JobConfig::default();
        assert_eq!(c.standard, Standard::ALL[0]);
        assert!(!c.force_update);
    }

    #[test]
    fn standard_serialises_as_wire_name() {
        assert_eq!(serde_json::to_string(&Standard::S1).unwrap(), "\"S1\"");
    }
}
