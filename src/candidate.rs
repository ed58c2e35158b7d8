//! Candidate files: a user-selected document awaiting submission.
//!
//! A candidate can come from a file picker (local path), a drop event (the
//! caller already holds the bytes), or a URL. Whatever the source, the
//! declared media type is derived the way a browser fills `File.type`: from
//! the `Content-Type` header for downloads, otherwise from the file name
//! extension. The intake controller only ever looks at that declared type.

use crate::error::IntakeError;
use bytes::Bytes;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// The only media type the analysis backend accepts.
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// A document selected by the user, held in memory until submission.
///
/// Cloning is cheap: the content is reference-counted.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct CandidateFile {
    name: String,
    media_type: String,
    #[serde(skip)]
    content: Bytes,
}

impl CandidateFile {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            content: content.into(),
        }
    }

    /// Build a candidate whose media type is guessed from `name`.
    pub fn from_bytes(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let name = name.into();
        let media_type = guess_media_type(&name);
        Self::new(name, media_type, content)
    }

    /// Display name, e.g. `report.pdf`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared media type, e.g. `application/pdf`.
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_pdf(&self) -> bool {
        self.media_type.eq_ignore_ascii_case(PDF_MEDIA_TYPE)
    }

    /// Size formatted in megabytes with two decimals, as the upload card shows it.
    pub fn size_label(&self) -> String {
        format!("{:.2} MB", self.size() as f64 / 1024.0 / 1024.0)
    }
}

impl fmt::Debug for CandidateFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateFile")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("size", &self.size())
            .finish()
    }
}

/// Media type for a file name, `application/octet-stream` when unknown.
pub fn guess_media_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Turn a path or URL into an in-memory candidate.
///
/// No media-type check happens here; that is the intake controller's job.
pub async fn resolve_candidate(input: &str, timeout_secs: u64) -> Result<CandidateFile, IntakeError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

/// Read a local file into a candidate.
pub async fn read_local(path: &Path) -> Result<CandidateFile, IntakeError> {
    let content = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(IntakeError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(IntakeError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => {
            return Err(IntakeError::Internal(format!(
                "Failed to read '{}': {e}",
                path.display()
            )))
        }
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!("Read local candidate: {} ({} bytes)", path.display(), content.len());
    Ok(CandidateFile::from_bytes(name, content))
}

/// Download a URL into a candidate.
async fn download_url(url: &str, timeout_secs: u64) -> Result<CandidateFile, IntakeError> {
    info!("Downloading candidate from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| IntakeError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        let reason = if e.is_timeout() {
            format!("timed out after {timeout_secs}s")
        } else {
            e.to_string()
        };
        IntakeError::DownloadFailed {
            url: url.to_string(),
            reason,
        }
    })?;

    if !response.status().is_success() {
        return Err(IntakeError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);
    let header_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty());

    let content = response
        .bytes()
        .await
        .map_err(|e| IntakeError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let media_type = header_type.unwrap_or_else(|| guess_media_type(&filename));
    info!("Downloaded {} ({} bytes, {})", filename, content.len(), media_type);

    Ok(CandidateFile::new(filename, media_type, content))
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

/// Path helper used by the CLI for display.
pub fn display_name(input: &str) -> String {
    if is_url(input) {
        extract_filename(input)
    } else {
        PathBuf::from(input)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| input.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn media_type_follows_extension() {
        assert_eq!(guess_media_type("report.pdf"), PDF_MEDIA_TYPE);
        assert_eq!(guess_media_type("REPORT.PDF"), PDF_MEDIA_TYPE);
        assert_eq!(guess_media_type("image.png"), "image/png");
        assert_eq!(guess_media_type("noext"), "application/octet-stream");
    }

    #[test]
    fn from_bytes_sets_size_and_type() {
        let c = CandidateFile::from_bytes("report.pdf", b"%PDF-1.7".to_vec());
        assert!(c.is_pdf());
        assert_eq!(c.size(), 8);
        assert_eq!(c.name(), "report.pdf");
    }

    #[test]
    fn size_label_in_megabytes() {
        let c = CandidateFile::from_bytes("big.pdf", vec![0u8; 3 * 1024 * 1024 / 2]);
        assert_eq!(c.size_label(), "1.50 MB");
    }

    #[test]
    fn extract_filename_falls_back() {
        assert_eq!(extract_filename("https://x.org/a/annual.pdf"), "annual.pdf");
        assert_eq!(extract_filename("https://x.org/a/"), "downloaded.pdf");
        assert_eq!(display_name("/tmp/dir/esg.pdf"), "esg.pdf");
    }

    #[tokio::test]
    async fn read_local_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"%PDF-1.4 body").unwrap();

        let c = read_local(&path).await.unwrap();
        assert_eq!(c.name(), "report.pdf");
        assert!(c.is_pdf());
        assert_eq!(c.content().as_ref(), b"%PDF-1.4 body");
    }

    #[tokio::test]
    async fn read_local_missing_file() {
        let err = read_local(Path::new("/definitely/not/here.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::FileNotFound { .. }));
    }
}
