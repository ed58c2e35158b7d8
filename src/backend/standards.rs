//! Uploading the rules workbook for a standard.
//!
//! The backend keeps one Excel workbook per [`Standard`] and refuses to
//! analyse a report against a standard it has no workbook for. Uploading a
//! workbook is a one-shot call with no job and no polling; it does not touch
//! tracker state at all.

use super::protocol::{error_detail, success_message};
use super::{HttpTransport, MultipartBody};
use crate::candidate::CandidateFile;
use crate::config::{ClientConfig, Standard};
use crate::error::IntakeError;
use tracing::{info, warn};

/// Extensions the backend's rules loader understands.
pub const RULES_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

const UPLOAD_FAILED: &str = "Failed to upload standard";

/// True if `name` ends in `.xlsx` or `.xls` (any case).
pub fn is_rules_workbook(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| RULES_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Upload `workbook` as the rules for `standard`.
///
/// Returns the server's confirmation message.
pub async fn upload_standard_rules(
    transport: &dyn HttpTransport,
    config: &ClientConfig,
    standard: Standard,
    workbook: &CandidateFile,
) -> Result<String, IntakeError> {
    if !is_rules_workbook(workbook.name()) {
        return Err(IntakeError::InvalidRulesFile {
            name: workbook.name().to_string(),
        });
    }

    let body = MultipartBody::new()
        .text("standard_name", standard.as_str())
        .file(
            "file",
            workbook.name(),
            workbook.media_type(),
            workbook.content().clone(),
        );

    let response = transport
        .post_multipart(&config.standard_path, body)
        .await
        .map_err(|e| {
            warn!("Standard upload for {} failed: {}", standard, e);
            IntakeError::StandardUpload {
                message: UPLOAD_FAILED.to_string(),
            }
        })?;

    if !response.is_success() {
        let message = error_detail(&response).unwrap_or_else(|| UPLOAD_FAILED.to_string());
        warn!("Standard upload for {} rejected: HTTP {} {}", standard, response.status, message);
        return Err(IntakeError::StandardUpload { message });
    }

    info!("Uploaded rules for {} ({} bytes)", standard, workbook.size());
    Ok(success_message(&response)
        .unwrap_or_else(|| format!("Standard {standard} rules uploaded successfully!")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{HttpResponse, TransportError};
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use serde_json::json;
    use std::sync::Mutex;

    /// Answers every POST with one canned result and remembers the body.
    struct OneShot {
        reply: Result<HttpResponse, TransportError>,
        seen: Mutex<Vec<(String, MultipartBody)>>,
    }

    impl HttpTransport for OneShot {
        fn post_multipart<'a>(
            &'a self,
            path: &'a str,
            body: MultipartBody,
        ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
            self.seen.lock().unwrap().push((path.to_string(), body));
            let reply = self.reply.clone();
            async move { reply }.boxed()
        }

        fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
            panic!("unexpected GET {path}")
        }
    }

    fn workbook(name: &str) -> CandidateFile {
        CandidateFile::from_bytes(name, b"PK\x03\x04".to_vec())
    }

    #[test]
    fn workbook_extensions() {
        assert!(is_rules_workbook("SASB.xlsx"));
        assert!(is_rules_workbook("old.XLS"));
        assert!(!is_rules_workbook("rules.csv"));
        assert!(!is_rules_workbook("xlsx"));
    }

    #[tokio::test]
    async fn sends_standard_name_and_file() {
        let t = OneShot {
            reply: Ok(HttpResponse::json(
                200,
                &json!({"message": "Standard 'SASB' guidelines saved."}),
            )),
            seen: Mutex::new(Vec::new()),
        };
        let msg = upload_standard_rules(&t, &ClientConfig::default(), Standard::Sasb, &workbook("SASB.xlsx"))
            .await
            .unwrap();
        assert_eq!(msg, "Standard 'SASB' guidelines saved.");

        let seen = t.seen.lock().unwrap();
        let (path, body) = &seen[0];
        assert_eq!(path, "/upload-standard");
        assert_eq!(body.text_value("standard_name"), Some("SASB"));
        assert_eq!(body.parts.len(), 2);
    }

    #[tokio::test]
    async fn rejects_non_excel_before_network() {
        let t = OneShot {
            reply: Ok(HttpResponse::new(200, "{}")),
            seen: Mutex::new(Vec::new()),
        };
        let err = upload_standard_rules(&t, &ClientConfig::default(), Standard::Tcfd, &workbook("rules.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::InvalidRulesFile { .. }));
        assert!(t.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_2xx_surfaces_detail_or_generic() {
        let t = OneShot {
            reply: Ok(HttpResponse::json(413, &json!({"detail": "File too large"}))),
            seen: Mutex::new(Vec::new()),
        };
        let err = upload_standard_rules(&t, &ClientConfig::default(), Standard::S1, &workbook("S1.xlsx"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "File too large");

        let t = OneShot {
            reply: Err(TransportError::Request {
                path: "/upload-standard".into(),
                reason: "refused".into(),
            }),
            seen: Mutex::new(Vec::new()),
        };
        let err = upload_standard_rules(&t, &ClientConfig::default(), Standard::S1, &workbook("S1.xlsx"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), UPLOAD_FAILED);
    }
}
