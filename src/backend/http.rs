//! Production [`HttpTransport`] over `reqwest`.

use super::{HttpResponse, HttpTransport, MultipartBody, PartValue, TransportError};
use crate::config::ClientConfig;
use crate::error::IntakeError;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Sends requests to the origin in [`ClientConfig::base_url`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    config: ClientConfig,
}

impl ReqwestTransport {
    pub fn new(config: ClientConfig) -> Result<Self, IntakeError> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| IntakeError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn send(&self, path: &str, request: reqwest::RequestBuilder) -> Result<HttpResponse, TransportError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    path: path.to_string(),
                }
            } else {
                TransportError::Request {
                    path: path.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|e| TransportError::Body {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        debug!("{} -> HTTP {} ({} bytes)", path, status, body.len());
        Ok(HttpResponse { status, body })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post_multipart<'a>(
        &'a self,
        path: &'a str,
        body: MultipartBody,
    ) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
        async move {
            let form = to_form(body).map_err(|reason| TransportError::InvalidRequest {
                path: path.to_string(),
                reason,
            })?;
            let request = self.client.post(self.config.url_for(path)).multipart(form);
            self.send(path, request).await
        }
        .boxed()
    }

    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<HttpResponse, TransportError>> {
        async move {
            let request = self.client.get(self.config.url_for(path));
            self.send(path, request).await
        }
        .boxed()
    }
}

/// Convert the library-neutral form into a `reqwest` one.
fn to_form(body: MultipartBody) -> Result<Form, String> {
    let mut form = Form::new();
    for part in body.parts {
        form = match part.value {
            PartValue::Text(value) => form.text(part.name, value),
            PartValue::File {
                filename,
                media_type,
                content,
            } => {
                let len = content.len() as u64;
                let file = Part::stream_with_length(content, len)
                    .file_name(filename)
                    .mime_str(&media_type)
                    .map_err(|e| format!("invalid media type '{media_type}': {e}"))?;
                form.part(part.name, file)
            }
        };
    }
    Ok(form)
}
