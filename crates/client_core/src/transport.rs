//! HTTP transport abstraction between the session controller and the
//! analysis service.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde_json::Value;
use shared::protocol::UPLOAD_FIELD_NAME;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// A document about to be sent as the single part of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

/// Decoded response body. Bodies that are not JSON are kept as `Malformed`
/// so the caller can still report the status code.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Malformed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub payload: Payload,
}

impl TransportResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            payload: Payload::Json(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint '{path}': {reason}")]
    InvalidEndpoint { path: String, reason: String },
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Network(String),
}

impl TransportError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    async fn post_multipart(
        &self,
        path: &str,
        part: FilePart,
    ) -> Result<TransportResponse, TransportError>;
    async fn post_json(&self, path: &str, body: Value)
        -> Result<TransportResponse, TransportError>;
    async fn get_json(&self, path: &str) -> Result<TransportResponse, TransportError>;
}

/// `reqwest` backed transport bound to one service base URL.
pub struct HttpTransport {
    http: Client,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url: with_trailing_slash(base_url),
        }
    }

    pub fn with_timeout(
        base_url: Url,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(TransportError::from_reqwest)?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(base_url),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::InvalidEndpoint {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

async fn read_response(
    path: &str,
    started: Instant,
    response: reqwest::Response,
) -> Result<TransportResponse, TransportError> {
    let status = response.status().as_u16();
    let bytes = response
        .bytes()
        .await
        .map_err(TransportError::from_reqwest)?;
    let payload = match serde_json::from_slice::<Value>(&bytes) {
        Ok(body) => Payload::Json(body),
        Err(e) => {
            warn!(path, status, error = %e, "transport: response body is not json");
            Payload::Malformed {
                reason: e.to_string(),
            }
        }
    };
    info!(
        path,
        status,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "transport: request completed"
    );
    Ok(TransportResponse { status, payload })
}

#[async_trait]
impl AnalysisTransport for HttpTransport {
    async fn post_multipart(
        &self,
        path: &str,
        part: FilePart,
    ) -> Result<TransportResponse, TransportError> {
        let url = self.endpoint(path)?;
        let mime_type = part.mime_type();
        let size_bytes = part.bytes.len();
        let file_part = multipart::Part::bytes(part.bytes)
            .file_name(part.file_name.clone())
            .mime_str(&mime_type)
            .map_err(TransportError::from_reqwest)?;
        let form = multipart::Form::new().part(UPLOAD_FIELD_NAME, file_part);
        info!(
            path,
            file_name = %part.file_name,
            mime_type = %mime_type,
            size_bytes,
            "transport: posting multipart upload"
        );

        let started = Instant::now();
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;
        read_response(path, started, response).await
    }

    async fn post_json(
        &self,
        path: &str,
        body: Value,
    ) -> Result<TransportResponse, TransportError> {
        let url = self.endpoint(path)?;
        let started = Instant::now();
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;
        read_response(path, started, response).await
    }

    async fn get_json(&self, path: &str) -> Result<TransportResponse, TransportError> {
        let url = self.endpoint(path)?;
        let started = Instant::now();
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;
        read_response(path, started, response).await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
