//! Network seam to the remote classification service.

use crate::config::{Config, ConfigError};
use async_trait::async_trait;
use likeness_core::{ClassificationResponse, Response, TransportFailure};
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("likeness/", env!("CARGO_PKG_VERSION"));

/// Sends one encoded image to the classification service.
#[async_trait]
pub trait ClassifierTransport: Send + Sync {
    /// Classify `image_data` (a `data:` URL).
    ///
    /// `Ok(None)` means the service answered with no body at all.
    async fn classify(&self, image_data: &str) -> Response;
}

/// Error body the service sends alongside a 4xx status.
#[derive(Deserialize)]
struct ServiceError {
    error: String,
}

/// `reqwest`-backed transport.
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    health_endpoint: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            health_endpoint: config.health_url()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check the service's health endpoint.
    pub async fn health(&self) -> Result<(), TransportFailure> {
        let response = self
            .http
            .get(&self.health_endpoint)
            .send()
            .await
            .map_err(send_failure)?;
        let status = response.status();
        if status.is_success() {
            tracing::debug!(url = %self.health_endpoint, "service healthy");
            Ok(())
        } else {
            Err(TransportFailure::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl ClassifierTransport for HttpTransport {
    async fn classify(&self, image_data: &str) -> Response {
        tracing::debug!(
            endpoint = %self.endpoint,
            payload_len = image_data.len(),
            "submitting image"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .form(&[("image_data", image_data)])
            .send()
            .await
            .map_err(send_failure)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportFailure::Decode(e.to_string()))?;

        tracing::debug!(status = status.as_u16(), body_len = body.len(), "service responded");

        if status.is_success() {
            return parse_body(&body);
        }

        // The service reports user-actionable problems as a 4xx with an
        // `{"error": ...}` body. Anything else is a transport-level failure.
        if status.is_client_error() {
            if let Ok(err) = serde_json::from_str::<ServiceError>(&body) {
                return Ok(Some(ClassificationResponse::Error { error: err.error }));
            }
        }
        Err(TransportFailure::Status(status.as_u16()))
    }
}

fn send_failure(e: reqwest::Error) -> TransportFailure {
    if e.is_timeout() {
        TransportFailure::Timeout
    } else {
        TransportFailure::Connect(e.to_string())
    }
}

/// Parse a 2xx body. An empty body or JSON `null` is an absent response.
fn parse_body(body: &str) -> Response {
    if body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str::<Option<ClassificationResponse>>(body)
        .map_err(|e| TransportFailure::Decode(e.to_string()))
}
