use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::Backend;
use crate::errors::ServiceError;
use crate::normalizer::{normalize, normalize_transport};
use crate::observability::{BACKEND_ERRORS_TOTAL, BACKEND_REQUESTS_TOTAL};

/// Timeouts applied to every outbound backend call.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_secs(5), request_timeout: Duration::from_secs(10) }
    }
}

impl HttpClientConfig {
    /// Build the pooled client shared by all backing clients.
    pub fn build(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()
    }
}

pub(crate) fn trim_base(base_url: impl Into<String>) -> String {
    base_url.into().trim_end_matches('/').to_string()
}

/// Send a request and return the response if it is 2xx; otherwise the
/// normalized error.
pub(crate) async fn send(
    backend: Backend,
    request: RequestBuilder,
    subject: &str,
) -> Result<Response, ServiceError> {
    BACKEND_REQUESTS_TOTAL.with_label_values(&[backend.as_str()]).inc();
    let response = match request.send().await {
        Ok(r) => r,
        Err(e) => {
            warn!(%backend, error = %e, "backend call failed at transport level");
            return Err(record(backend, normalize_transport(&e, subject)));
        }
    };

    let status = response.status();
    if status.is_success() {
        debug!(%backend, status = status.as_u16(), "backend call succeeded");
        return Ok(response);
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(%backend, status = status.as_u16(), error = %e, "failed to read backend error body");
            return Err(record(backend, normalize_transport(&e, subject)));
        }
    };
    let err = normalize(status.as_u16(), &body, subject);
    if let ServiceError::UnexpectedBackend { .. } = err {
        warn!(%backend, status = status.as_u16(), "Got an unexpected HTTP error");
        warn!(%backend, body = %body, "Error body");
    } else {
        debug!(%backend, status = status.as_u16(), error = %err, "backend returned error");
    }
    Err(record(backend, err))
}

/// Read and decode a 2xx body. A body that cannot be read (timeout, reset)
/// is a transport failure; one that does not match the contract is unexpected.
pub(crate) async fn read_json<T: DeserializeOwned>(
    backend: Backend,
    response: Response,
    subject: &str,
) -> Result<T, ServiceError> {
    let status = response.status().as_u16();
    let bytes = response.bytes().await.map_err(|e| {
        warn!(%backend, error = %e, "backend response body could not be read");
        record(backend, normalize_transport(&e, subject))
    })?;
    serde_json::from_slice::<T>(&bytes).map_err(|e| {
        warn!(%backend, error = %e, "malformed backend response body");
        record(
            backend,
            ServiceError::UnexpectedBackend {
                status,
                message: format!("{subject}: malformed response body"),
            },
        )
    })
}

fn record(backend: Backend, err: ServiceError) -> ServiceError {
    BACKEND_ERRORS_TOTAL
        .with_label_values(&[backend.as_str(), err.kind().as_str()])
        .inc();
    err
}
