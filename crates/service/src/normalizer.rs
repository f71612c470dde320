//! Backend failure normalization.
//!
//! Every non-2xx response and every transport failure from any backend goes
//! through here exactly once. Mapping depends only on the status class, never
//! on which backend answered.

use models::HttpErrorInfo;

use crate::errors::ServiceError;

/// Map a non-2xx backend response onto the error taxonomy.
///
/// `subject` names the entity involved (e.g. `"Product Id: 7"`) and is only
/// used when the body is not an `{status, message, path}` envelope.
pub fn normalize(status: u16, body: &str, subject: &str) -> ServiceError {
    let envelope = HttpErrorInfo::parse(body).map(|info| info.message);
    match status {
        404 => ServiceError::NotFound(envelope.unwrap_or_else(|| format!("No {subject} found"))),
        422 => ServiceError::InvalidInput(
            envelope.unwrap_or_else(|| format!("Invalid input for {subject}")),
        ),
        409 => ServiceError::InvalidInput(
            envelope.unwrap_or_else(|| format!("Duplicate key, {subject}")),
        ),
        // a backend only answers 400 when it could not parse the request
        400 => ServiceError::type_mismatch(),
        _ => ServiceError::UnexpectedBackend {
            status,
            message: envelope
                .unwrap_or_else(|| format!("{subject}: backend responded with HTTP {status}")),
        },
    }
}

/// Map a transport-level failure (no usable HTTP response).
pub fn normalize_transport(err: &reqwest::Error, subject: &str) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Unavailable(format!("{subject}: backend timed out"))
    } else if err.is_connect() {
        ServiceError::Unavailable(format!("{subject}: backend unreachable"))
    } else {
        ServiceError::Unavailable(format!("{subject}: transport error: {err}"))
    }
}
