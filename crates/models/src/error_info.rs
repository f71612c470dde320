use serde::{Deserialize, Serialize};

/// Error envelope returned by every failing call, composite or backend.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpErrorInfo {
    pub status: u16,
    pub message: String,
    #[serde(default)]
    pub path: String,
}

impl HttpErrorInfo {
    pub fn new(status: u16, message: impl Into<String>, path: impl Into<String>) -> Self {
        Self { status, message: message.into(), path: path.into() }
    }

    /// Parse a response body as an envelope. Bodies that are not JSON, or JSON
    /// without a `message`, are not envelopes.
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str::<Self>(body).ok()
    }
}
