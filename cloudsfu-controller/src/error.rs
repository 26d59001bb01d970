//! Controller client error types

use thiserror::Error;

/// Maximum response body accepted from the controller or an SFU (16 MB).
pub const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ControllerError {
    /// Non-2xx answer from the controller; carries the raw body as returned.
    #[error("HTTP {status} {status_text}: {}", display_body(.body))]
    RemoteRequestFailed {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response (HTTP 204) from {url}, expected a JSON body")]
    EmptyResponse { url: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Response too large ({size} bytes, max {MAX_RESPONSE_SIZE})")]
    ResponseTooLarge { size: u64 },
}

fn display_body(body: &str) -> &str {
    if body.is_empty() {
        "No error body"
    } else {
        body
    }
}

impl ControllerError {
    /// HTTP status of a rejected request, if the controller answered at all.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RemoteRequestFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::RemoteRequestFailed { status: 404, .. })
    }
}

/// Turn a non-2xx response into [`ControllerError::RemoteRequestFailed`],
/// consuming its body.
pub(crate) async fn check_response(
    resp: reqwest::Response,
) -> Result<reqwest::Response, ControllerError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ControllerError::RemoteRequestFailed {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        body,
    })
}

/// Read a response body with the size limit applied.
pub(crate) async fn bytes_with_limit(
    response: reqwest::Response,
) -> Result<bytes::Bytes, ControllerError> {
    if let Some(cl) = response.content_length() {
        if cl as usize > MAX_RESPONSE_SIZE {
            return Err(ControllerError::ResponseTooLarge { size: cl });
        }
    }
    let bytes = response.bytes().await?;
    if bytes.len() > MAX_RESPONSE_SIZE {
        return Err(ControllerError::ResponseTooLarge {
            size: bytes.len() as u64,
        });
    }
    Ok(bytes)
}

impl From<reqwest::Error> for ControllerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ControllerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<url::ParseError> for ControllerError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}
