//! Controller client configuration

use serde::{Deserialize, Serialize};

use crate::error::ControllerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Base URL of the SFU controller REST API, without trailing slash.
    pub base_url: String,
    /// Emit request/response pairs at debug level.
    pub enable_debug_logs: bool,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            enable_debug_logs: false,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl ControllerConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_debug_logs(mut self, enabled: bool) -> Self {
        self.enable_debug_logs = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        let url = url::Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ControllerError::InvalidConfig(format!(
                "controller base_url must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ControllerError::InvalidConfig(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Base URL with any trailing slashes removed, ready for path joining.
    #[must_use]
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
