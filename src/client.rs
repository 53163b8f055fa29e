use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Mode, RequestParameters};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

// Failure reported by the vendor call, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorError {
    // None when the request never got an HTTP response
    pub status: Option<u16>,
    pub message: String,
}

impl VendorError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    /// Uses the vendor's `{"error": {"message": ...}}` body when present.
    pub fn from_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| body.trim().to_string());
        Self::new(Some(status), message)
    }
}

impl fmt::Display for VendorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for VendorError {}

/// The seam between the dispatcher and the vendor's API.
pub trait TextGenerationClient {
    fn generate(&self, params: &RequestParameters) -> impl Future<Output = std::result::Result<Value, VendorError>> + Send;
}

// Credential and organization for one client, never shared process-wide
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    organization: Option<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, organization: Option<String>) -> Self {
        Self {
            api_key: api_key.into(),
            organization,
        }
    }

    /// Reads the key file; its whole trimmed contents is the key.
    pub async fn from_key_file(path: &Path, organization: Option<String>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            let message = if e.kind() == std::io::ErrorKind::NotFound {
                format!("{} does not exist", path.display())
            } else {
                format!("cannot read {}: {e}", path.display())
            };
            Error::configuration(message, path)
        })?;
        let api_key = raw.trim();
        if api_key.is_empty() {
            return Err(Error::configuration(format!("{} is empty", path.display()), path));
        }
        Ok(Self::new(api_key, organization))
    }

    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("organization", &self.organization)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl OpenAiClient {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, mode: Mode) -> Option<String> {
        let path = match mode {
            Mode::Chat => "chat/completions",
            Mode::Complete => "completions",
            Mode::Edit => return None,
        };
        Some(format!("{}/{}", self.base_url, path))
    }
}

impl TextGenerationClient for OpenAiClient {
    async fn generate(&self, params: &RequestParameters) -> std::result::Result<Value, VendorError> {
        let Some(url) = self.endpoint(params.mode()) else {
            return Err(VendorError::transport(format!("{} mode has no endpoint", params.mode())));
        };
        debug!("POST {}", url);

        let mut request = self
            .http
            .post(&url)
            .bearer_auth(&self.credentials.api_key)
            .json(&params.to_payload());
        if let Some(org) = self.credentials.organization() {
            request = request.header("OpenAI-Organization", org);
        }

        let res = request
            .send()
            .await
            .map_err(|e| VendorError::transport(format!("Request failed: {e}")))?;
        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| VendorError::new(Some(status.as_u16()), format!("Read error: {e}")))?;

        if !status.is_success() {
            return Err(VendorError::from_body(status.as_u16(), &body));
        }
        serde_json::from_str(&body)
            .map_err(|e| VendorError::new(Some(status.as_u16()), format!("Parse Error: {e}")))
    }
}
