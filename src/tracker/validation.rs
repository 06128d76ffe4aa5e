use serde::Deserialize;
use thiserror::Error;

use crate::ledger::JobParams;

/// Incoming job request as posted by clients
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub caption: bool,
    #[serde(default)]
    pub cookie: String,
    #[serde(default, rename = "refer")]
    pub referrer: String,
    #[serde(default, rename = "stream-format")]
    pub stream_format: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("url is required")]
    MissingUrl,
    #[error("{0} must not contain CR, LF or NUL")]
    IllegalHeaderValue(&'static str),
}

/// Check a request and turn it into job parameters
pub fn validate_request(request: JobRequest) -> Result<JobParams, ValidationError> {
    let url = request.url.trim();
    if url.is_empty() {
        return Err(ValidationError::MissingUrl);
    }

    // Both end up as HTTP header values
    if has_header_breaks(&request.cookie) {
        return Err(ValidationError::IllegalHeaderValue("cookie"));
    }
    if has_header_breaks(&request.referrer) {
        return Err(ValidationError::IllegalHeaderValue("refer"));
    }

    Ok(JobParams {
        url: url.to_string(),
        caption: request.caption,
        cookie: request.cookie,
        referrer: request.referrer,
        stream_format: request.stream_format.trim().to_string(),
    })
}

fn has_header_breaks(value: &str) -> bool {
    value.contains(['\r', '\n', '\0'])
}
