//! Request checks shared by the handlers

use crate::api::error::ApiError;

/// Accept `application/json` with optional parameters, nothing else
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type
        .parse()
        .map_err(|_| ApiError::InvalidPayload(format!("invalid Content-Type: {content_type}")))?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}",
            media_type.essence_str()
        )));
    }

    Ok(media_type)
}

/// The request token must equal the configured one exactly
pub fn check_token(given: &str, expected: &str) -> Result<(), ApiError> {
    if given == expected {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}
