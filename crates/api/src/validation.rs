use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::ApiError;

pub fn validate<T: Validate>(value: &T) -> Result<(), ApiError> {
    value
        .validate()
        .map_err(|err| ApiError::Validation(err.to_string()))?;
    Ok(())
}

/// Decodes a JSON body, reporting malformed input as a validation error
/// rather than the extractor's plain-text rejection.
pub fn parse_json<T: DeserializeOwned + Validate>(body: &[u8]) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::Validation("request body is required".into()));
    }
    let value: T = serde_json::from_slice(body)
        .map_err(|err| ApiError::Validation(format!("invalid request body: {err}")))?;
    validate(&value)?;
    Ok(value)
}
