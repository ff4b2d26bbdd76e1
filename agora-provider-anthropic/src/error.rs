//! Mapping from HTTP/reqwest failures to [`ModelError`].

use agora_types::ModelError;

/// Map an HTTP status from the Anthropic API to a [`ModelError`].
///
/// `retry_after_secs` comes from the `retry-after` response header, which
/// the caller reads before consuming the body.
///
/// Reference: <https://docs.anthropic.com/en/api/errors>
pub(crate) fn map_http_status(
    status: reqwest::StatusCode,
    retry_after_secs: Option<u64>,
    body: &str,
) -> ModelError {
    let message = error_message(body);
    match status.as_u16() {
        401 | 403 => ModelError::Authentication(message),
        400 => ModelError::InvalidRequest(message),
        404 => ModelError::ModelNotFound(message),
        429 => ModelError::RateLimited { retry_after_secs },
        // 529 is Anthropic's overloaded status
        500..=599 => ModelError::ServiceUnavailable(message),
        _ => ModelError::InvalidRequest(format!("HTTP {status}: {message}")),
    }
}

/// Pull the human-readable message out of an Anthropic error body,
/// falling back to the raw body when it isn't the documented
/// `{"type":"error","error":{"message":...}}` shape.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Map a [`reqwest::Error`] to a [`ModelError`].
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ModelError {
    if err.is_timeout() {
        ModelError::Timeout
    } else {
        ModelError::Network(err.to_string())
    }
}
