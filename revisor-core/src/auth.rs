//! Detection of expired session credentials in API error bodies.

use serde_json::Value;

const UNAUTHORIZED: u16 = 401;
const EXPIRED_ERROR_NAME: &str = "ResponseError";
const EXPIRED_CAUSE_MESSAGE: &str = "JWT expired";

/// Returns true when a response means the session JWT has expired.
///
/// Only a 401 whose body has the shape
/// `{"error": {"name": "ResponseError", "cause": {"message": "JWT expired"}}}`
/// qualifies. Any other status or shape is treated as "not expired".
pub fn is_jwt_expired(status: u16, body: &Value) -> bool {
    if status != UNAUTHORIZED {
        return false;
    }

    let Some(error) = body.get("error") else {
        return false;
    };

    let name = error.get("name").and_then(Value::as_str);
    let cause_message = error
        .get("cause")
        .and_then(|cause| cause.get("message"))
        .and_then(Value::as_str);

    name == Some(EXPIRED_ERROR_NAME) && cause_message == Some(EXPIRED_CAUSE_MESSAGE)
}

/// Like [`is_jwt_expired`], for a body that has not been decoded yet.
/// Bodies that are not JSON are never expiry responses.
pub fn is_jwt_expired_body(status: u16, body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .map(|value| is_jwt_expired(status, &value))
        .unwrap_or(false)
}
