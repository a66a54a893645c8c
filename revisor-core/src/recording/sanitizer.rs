use serde_json::Value;
use std::collections::HashMap;

/// Headers that carry session credentials and must never reach the log.
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// JSON keys whose values are redacted wherever they appear.
const SENSITIVE_KEYS: &[&str] = &["cookies", "token", "password", "secret"];

const REDACTED: &str = "[REDACTED]";

pub struct Sanitizer;

impl Sanitizer {
    pub fn is_sensitive_header(header_name: &str) -> bool {
        let lower = header_name.to_lowercase();
        SENSITIVE_HEADERS.contains(&lower.as_str())
    }

    pub fn sanitize_headers(headers: &HashMap<String, String>) -> HashMap<String, String> {
        headers
            .iter()
            .map(|(key, value)| {
                let value = if Self::is_sensitive_header(key) {
                    REDACTED.to_string()
                } else {
                    value.clone()
                };
                (key.clone(), value)
            })
            .collect()
    }

    pub fn sanitize_json(value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, val)| {
                        let val = if SENSITIVE_KEYS.contains(&key.as_str()) {
                            Value::String(REDACTED.to_string())
                        } else {
                            Self::sanitize_json(val)
                        };
                        (key.clone(), val)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(Self::sanitize_json).collect()),
            _ => value.clone(),
        }
    }

    /// Sanitize a textual body: JSON bodies are redacted key by key, anything
    /// else is kept as-is.
    pub fn sanitize_body(body: &str) -> Value {
        match serde_json::from_str::<Value>(body) {
            Ok(json) => Self::sanitize_json(&json),
            Err(_) => Value::String(body.to_string()),
        }
    }
}
