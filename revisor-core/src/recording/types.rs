use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One line of the HTTP recording log.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecordedEvent {
    pub timestamp: String,      // RFC 3339
    pub correlation_id: String, // groups a request with its response
    pub event_type: EventType,
    pub direction: Direction,
    pub operation: String,       // e.g. "GET /api/v1/projects/p1/revisions"
    pub data: serde_json::Value, // sanitized request/response data
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// A call to one of the `/api/` endpoints.
    ApiCall,
    /// The unauthenticated root request used to refresh cookies.
    SessionProbe,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

/// Decide which kind of call a request path represents.
pub fn classify_path(path: &str) -> EventType {
    if path.starts_with("/api/") {
        EventType::ApiCall
    } else {
        EventType::SessionProbe
    }
}

#[derive(Clone, Debug)]
pub struct CorrelationId(pub String);

pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_path() {
        assert_eq!(classify_path("/api/v1/sites"), EventType::ApiCall);
        assert_eq!(classify_path("/"), EventType::SessionProbe);
        assert_eq!(classify_path(""), EventType::SessionProbe);
    }

    #[test]
    fn test_event_serializes_as_single_line() {
        let event = RecordedEvent {
            timestamp: "2026-10-19T00:00:00Z".to_string(),
            correlation_id: "abc".to_string(),
            event_type: EventType::ApiCall,
            direction: Direction::Request,
            operation: "GET /api/v1/projects/p1".to_string(),
            data: serde_json::json!({"body": "line one\nline two"}),
            metadata: HashMap::new(),
        };
        let line = serde_json::to_string(&event).unwrap();
        assert!(!line.contains('\n'));

        let parsed: RecordedEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.event_type, EventType::ApiCall);
        assert_eq!(parsed.direction, Direction::Request);
    }
}
