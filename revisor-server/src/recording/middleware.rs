use super::RecordingLogger;
use http::Extensions;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next, Result as MiddlewareResult};
use revisor_core::{
    classify_path, CorrelationId, Direction, EventType, RecordedEvent, Sanitizer,
    CORRELATION_ID_HEADER,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Bodies above this size are logged by length only.
const MAX_LOGGED_BODY: usize = 10_000;

/// Records every request passing through the platform client, with
/// credentials stripped, so that a run can be inspected afterwards.
pub struct RecordingMiddleware {
    logger: RecordingLogger,
}

impl RecordingMiddleware {
    pub fn new(logger: RecordingLogger) -> Self {
        Self { logger }
    }
}

#[async_trait::async_trait]
impl Middleware for RecordingMiddleware {
    async fn handle(
        &self,
        mut req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> MiddlewareResult<Response> {
        let correlation_id = correlation_id_for(&req, extensions);

        if !req.headers().contains_key(CORRELATION_ID_HEADER) {
            if let Ok(value) = correlation_id.parse::<http::HeaderValue>() {
                req.headers_mut().insert(CORRELATION_ID_HEADER, value);
            }
        }

        let event_type = classify_path(req.url().path());
        let operation = format!("{} {}", req.method(), req.url().path());
        self.emit(
            &correlation_id,
            event_type,
            Direction::Request,
            operation,
            request_data(&req),
        );

        let result = next.run(req, extensions).await;

        match &result {
            Ok(response) => self.emit(
                &correlation_id,
                event_type,
                Direction::Response,
                format!("response_{}", response.status().as_u16()),
                response_data(response),
            ),
            Err(err) => self.emit(
                &correlation_id,
                event_type,
                Direction::Response,
                "error".to_string(),
                serde_json::json!({
                    "error": err.to_string(),
                    "error_type": format!("{:?}", err),
                }),
            ),
        }

        result
    }
}

impl RecordingMiddleware {
    fn emit(
        &self,
        correlation_id: &str,
        event_type: EventType,
        direction: Direction,
        operation: String,
        data: serde_json::Value,
    ) {
        self.logger.record(RecordedEvent {
            timestamp: chrono::Utc::now().to_rfc3339(),
            correlation_id: correlation_id.to_string(),
            event_type,
            direction,
            operation,
            data,
            metadata: HashMap::new(),
        });
    }
}

/// Reuse an id supplied by the caller, otherwise start a new one.
fn correlation_id_for(req: &Request, extensions: &Extensions) -> String {
    if let Some(existing) = req
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        return existing.to_string();
    }

    extensions
        .get::<CorrelationId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn header_map(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    let mut collected: HashMap<String, String> = HashMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            collected
                .entry(name.to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
    }
    Sanitizer::sanitize_headers(&collected)
}

fn request_data(req: &Request) -> serde_json::Value {
    let body = match req.body().map(|body| body.as_bytes()) {
        None => serde_json::Value::Null,
        Some(None) => serde_json::Value::String("[STREAM_BODY]".to_string()),
        Some(Some(bytes)) if bytes.len() > MAX_LOGGED_BODY => {
            serde_json::Value::String(format!("[LARGE_BODY_{}b]", bytes.len()))
        }
        Some(Some(bytes)) => match std::str::from_utf8(bytes) {
            Ok(text) => Sanitizer::sanitize_body(text),
            Err(_) => serde_json::Value::String(format!("[BINARY_BODY_{}b]", bytes.len())),
        },
    };

    serde_json::json!({
        "method": req.method().as_str(),
        "url": req.url().as_str(),
        "headers": header_map(req.headers()),
        "body": body,
    })
}

fn response_data(response: &Response) -> serde_json::Value {
    serde_json::json!({
        "status_code": response.status().as_u16(),
        "headers": header_map(response.headers()),
        "body_size": response.content_length().unwrap_or(0),
    })
}
