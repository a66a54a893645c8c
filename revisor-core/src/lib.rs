pub mod api;
pub mod auth;
pub mod recording;
pub mod session;
pub mod site;

pub use api::*;
pub use auth::{is_jwt_expired, is_jwt_expired_body};
pub use recording::{
    classify_path, CorrelationId, Direction, EventType, RecordedEvent, Sanitizer,
    CORRELATION_ID_HEADER,
};
pub use session::{
    merge_set_cookie_headers, parse_cookie_string, parse_set_cookie, to_cookie_string,
    CookieMap, SessionState,
};
pub use site::{generate_site_id, CreateSiteRequest, PromptFeatures, SITE_ID_LEN};

/// Default generation model used when the config does not name one.
pub const DEFAULT_MODEL: &str = "gemini-flash";
