pub mod logger;
pub mod middleware;

pub use logger::RecordingLogger;
pub use middleware::RecordingMiddleware;
pub use revisor_core::recording::*;
