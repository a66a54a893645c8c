pub mod sanitizer;
pub mod types;

pub use sanitizer::Sanitizer;
pub use types::*;
