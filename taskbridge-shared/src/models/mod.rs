pub mod errors;
pub mod message;
pub mod streaming;
pub mod timestamp;

pub use errors::ErrorResponse;
pub use message::{ChatMessage, SendMessageRequest};
pub use streaming::StreamEvent;
pub use timestamp::Timestamp;
