#![allow(clippy::needless_for_each)] // Derive macro emits a for_each internally

use shared::models::{ChatMessage, ErrorResponse, SendMessageRequest, StreamEvent, Timestamp};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "TaskBridge Chat API",
        version = "1.0.0",
        description = "Real-time chat delivery core of the TaskBridge marketplace"
    ),
    paths(
        crate::handlers::chat::send_message,
        crate::handlers::chat::get_history,
        crate::handlers::chat::delete_message,
        crate::handlers::chat::delete_conversation,
        crate::handlers::streaming::sse_handler,
    ),
    components(
        schemas(
            ChatMessage,
            SendMessageRequest,
            StreamEvent,
            Timestamp,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Chat", description = "Messaging and live delivery endpoints")
    )
)]
pub struct ApiDoc;
