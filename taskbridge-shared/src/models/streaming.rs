use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::message::ChatMessage;

/// Events carried over a user's live push channel.
///
/// The SSE layer maps [`StreamEvent::event_name`] to the SSE `event:` field
/// and the serialized payload to `data:`, so clients can dispatch on either.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Acknowledgement emitted once after the channel is established.
    Connected {
        /// The username the channel is addressed to.
        username: String,
    },
    /// A chat message pushed to its recipient.
    Message {
        /// The persisted message, including its store-assigned identity.
        message: ChatMessage,
    },
    /// Heartbeat keeping intermediaries from idling the connection out.
    Ping,
}

impl StreamEvent {
    /// The SSE event name for this payload.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connection",
            Self::Message { .. } => "message",
            Self::Ping => "ping",
        }
    }
}
