use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Timestamp;

/// A single chat message between two marketplace users.
///
/// This is the one explicit schema shared by the message store, the live push
/// channel, and the REST history endpoint. A message is immutable once
/// persisted except for the two per-participant deletion flags; there is no
/// edit-in-place of content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Store-assigned identity, unique and monotonically increasing. Used as
    /// the ordering tiebreaker and as the deletion target.
    pub id: i64,

    /// Username of the sending user.
    pub sender_username: String,

    /// Username of the receiving user.
    pub recipient_username: String,

    /// The message body. Empty content is accepted by storage; clients are
    /// expected to prevent empty submissions.
    pub content: String,

    /// Creation instant, assigned by the sender's process.
    pub timestamp: Timestamp,

    /// Soft-delete flag for the sender's view.
    #[serde(default)]
    pub deleted_by_sender: bool,

    /// Soft-delete flag for the recipient's view.
    #[serde(default)]
    pub deleted_by_recipient: bool,
}

impl ChatMessage {
    /// Whether this message is still visible to `user`.
    ///
    /// Visibility is per participant role: the sender sees the message until
    /// `deleted_by_sender` is set, the recipient until `deleted_by_recipient`
    /// is set. Users that are neither participant never see it.
    #[must_use]
    pub fn visible_to(&self, user: &str) -> bool {
        if self.sender_username == user {
            !self.deleted_by_sender
        } else if self.recipient_username == user {
            !self.deleted_by_recipient
        } else {
            false
        }
    }

    /// The conversation partner relative to `user`: whichever participant is
    /// not the viewing user.
    #[must_use]
    pub fn partner_of(&self, user: &str) -> &str {
        if self.sender_username == user {
            &self.recipient_username
        } else {
            &self.sender_username
        }
    }
}

/// Request body for publishing a message. The sender identity comes from the
/// authenticated credential, never from the body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Username the message is addressed to.
    pub recipient_username: String,

    /// The message body.
    pub content: String,

    /// Creation instant as observed by the sending client.
    pub timestamp: Timestamp,
}
