use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// A direct message between two users. Exactly one of `body` (non-empty
/// after trimming) or the attachment reference must be present; a message
/// with an attachment may additionally carry a caption in `body`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    /// Message text. Stored as an empty string for attachment-only messages.
    pub body: String,
    /// Opaque URL of an attachment held by the external attachment store.
    pub attachment_url: Option<String>,
    /// Opaque id the attachment store uses for deletion.
    pub attachment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// True when `user_id` is the sender or the receiver.
    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }

    pub fn has_attachment(&self) -> bool {
        self.attachment_url.is_some()
    }
}
