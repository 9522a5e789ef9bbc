use serde::{Deserialize, Serialize};

use crate::UserId;
use crate::models::Message;

/// Events pushed from the server to a connected gateway session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication of the connection.
    Ready { user_id: UserId },

    /// A newly persisted message addressed to (or sent by) this user.
    /// Delivery is a latency optimization only; REST history is the
    /// authoritative record.
    MessageDelivered { message: Message },

    /// An inbound submission on this connection failed validation.
    Error { message: String },
}

/// Commands sent from client to server over an authenticated connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Submit a text message. Attachments go through the REST endpoint.
    SendMessage { receiver_id: UserId, body: String },
}
