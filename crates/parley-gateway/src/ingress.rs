use async_trait::async_trait;

use parley_types::api::SendMessageRequest;
use parley_types::error::ChatError;
use parley_types::models::Message;
use parley_types::UserId;

/// Seam between the gateway event loop and the message service. The gateway
/// supplies the verified `sender_id` from the session; the request body is
/// never trusted for identity.
#[async_trait]
pub trait MessageIngress: Send + Sync {
    async fn submit(
        &self,
        sender_id: UserId,
        req: SendMessageRequest,
    ) -> Result<Message, ChatError>;
}
