use tracing::debug;

use parley_types::events::GatewayEvent;
use parley_types::models::Message;

use crate::registry::ConnectionRegistry;

/// Pushes newly persisted messages to live sessions.
///
/// Delivery policy: every session of the receiver AND every session of the
/// sender gets the push, including the session that submitted it — the echo
/// doubles as a delivery acknowledgment and keeps the sender's other tabs in
/// sync. A participant with no live sessions is simply skipped; REST history
/// is the durable channel and the push is a latency optimization only.
#[derive(Clone)]
pub struct DeliveryFanout {
    registry: ConnectionRegistry,
}

impl DeliveryFanout {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Deliver `message` to all participant sessions. Each send is isolated:
    /// a session whose channel has closed is logged and skipped without
    /// affecting the others. No retry, no queuing.
    pub async fn push(&self, message: &Message) {
        let mut targets = self.registry.connections_for(message.receiver_id).await;
        if message.sender_id != message.receiver_id {
            targets.extend(self.registry.connections_for(message.sender_id).await);
        }

        for (conn_id, tx) in targets {
            let event = GatewayEvent::MessageDelivered {
                message: message.clone(),
            };
            if tx.send(event).is_err() {
                debug!(%conn_id, message_id = %message.id, "push skipped: session channel closed");
            }
        }
    }
}
