use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{error, warn};
use uuid::Uuid;

use parley_db::Database;
use parley_db::models::MessageRow;
use parley_gateway::fanout::DeliveryFanout;
use parley_gateway::ingress::MessageIngress;
use parley_types::UserId;
use parley_types::api::SendMessageRequest;
use parley_types::error::ChatError;
use parley_types::models::Message;

use crate::attachments::AttachmentStore;

/// Message ingress and history access, shared by the REST handlers and the
/// gateway event loop. Owns authorization: the store below it is a trusted
/// internal layer and enforces nothing.
#[derive(Clone)]
pub struct ChatService {
    db: Arc<Database>,
    fanout: DeliveryFanout,
    attachments: AttachmentStore,
}

impl ChatService {
    pub fn new(db: Arc<Database>, fanout: DeliveryFanout, attachments: AttachmentStore) -> Self {
        Self {
            db,
            fanout,
            attachments,
        }
    }

    /// Validate and persist a new message, then fan it out to live sessions.
    /// The sender id always comes from the verified principal at the
    /// boundary. Fanout is fire-and-forget: push failures never fail or roll
    /// back the submission.
    pub async fn submit(
        &self,
        sender_id: UserId,
        req: SendMessageRequest,
    ) -> Result<Message, ChatError> {
        let receiver_id = req.receiver_id.ok_or(ChatError::MissingReceiver)?;
        if !run_db(&self.db, move |db| db.user_exists(receiver_id)).await? {
            return Err(ChatError::MissingReceiver);
        }

        let body = req.body.as_deref().unwrap_or("").trim().to_string();
        if body.is_empty() && req.attachment_url.is_none() {
            return Err(ChatError::EmptyContent);
        }

        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            body,
            attachment_url: req.attachment_url,
            attachment_id: req.attachment_id,
            created_at: now,
            updated_at: now,
        };

        let row = row_from_message(&message);
        run_db(&self.db, move |db| db.insert_message(&row)).await?;

        self.fanout.push(&message).await;

        Ok(message)
    }

    /// Fetch a single message; the requester must be a participant.
    pub async fn get(&self, requester_id: UserId, id: Uuid) -> Result<Message, ChatError> {
        let message = self.fetch(id).await?;
        if !message.is_participant(requester_id) {
            return Err(ChatError::Forbidden);
        }
        Ok(message)
    }

    /// The requester's full history, newest first.
    pub async fn list(&self, requester_id: UserId) -> Result<Vec<Message>, ChatError> {
        let rows = run_db(&self.db, move |db| db.list_messages_for(requester_id)).await?;
        Ok(rows.into_iter().map(message_from_row).collect())
    }

    /// Substring search over the requester's history, newest first.
    pub async fn search(
        &self,
        requester_id: UserId,
        query: String,
    ) -> Result<Vec<Message>, ChatError> {
        let rows = run_db(&self.db, move |db| db.search_messages(requester_id, &query)).await?;
        Ok(rows.into_iter().map(message_from_row).collect())
    }

    /// Edit a message body. Only the sender may edit. A message with an
    /// attachment accepts an empty caption; a text-only message must keep
    /// non-empty content. Edits are not pushed in real time — the next
    /// history fetch shows them.
    pub async fn edit(
        &self,
        requester_id: UserId,
        id: Uuid,
        new_body: Option<String>,
    ) -> Result<Message, ChatError> {
        let message = self.fetch(id).await?;
        if message.sender_id != requester_id {
            return Err(ChatError::Forbidden);
        }

        let body = new_body.as_deref().unwrap_or("").trim().to_string();
        if body.is_empty() && !message.has_attachment() {
            return Err(ChatError::EmptyContent);
        }

        let updated_at = Utc::now();
        let ts = encode_ts(&updated_at);
        let row_id = message.id.to_string();
        let row_body = body.clone();
        run_db(&self.db, move |db| db.update_message_body(&row_id, &row_body, &ts)).await?;

        Ok(Message {
            body,
            updated_at,
            ..message
        })
    }

    /// Delete a message. Sender or receiver may delete. Any external
    /// attachment is cleaned up best-effort first: a cleanup failure is
    /// logged and never blocks the row deletion.
    pub async fn remove(&self, requester_id: UserId, id: Uuid) -> Result<(), ChatError> {
        let message = self.fetch(id).await?;
        if !message.is_participant(requester_id) {
            return Err(ChatError::Forbidden);
        }

        if let Some(attachment_id) = &message.attachment_id {
            if let Err(e) = self.attachments.delete(attachment_id).await {
                warn!(
                    message_id = %id,
                    attachment_id,
                    "attachment cleanup failed, continuing with delete: {:#}",
                    e
                );
            }
        }

        let row_id = id.to_string();
        run_db(&self.db, move |db| db.delete_message(&row_id)).await?;
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Message, ChatError> {
        let row_id = id.to_string();
        let row = run_db(&self.db, move |db| db.get_message(&row_id))
            .await?
            .ok_or(ChatError::NotFound)?;
        Ok(message_from_row(row))
    }
}

#[async_trait]
impl MessageIngress for ChatService {
    async fn submit(
        &self,
        sender_id: UserId,
        req: SendMessageRequest,
    ) -> Result<Message, ChatError> {
        ChatService::submit(self, sender_id, req).await
    }
}

/// Run a blocking store call off the async runtime. Store failures are
/// logged here and surface only as `Unavailable`. Every handler in this
/// crate goes through here; nothing touches rusqlite on an async thread.
pub(crate) async fn run_db<T, F>(db: &Arc<Database>, f: F) -> Result<T, ChatError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ChatError::Unavailable
        })?
        .map_err(|e| {
            error!("database error: {:#}", e);
            ChatError::Unavailable
        })
}

fn encode_ts(ts: &DateTime<Utc>) -> String {
    // Fixed-width RFC 3339 so lexicographic ORDER BY matches time order.
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_from_message(message: &Message) -> MessageRow {
    MessageRow {
        id: message.id.to_string(),
        sender_id: message.sender_id,
        receiver_id: message.receiver_id,
        body: message.body.clone(),
        attachment_url: message.attachment_url.clone(),
        attachment_id: message.attachment_id.clone(),
        created_at: encode_ts(&message.created_at),
        updated_at: encode_ts(&message.updated_at),
    }
}

fn message_from_row(row: MessageRow) -> Message {
    Message {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}': {}", row.id, e);
            Uuid::default()
        }),
        sender_id: row.sender_id,
        receiver_id: row.receiver_id,
        body: row.body,
        attachment_url: row.attachment_url,
        attachment_id: row.attachment_id,
        created_at: parse_ts(&row.created_at, &row.id),
        updated_at: parse_ts(&row.updated_at, &row.id),
    }
}

fn parse_ts(raw: &str, message_id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!(
            "Corrupt timestamp '{}' on message '{}': {}",
            raw, message_id, e
        );
        DateTime::default()
    })
}
