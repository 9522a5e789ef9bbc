use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use parley_types::UserId;
use parley_types::api::SendMessageRequest;
use parley_types::events::{GatewayCommand, GatewayEvent};
use parley_types::token::TokenVerifier;

use crate::ingress::MessageIngress;
use crate::registry::{ConnectionRegistry, SessionSender};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Everything the gateway needs, injected once at process start.
#[derive(Clone)]
pub struct GatewayState {
    pub verifier: Arc<TokenVerifier>,
    pub registry: ConnectionRegistry,
    pub ingress: Arc<dyn MessageIngress>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub token: Option<String>,
}

/// Admission check for new real-time connections. The candidate token comes
/// from the `token` query parameter or a Bearer header; it is verified
/// BEFORE the upgrade completes, so a failed attempt never reaches the
/// registry and the client sees a plain 401 instead of a half-open socket.
pub async fn ws_upgrade(
    State(state): State<GatewayState>,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let token = params
        .token
        .or_else(|| bearer_token(&headers))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = state
        .verifier
        .verify(&token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(ws.on_upgrade(move |socket| handle_connection(socket, state, claims.sub)))
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|s| s.to_string())
}

/// Run a pre-authenticated session: register it, relay pushed events out,
/// route inbound commands to the ingress, and clean up exactly once on any
/// exit path.
pub async fn handle_connection(socket: WebSocket, state: GatewayState, user_id: UserId) {
    let (mut sender, mut receiver) = socket.split();

    let conn_id = Uuid::new_v4();
    let (tx, mut session_rx) = mpsc::unbounded_channel();

    info!(user_id, %conn_id, "gateway session established");

    // Confirm authentication before any application traffic.
    let ready = GatewayEvent::Ready { user_id };
    let ready_text = match serde_json::to_string(&ready) {
        Ok(t) => t,
        Err(e) => {
            warn!(user_id, "failed to encode Ready event: {}", e);
            return;
        }
    };
    if sender.send(Message::Text(ready_text.into())).await.is_err() {
        return;
    }

    state.registry.add(conn_id, user_id, tx.clone()).await;

    // Shared flag for heartbeat
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward pushed events -> client, with heartbeat.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = session_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let text = match serde_json::to_string(&event) {
                        Ok(t) => t,
                        Err(e) => {
                            warn!(user_id, "failed to encode gateway event: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!(user_id, %conn_id, "heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client. Events on one connection are handled in
    // arrival order; nothing is ordered across connections.
    let ingress = state.ingress.clone();
    let session_tx = tx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let raw = text.as_str();
                    match serde_json::from_str::<GatewayCommand>(raw) {
                        Ok(cmd) => {
                            handle_command(ingress.as_ref(), &session_tx, user_id, cmd).await;
                        }
                        Err(e) => {
                            let preview: String = raw.chars().take(200).collect();
                            warn!(user_id, "bad command: {} -- raw: {}", e, preview);
                            let _ = session_tx.send(GatewayEvent::Error {
                                message: "unrecognized command".to_string(),
                            });
                        }
                    }
                }
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // Single cleanup point for every exit path; remove() itself tolerates a
    // duplicate fire.
    state.registry.remove(conn_id).await;
    info!(user_id, %conn_id, "gateway session closed");
}

async fn handle_command(
    ingress: &dyn MessageIngress,
    session_tx: &SessionSender,
    user_id: UserId,
    cmd: GatewayCommand,
) {
    match cmd {
        GatewayCommand::SendMessage { receiver_id, body } => {
            let req = SendMessageRequest {
                receiver_id: Some(receiver_id),
                body: Some(body),
                ..Default::default()
            };
            // Success needs no direct reply: the fanout echo delivers the
            // stored message back to this session.
            if let Err(err) = ingress.submit(user_id, req).await {
                let _ = session_tx.send(GatewayEvent::Error {
                    message: err.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use tower::ServiceExt;

    use parley_types::error::ChatError;
    use parley_types::models::Message as ChatMessage;
    use parley_types::token::Claims;

    const SECRET: &str = "test-secret";

    struct NoopIngress;

    #[async_trait]
    impl MessageIngress for NoopIngress {
        async fn submit(
            &self,
            _sender_id: UserId,
            _req: SendMessageRequest,
        ) -> Result<ChatMessage, ChatError> {
            Err(ChatError::Unavailable)
        }
    }

    fn gateway_app(secret: &str) -> (Router, ConnectionRegistry) {
        let registry = ConnectionRegistry::new();
        let state = GatewayState {
            verifier: Arc::new(TokenVerifier::new(secret)),
            registry: registry.clone(),
            ingress: Arc::new(NoopIngress),
        };
        let app = Router::new()
            .route("/gateway", get(ws_upgrade))
            .with_state(state);
        (app, registry)
    }

    fn mint_token(secret: &str, sub: UserId) -> String {
        let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp();
        let claims = Claims {
            sub,
            exp: exp as usize,
        };
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn ws_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::CONNECTION, "upgrade")
            .header(header::UPGRADE, "websocket")
            .header(header::SEC_WEBSOCKET_VERSION, "13")
            .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn missing_token_is_rejected_before_upgrade() {
        let (app, registry) = gateway_app(SECRET);

        let resp = app.oneshot(ws_request("/gateway")).await.unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn invalid_token_is_rejected_before_upgrade() {
        let (app, registry) = gateway_app(SECRET);

        let resp = app
            .clone()
            .oneshot(ws_request("/gateway?token=not-a-token"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let forged = mint_token("a different secret", 1);
        let resp = app
            .oneshot(ws_request(&format!("/gateway?token={forged}")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn valid_token_in_query_is_admitted() {
        let (app, _registry) = gateway_app(SECRET);

        let token = mint_token(SECRET, 1);
        let resp = app
            .oneshot(ws_request(&format!("/gateway?token={token}")))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SWITCHING_PROTOCOLS);
    }

    #[tokio::test]
    async fn valid_bearer_header_is_admitted() {
        let (app, _registry) = gateway_app(SECRET);

        let token = mint_token(SECRET, 1);
        let mut req = ws_request("/gateway");
        req.headers_mut().insert(
            header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );

        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SWITCHING_PROTOCOLS);
    }
}
