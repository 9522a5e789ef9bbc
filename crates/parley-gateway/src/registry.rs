use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use parley_types::UserId;
use parley_types::events::GatewayEvent;

/// Write half of a session's event channel. The connection loop owns the
/// receiving half and relays events onto the socket.
pub type SessionSender = mpsc::UnboundedSender<GatewayEvent>;

/// In-memory map of live gateway sessions. One user may hold any number of
/// concurrent sessions (multiple tabs); each connection id maps to exactly
/// one user.
///
/// Constructed once at process start and handed to the gateway and the
/// fanout by cloning — a single `RwLock` keeps all three operations atomic
/// with respect to each other.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    /// conn_id -> owning user
    by_conn: HashMap<Uuid, UserId>,
    /// user_id -> live sessions, keyed by conn_id
    by_user: HashMap<UserId, HashMap<Uuid, SessionSender>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session. Calling twice with the same (conn_id, user_id) pair
    /// replaces the sender and is otherwise a no-op.
    pub async fn add(&self, conn_id: Uuid, user_id: UserId, tx: SessionSender) {
        let mut inner = self.inner.write().await;
        inner.by_conn.insert(conn_id, user_id);
        inner.by_user.entry(user_id).or_default().insert(conn_id, tx);
    }

    /// Drop a session. Safe to call for an unknown or already-removed
    /// conn_id — disconnect handlers may fire more than once.
    pub async fn remove(&self, conn_id: Uuid) {
        let mut inner = self.inner.write().await;
        if let Some(user_id) = inner.by_conn.remove(&conn_id) {
            if let Some(sessions) = inner.by_user.get_mut(&user_id) {
                sessions.remove(&conn_id);
                if sessions.is_empty() {
                    inner.by_user.remove(&user_id);
                }
            }
        }
    }

    /// Snapshot of the user's live sessions, possibly empty.
    pub async fn connections_for(&self, user_id: UserId) -> Vec<(Uuid, SessionSender)> {
        let inner = self.inner.read().await;
        inner
            .by_user
            .get(&user_id)
            .map(|sessions| {
                sessions
                    .iter()
                    .map(|(id, tx)| (*id, tx.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of live sessions.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.by_conn.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (SessionSender, mpsc::UnboundedReceiver<GatewayEvent>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn add_and_lookup() {
        let registry = ConnectionRegistry::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = session();

        registry.add(conn, 1, tx).await;

        let sessions = registry.connections_for(1).await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].0, conn);
        assert!(registry.connections_for(2).await.is_empty());
    }

    #[tokio::test]
    async fn user_may_hold_multiple_sessions() {
        let registry = ConnectionRegistry::new();
        let (tx_a, _rx_a) = session();
        let (tx_b, _rx_b) = session();

        registry.add(Uuid::new_v4(), 1, tx_a).await;
        registry.add(Uuid::new_v4(), 1, tx_b).await;

        assert_eq!(registry.connections_for(1).await.len(), 2);
        assert_eq!(registry.connection_count().await, 2);
    }

    #[tokio::test]
    async fn add_is_idempotent_for_same_pair() {
        let registry = ConnectionRegistry::new();
        let conn = Uuid::new_v4();
        let (tx_a, _rx_a) = session();
        let (tx_b, _rx_b) = session();

        registry.add(conn, 1, tx_a).await;
        registry.add(conn, 1, tx_b).await;

        assert_eq!(registry.connection_count().await, 1);
        assert_eq!(registry.connections_for(1).await.len(), 1);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let conn = Uuid::new_v4();
        let (tx, _rx) = session();

        registry.add(conn, 1, tx).await;
        registry.remove(conn).await;
        let after_first = registry.connection_count().await;

        // Duplicate disconnect fire must leave the registry untouched.
        registry.remove(conn).await;
        assert_eq!(registry.connection_count().await, after_first);
        assert_eq!(after_first, 0);
        assert!(registry.connections_for(1).await.is_empty());
    }

    #[tokio::test]
    async fn remove_unknown_conn_is_a_noop() {
        let registry = ConnectionRegistry::new();
        registry.remove(Uuid::new_v4()).await;
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn remove_only_drops_the_named_session() {
        let registry = ConnectionRegistry::new();
        let conn_a = Uuid::new_v4();
        let conn_b = Uuid::new_v4();
        let (tx_a, _rx_a) = session();
        let (tx_b, _rx_b) = session();

        registry.add(conn_a, 1, tx_a).await;
        registry.add(conn_b, 1, tx_b).await;
        registry.remove(conn_a).await;

        let sessions = registry.connections_for(1).await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].0, conn_b);
    }
}
