//! The set of live sessions and fan-out delivery to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use natter_proto::{Packet, UserId};

use crate::session::{Session, SessionId};

/// Live sessions keyed by id.
///
/// Structural changes take the write lock; lookups and broadcasts take the
/// read lock only long enough to snapshot their recipients. Each delivery
/// then runs on its own task, so one stalled socket never holds up the
/// caller or the other recipients.
pub struct Registry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    next_id: AtomicU64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> SessionId {
        SessionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Add a session. Returns the number of live sessions afterwards.
    pub async fn add(&self, session: Arc<Session>) -> usize {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id(), session);
        sessions.len()
    }

    pub async fn remove(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(&id)
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().await.values().cloned().collect()
    }

    /// Live sessions authenticated as `user`.
    pub async fn sessions_for_user(&self, user: UserId) -> Vec<Arc<Session>> {
        let mut matching = Vec::new();
        for session in self.snapshot().await {
            if session.user_id().await == Some(user) {
                matching.push(session);
            }
        }
        matching
    }

    /// True when two or more live sessions share `user`.
    pub async fn is_multi_logged(&self, user: UserId) -> bool {
        self.sessions_for_user(user).await.len() >= 2
    }

    /// Deliver to every live session except `excluded`. Returns the number of
    /// deliveries started.
    pub async fn broadcast_except(&self, packet: &Packet, excluded: SessionId) -> usize {
        let recipients: Vec<_> = self
            .snapshot()
            .await
            .into_iter()
            .filter(|s| s.id() != excluded)
            .collect();

        for session in &recipients {
            session.spawn_send(packet.clone());
        }
        recipients.len()
    }

    /// Deliver to every live session of `user`. Returns the number of
    /// deliveries started; zero means the user is offline and the packet was
    /// dropped.
    pub async fn broadcast_to_user(&self, user: UserId, packet: &Packet) -> usize {
        let recipients = self.sessions_for_user(user).await;
        if recipients.is_empty() {
            debug!(%user, packet_id = packet.id, "No live session for user, dropping packet");
        }
        for session in &recipients {
            session.spawn_send(packet.clone());
        }
        recipients.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
