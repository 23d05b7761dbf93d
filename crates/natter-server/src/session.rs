//! One live client connection: its write half and its identity.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio_util::codec::FramedWrite;
use tracing::{debug, warn};

use natter_proto::{ContactProfile, Packet, PacketCodec, Presence, UserId};
use natter_store::UserAccount;

use crate::error::{Result, ServerError};

/// Registry-assigned connection id, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Identity and presence fields, denormalised from the account at login.
///
/// Only the owning connection's dispatch loop writes these.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub user_id: Option<UserId>,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub status: Presence,
    pub status_text: Option<String>,
    pub image_url: Option<String>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Public profile as shown to contacts. `None` before login.
    pub fn profile(&self) -> Option<ContactProfile> {
        Some(ContactProfile {
            user_id: self.user_id?,
            username: self.username.clone().unwrap_or_default(),
            display_name: self.display_name.clone(),
            status: self.status.as_i32(),
            image_url: self.image_url.clone(),
            status_text: self.status_text.clone(),
        })
    }
}

pub struct Session {
    id: SessionId,
    peer_addr: SocketAddr,
    writer: Mutex<FramedWrite<BoxedWriter, PacketCodec>>,
    write_timeout: Duration,
    state: RwLock<SessionState>,
    closed: AtomicBool,
    close_notify: Notify,
}

impl Session {
    pub fn new<W>(id: SessionId, peer_addr: SocketAddr, writer: W, write_timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: BoxedWriter = Box::new(writer);
        Self {
            id,
            peer_addr,
            writer: Mutex::new(FramedWrite::new(writer, PacketCodec::new())),
            write_timeout,
            state: RwLock::new(SessionState::default()),
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    // ------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------

    /// Write and flush one frame within the write timeout.
    ///
    /// A failed or timed-out write closes the session.
    pub async fn send(&self, packet: Packet) -> Result<()> {
        if self.is_closed() {
            return Err(ServerError::ConnectionClosed);
        }

        let mut writer = self.writer.lock().await;
        // A send queued behind a failed one must not wait out another timeout.
        if self.is_closed() {
            return Err(ServerError::ConnectionClosed);
        }
        match tokio::time::timeout(self.write_timeout, writer.send(packet)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.close();
                Err(e.into())
            }
            Err(_) => {
                self.close();
                Err(ServerError::WriteTimeout)
            }
        }
    }

    /// Fire-and-forget [`send`](Self::send) on its own task. Failures are logged.
    pub fn spawn_send(self: &Arc<Self>, packet: Packet) {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let packet_id = packet.id;
            if let Err(e) = session.send(packet).await {
                warn!(session = %session.id, packet_id, error = %e, "Failed to send packet");
            }
        });
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Mark the session closed and wake its read loop.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(session = %self.id, "Session closing");
            self.close_notify.notify_one();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        if self.is_closed() {
            return;
        }
        self.close_notify.notified().await;
    }

    /// Shut the write half down. Called once the read loop has exited.
    pub async fn shutdown(&self) {
        let mut writer = self.writer.lock().await;
        let _ = tokio::time::timeout(self.write_timeout, writer.close()).await;
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub async fn user_id(&self) -> Option<UserId> {
        self.state.read().await.user_id
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated()
    }

    pub async fn state(&self) -> SessionState {
        self.state.read().await.clone()
    }

    /// Move to the authenticated state with fields copied from `account`.
    pub async fn authenticate(&self, account: &UserAccount) {
        let mut state = self.state.write().await;
        state.user_id = Some(account.id);
        state.username = Some(account.username.clone());
        state.display_name = account.display_name.clone();
        state.status = Presence::Online;
        state.status_text = account.status_text.clone();
        state.image_url = account.image_url.clone();
    }

    pub async fn set_display_name(&self, name: String) {
        self.state.write().await.display_name = Some(name);
    }

    pub async fn set_status(&self, status: Presence) {
        self.state.write().await.status = status;
    }
}
