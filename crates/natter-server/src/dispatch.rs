//! Per-packet dispatch: the unauthenticated/authenticated state machine.
//!
//! [`route`] decides what a packet means for a session in a given state;
//! [`Dispatcher`] acts on that decision using the registry and the
//! directory.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use natter_proto::{ClientMessage, Packet, PacketId, Presence, ProtocolError, ServerMessage, UserId};
use natter_store::Directory;

use crate::error::{Result, ServerError};
use crate::registry::Registry;
use crate::session::Session;

/// Connection lifecycle callbacks driven by the TCP server.
pub trait PacketHandler: Send + Sync + 'static {
    /// The session is already registered and visible to broadcasts.
    fn on_connect(&self, session: &Arc<Session>) -> impl Future<Output = ()> + Send;

    /// Called sequentially, in arrival order, for each decoded packet.
    fn on_packet(&self, session: &Arc<Session>, packet: Packet) -> impl Future<Output = ()> + Send;

    /// The session has already been removed from the registry.
    fn on_disconnect(&self, session: &Arc<Session>) -> impl Future<Output = ()> + Send;
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum Route {
    /// Login attempt from an unauthenticated session.
    Login { username: String, password: String },
    /// Login packet whose body could not be parsed. Answered with a failure.
    LoginRejected(ProtocolError),
    /// A request from an authenticated session.
    Handle(ClientMessage),
    /// Anything but login before authentication.
    Unauthenticated(i32),
    /// Unknown, server-only or no-op packet ids.
    Ignored(i32),
    /// Known id with an unparseable payload.
    Malformed(i32, ProtocolError),
}

pub fn route(packet: &Packet, authenticated: bool) -> Route {
    let is_login = packet.kind() == Some(PacketId::Login);

    if !authenticated {
        if !is_login {
            return Route::Unauthenticated(packet.id);
        }
        return match ClientMessage::from_packet(packet) {
            Ok(Some(ClientMessage::Login { username, password })) => {
                Route::Login { username, password }
            }
            Ok(_) => Route::Ignored(packet.id),
            Err(e) => Route::LoginRejected(e),
        };
    }

    match ClientMessage::from_packet(packet) {
        // A second login on an authenticated session is not a request.
        Ok(Some(ClientMessage::Login { .. } | ClientMessage::Ping)) | Ok(None) => {
            Route::Ignored(packet.id)
        }
        Ok(Some(message)) => Route::Handle(message),
        Err(e) => Route::Malformed(packet.id, e),
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Dispatcher {
    pub(crate) registry: Arc<Registry>,
    pub(crate) directory: Arc<dyn Directory>,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, directory: Arc<dyn Directory>) -> Self {
        Self {
            registry,
            directory,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Run one blocking directory call off the async workers.
    ///
    /// A panic inside the call is reported as [`ServerError::TaskFailed`]
    /// and affects only the current request.
    pub(crate) async fn store<T, F>(&self, call: F) -> Result<T>
    where
        F: FnOnce(&dyn Directory) -> natter_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let directory = Arc::clone(&self.directory);
        match tokio::task::spawn_blocking(move || call(directory.as_ref())).await {
            Ok(result) => result.map_err(ServerError::from),
            Err(e) => {
                error!(error = %e, "Store task failed");
                Err(ServerError::TaskFailed(e.to_string()))
            }
        }
    }

    async fn dispatch(&self, session: &Arc<Session>, message: ClientMessage) {
        // The state only leaves `None` through login, so this always holds here.
        let Some(user_id) = session.user_id().await else {
            return;
        };

        match message {
            ClientMessage::Audio(data) => self.relay_audio(session, data).await,
            ClientMessage::Chat { to, message } => self.relay_chat(user_id, to, message).await,
            ClientMessage::Action { to, action } => self.relay_action(user_id, to, action).await,
            ClientMessage::Nudge { to } => self.relay_nudge(user_id, to).await,
            ClientMessage::Image { to, data } => self.relay_image(user_id, to, data).await,
            ClientMessage::SetDisplayName(Some(name)) => {
                debug!(session = %session.id(), %user_id, "Display name changed");
                session.set_display_name(name).await;
            }
            ClientMessage::SetDisplayName(None) => {
                debug!(session = %session.id(), %user_id, "Ignoring empty display name");
            }
            ClientMessage::SetStatus { status } => {
                self.handle_status_change(session, user_id, status).await
            }
            ClientMessage::AddContact { username, message } => {
                self.handle_add_contact(session, user_id, username, message)
                    .await
            }
            ClientMessage::ConfirmContact { requester } => {
                self.handle_confirm_contact(session, user_id, requester)
                    .await
            }
            ClientMessage::RejectContact { requester } => {
                self.handle_reject_contact(session, user_id, requester)
                    .await
            }
            ClientMessage::Login { .. } | ClientMessage::Ping => {}
        }
    }

    /// Tell every friend of `user` about a presence change. Runs detached.
    pub(crate) fn spawn_presence_fanout(&self, user: UserId, status: Presence) {
        let this = self.clone();
        tokio::spawn(async move {
            match this.store(move |dir| dir.friends(user)).await {
                Ok(friends) => this.notify_friends(user, status, &friends).await,
                Err(e) => {
                    warn!(%user, error = %e, "Failed to fetch friends for presence update")
                }
            }
        });
    }

    pub(crate) async fn notify_friends(
        &self,
        user: UserId,
        status: Presence,
        friends: &[natter_store::Friend],
    ) {
        let packet: Packet = ServerMessage::UserStatusChange {
            user_id: user,
            status: status.as_i32(),
        }
        .into();
        for friend in friends {
            self.registry
                .broadcast_to_user(friend.user_id, &packet)
                .await;
        }
    }
}

impl PacketHandler for Dispatcher {
    async fn on_connect(&self, session: &Arc<Session>) {
        let clients = self.registry.count().await;
        info!(
            session = %session.id(),
            addr = %session.peer_addr(),
            clients,
            "Client connected"
        );
    }

    async fn on_packet(&self, session: &Arc<Session>, packet: Packet) {
        let authenticated = session.is_authenticated().await;
        match route(&packet, authenticated) {
            Route::Login { username, password } => {
                self.handle_login(session, username, password).await
            }
            Route::LoginRejected(e) => {
                debug!(session = %session.id(), error = %e, "Unparseable login");
                session.spawn_send(ServerMessage::LoginResult(None).into());
            }
            Route::Handle(message) => self.dispatch(session, message).await,
            Route::Unauthenticated(id) => {
                debug!(session = %session.id(), packet_id = id, "Dropping packet before login");
            }
            Route::Ignored(id) => {
                debug!(session = %session.id(), packet_id = id, "Ignoring packet");
            }
            Route::Malformed(id, e) => {
                debug!(session = %session.id(), packet_id = id, error = %e, "Dropping malformed packet");
            }
        }
    }

    async fn on_disconnect(&self, session: &Arc<Session>) {
        let state = session.state().await;
        let remaining = self.registry.count().await;

        if let Some(user) = state.user_id {
            // Only the user's last session going away takes them offline.
            if self.registry.sessions_for_user(user).await.is_empty() {
                let this = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = this.store(move |dir| dir.logout_user(user)).await {
                        warn!(%user, error = %e, "Failed to log out user");
                    }
                });
                self.spawn_presence_fanout(user, Presence::Offline);
            }
        }

        info!(
            session = %session.id(),
            addr = %session.peer_addr(),
            username = state.username.as_deref().unwrap_or("-"),
            clients = remaining,
            "Client disconnected"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use natter_proto::UserId;

    fn login_packet(body: &[u8]) -> Packet {
        Packet::from_raw(PacketId::Login.as_i32(), Some(body.to_vec().into()))
    }

    #[test]
    fn test_only_login_before_auth() {
        let chat = ClientMessage::Chat {
            to: UserId(2),
            message: Some("hi".into()),
        }
        .to_packet();
        assert!(matches!(route(&chat, false), Route::Unauthenticated(2)));

        match route(&login_packet(b"alice\nsecret99"), false) {
            Route::Login { username, password } => {
                assert_eq!(username, "alice");
                assert_eq!(password, "secret99");
            }
            other => panic!("unexpected route {other:?}"),
        }
    }

    #[test]
    fn test_login_without_body_is_rejected() {
        let packet = Packet::empty(PacketId::Login);
        assert!(matches!(route(&packet, false), Route::LoginRejected(_)));
        assert!(matches!(
            route(&login_packet(&[0xff, 0xfe]), false),
            Route::LoginRejected(ProtocolError::InvalidUtf8)
        ));
    }

    #[test]
    fn test_authenticated_routing() {
        let nudge = ClientMessage::Nudge { to: UserId(4) }.to_packet();
        assert!(matches!(
            route(&nudge, true),
            Route::Handle(ClientMessage::Nudge { to: UserId(4) })
        ));

        assert!(matches!(route(&login_packet(b"a\nb"), true), Route::Ignored(0)));
        assert!(matches!(route(&Packet::empty(PacketId::Ping), true), Route::Ignored(5)));
        assert!(matches!(
            route(&Packet::from_raw(999, None), true),
            Route::Ignored(999)
        ));
        // Server-to-client ids are never requests.
        assert!(matches!(
            route(&Packet::empty(PacketId::ChatFrom), true),
            Route::Ignored(11)
        ));
    }

    #[test]
    fn test_truncated_payload_is_malformed() {
        let packet = Packet::from_raw(PacketId::Chat.as_i32(), Some(vec![1u8, 0].into()));
        assert!(matches!(route(&packet, true), Route::Malformed(2, _)));
    }
}
