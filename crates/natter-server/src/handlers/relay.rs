//! Fire-and-forget forwarding between users. Nothing is acknowledged; a
//! recipient that is offline simply never sees the packet.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use natter_proto::{Packet, ServerMessage, UserId};

use crate::dispatch::Dispatcher;
use crate::session::Session;

impl Dispatcher {
    /// Audio goes to every other live session, authenticated or not.
    pub(crate) async fn relay_audio(&self, session: &Arc<Session>, data: Bytes) {
        let packet: Packet = ServerMessage::Audio(data).into();
        self.registry.broadcast_except(&packet, session.id()).await;
    }

    pub(crate) async fn relay_chat(&self, from: UserId, to: UserId, message: Option<String>) {
        if message.is_none() {
            debug!(%from, %to, "Dropping empty chat message");
            return;
        }
        self.forward(to, ServerMessage::ChatFrom { from, message })
            .await;
    }

    pub(crate) async fn relay_action(&self, from: UserId, to: UserId, action: Option<String>) {
        if action.is_none() {
            debug!(%from, %to, "Dropping empty action");
            return;
        }
        self.forward(to, ServerMessage::ActionFrom { from, action })
            .await;
    }

    pub(crate) async fn relay_nudge(&self, from: UserId, to: UserId) {
        self.forward(to, ServerMessage::NudgeFrom { from }).await;
    }

    pub(crate) async fn relay_image(&self, from: UserId, to: UserId, data: Option<Bytes>) {
        if data.is_none() {
            debug!(%from, %to, "Dropping empty image");
            return;
        }
        self.forward(to, ServerMessage::ImageFrom { from, data })
            .await;
    }

    async fn forward(&self, to: UserId, message: ServerMessage) {
        let packet: Packet = message.into();
        self.registry.broadcast_to_user(to, &packet).await;
    }
}
