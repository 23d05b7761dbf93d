use std::sync::Arc;

use tracing::{debug, warn};

use natter_proto::{Presence, UserId};

use crate::dispatch::Dispatcher;
use crate::session::Session;

impl Dispatcher {
    /// Persist a presence change, then tell the user's friends.
    ///
    /// Values outside `[0, 3]` are ignored. Nothing is sent back to the
    /// requesting session.
    pub(crate) async fn handle_status_change(
        &self,
        session: &Arc<Session>,
        user: UserId,
        status: i32,
    ) {
        let Some(presence) = Presence::from_i32(status) else {
            debug!(session = %session.id(), %user, status, "Ignoring out-of-range status");
            return;
        };

        match self.store(move |dir| dir.set_status(user, presence)).await {
            Ok(()) => {
                session.set_status(presence).await;
                self.spawn_presence_fanout(user, presence);
            }
            Err(e) => warn!(session = %session.id(), %user, error = %e, "Failed to set status"),
        }
    }
}
