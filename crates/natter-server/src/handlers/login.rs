use std::sync::Arc;

use tracing::{info, warn};

use natter_proto::{LoginSnapshot, Presence, ServerMessage};
use natter_store::{password::verify_password, UserAccount};

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::session::Session;

impl Dispatcher {
    /// Authenticate `session` and send the login snapshot.
    ///
    /// Every failure, whatever its cause, produces the same bare
    /// `LoginResult(None)`.
    pub(crate) async fn handle_login(
        &self,
        session: &Arc<Session>,
        username: String,
        password: String,
    ) {
        let account = match self.check_credentials(username.clone(), password).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                info!(session = %session.id(), %username, "Login denied");
                session.spawn_send(ServerMessage::LoginResult(None).into());
                return;
            }
            Err(e) => {
                warn!(session = %session.id(), %username, error = %e, "Login failed");
                session.spawn_send(ServerMessage::LoginResult(None).into());
                return;
            }
        };

        let user = account.id;
        if let Err(e) = self.store(move |dir| dir.login_user(user)).await {
            warn!(session = %session.id(), %user, error = %e, "Failed to mark user online");
            session.spawn_send(ServerMessage::LoginResult(None).into());
            return;
        }
        session.authenticate(&account).await;

        let friends = self
            .store(move |dir| dir.friends(user))
            .await
            .unwrap_or_else(|e| {
                warn!(%user, error = %e, "Failed to fetch friends at login");
                Vec::new()
            });
        let pending = self
            .store(move |dir| dir.pending_requests(user))
            .await
            .unwrap_or_else(|e| {
                warn!(%user, error = %e, "Failed to fetch pending requests at login");
                Vec::new()
            });

        info!(
            session = %session.id(),
            %user,
            username = %account.username,
            friends = friends.len(),
            pending = pending.len(),
            "Login succeeded"
        );

        self.notify_friends(user, Presence::Online, &friends).await;

        let snapshot = LoginSnapshot {
            user_id: user,
            display_name: account.display_name,
            status_text: account.status_text,
            friends,
            pending,
        };
        session.spawn_send(ServerMessage::LoginResult(Some(snapshot)).into());
    }

    /// Look the account up and verify the password, both on a blocking thread.
    async fn check_credentials(
        &self,
        username: String,
        password: String,
    ) -> Result<Option<UserAccount>> {
        self.store(move |dir| {
            Ok(dir
                .user_by_username(&username)?
                .filter(|account| verify_password(&password, &account.password_hash)))
        })
        .await
    }
}
