//! The add / confirm / reject contact workflow.
//!
//! Each step is one directory call. The checks and the write that follows
//! them are not atomic here; the store's unique indexes and the confirm
//! transaction catch a lost race, which then answers `Failed`.

use std::sync::Arc;

use tracing::{debug, warn};

use natter_proto::{AddContactResult, ContactProfile, PendingResult, ServerMessage, UserId};

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::session::Session;

impl Dispatcher {
    pub(crate) async fn handle_add_contact(
        &self,
        session: &Arc<Session>,
        user: UserId,
        username: Option<String>,
        message: Option<String>,
    ) {
        let result = match username {
            Some(username) => self
                .add_contact(session, user, username, message)
                .await
                .unwrap_or_else(|e| {
                    warn!(session = %session.id(), %user, error = %e, "Add contact failed");
                    AddContactResult::Failed
                }),
            None => AddContactResult::UserNotFound,
        };

        debug!(session = %session.id(), %user, ?result, "Add contact");
        session.spawn_send(ServerMessage::AddContactResponse(result).into());
    }

    async fn add_contact(
        &self,
        session: &Arc<Session>,
        user: UserId,
        username: String,
        message: Option<String>,
    ) -> Result<AddContactResult> {
        let Some(target) = self
            .store(move |dir| dir.user_by_username(&username))
            .await?
        else {
            return Ok(AddContactResult::UserNotFound);
        };
        let target = target.id;

        if target == user {
            return Ok(AddContactResult::UserNotFound);
        }
        if self.store(move |dir| dir.find_contact(user, target)).await? {
            return Ok(AddContactResult::UserAlreadyContact);
        }
        if self
            .store(move |dir| dir.find_pending_request(user, target))
            .await?
        {
            return Ok(AddContactResult::UserAlreadyPending);
        }

        let stored = message.clone();
        self.store(move |dir| dir.add_pending_request(user, target, stored.as_deref()))
            .await?;

        let state = session.state().await;
        let notify = ServerMessage::NotifyAddRequest {
            requester: user,
            username: state.username,
            display_name: state.display_name,
            message,
        };
        self.registry
            .broadcast_to_user(target, &notify.into())
            .await;

        Ok(AddContactResult::Success)
    }

    pub(crate) async fn handle_confirm_contact(
        &self,
        session: &Arc<Session>,
        user: UserId,
        requester: UserId,
    ) {
        let (result, profile) = match self.confirm_contact(session, user, requester).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(session = %session.id(), %user, %requester, error = %e, "Confirm contact failed");
                (PendingResult::Failed, None)
            }
        };

        debug!(session = %session.id(), %user, %requester, ?result, "Confirm contact");
        session.spawn_send(
            ServerMessage::ConfirmContactResponse {
                result,
                requester,
                profile,
            }
            .into(),
        );
    }

    async fn confirm_contact(
        &self,
        session: &Arc<Session>,
        user: UserId,
        requester: UserId,
    ) -> Result<(PendingResult, Option<ContactProfile>)> {
        if !self
            .store(move |dir| dir.find_pending_request(requester, user))
            .await?
        {
            return Ok((PendingResult::NotPending, None));
        }

        self.store(move |dir| dir.confirm_request(requester, user))
            .await?;

        let Some(profile) = self.store(move |dir| dir.user_by_id(requester)).await? else {
            warn!(%user, %requester, "Requester vanished after confirmation");
            return Ok((PendingResult::Failed, None));
        };

        if let Some(own) = session.state().await.profile() {
            self.registry
                .broadcast_to_user(requester, &ServerMessage::AddContactAccepted(own).into())
                .await;
        }

        Ok((PendingResult::Success, Some(profile)))
    }

    /// Silent rejection: the requester is never told.
    pub(crate) async fn handle_reject_contact(
        &self,
        session: &Arc<Session>,
        user: UserId,
        requester: UserId,
    ) {
        let result = match self.reject_contact(user, requester).await {
            Ok(result) => result,
            Err(e) => {
                warn!(session = %session.id(), %user, %requester, error = %e, "Reject contact failed");
                PendingResult::Failed
            }
        };

        debug!(session = %session.id(), %user, %requester, ?result, "Reject contact");
        session.spawn_send(ServerMessage::RejectContactResponse { result, requester }.into());
    }

    async fn reject_contact(&self, user: UserId, requester: UserId) -> Result<PendingResult> {
        if !self
            .store(move |dir| dir.find_pending_request(requester, user))
            .await?
        {
            return Ok(PendingResult::NotPending);
        }
        self.store(move |dir| dir.reject_request(requester, user))
            .await?;
        Ok(PendingResult::Success)
    }
}
