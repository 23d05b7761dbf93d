//! The data-access surface the server consumes.
//!
//! Every method is blocking; async callers are expected to move calls onto a
//! blocking thread. Lookups that can legitimately miss return `Ok(None)` or
//! `Ok(false)`; writes that find no row to act on return
//! [`StoreError::NotFound`].

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use natter_proto::{ContactProfile, Presence, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Friend, NewAccount, PendingRequest, UserAccount};

pub trait Directory: Send + Sync {
    fn user_by_username(&self, username: &str) -> Result<Option<UserAccount>>;
    fn user_by_id(&self, id: UserId) -> Result<Option<ContactProfile>>;
    fn create_account(&self, account: &NewAccount) -> Result<UserId>;

    fn login_user(&self, id: UserId) -> Result<()>;
    fn logout_user(&self, id: UserId) -> Result<()>;
    fn set_status(&self, id: UserId, status: Presence) -> Result<()>;
    /// Returns the number of users that were not already offline.
    fn reset_user_statuses(&self) -> Result<usize>;

    fn friends(&self, id: UserId) -> Result<Vec<Friend>>;
    fn pending_requests(&self, target: UserId) -> Result<Vec<PendingRequest>>;
    fn find_contact(&self, user: UserId, other: UserId) -> Result<bool>;
    fn find_pending_request(&self, requester: UserId, target: UserId) -> Result<bool>;
    fn add_pending_request(
        &self,
        requester: UserId,
        target: UserId,
        message: Option<&str>,
    ) -> Result<()>;
    fn confirm_request(&self, requester: UserId, target: UserId) -> Result<()>;
    fn reject_request(&self, requester: UserId, target: UserId) -> Result<()>;
}

/// A [`Database`] behind a mutex, shareable across threads.
pub struct SharedDatabase {
    inner: Mutex<Database>,
}

impl SharedDatabase {
    pub fn new(db: Database) -> Self {
        Self {
            inner: Mutex::new(db),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl Directory for SharedDatabase {
    fn user_by_username(&self, username: &str) -> Result<Option<UserAccount>> {
        self.lock()?.get_user_by_username(username)
    }

    fn user_by_id(&self, id: UserId) -> Result<Option<ContactProfile>> {
        self.lock()?.get_user_by_id(id)
    }

    fn create_account(&self, account: &NewAccount) -> Result<UserId> {
        self.lock()?.create_account(account)
    }

    fn login_user(&self, id: UserId) -> Result<()> {
        self.lock()?.login_user(id)
    }

    fn logout_user(&self, id: UserId) -> Result<()> {
        self.lock()?.logout_user(id)
    }

    fn set_status(&self, id: UserId, status: Presence) -> Result<()> {
        self.lock()?.set_status(id, status)
    }

    fn reset_user_statuses(&self) -> Result<usize> {
        self.lock()?.reset_user_statuses()
    }

    fn friends(&self, id: UserId) -> Result<Vec<Friend>> {
        self.lock()?.get_friends(id)
    }

    fn pending_requests(&self, target: UserId) -> Result<Vec<PendingRequest>> {
        self.lock()?.get_pending_contacts(target)
    }

    fn find_contact(&self, user: UserId, other: UserId) -> Result<bool> {
        self.lock()?.find_contact(user, other)
    }

    fn find_pending_request(&self, requester: UserId, target: UserId) -> Result<bool> {
        self.lock()?.find_pending_contact(requester, target)
    }

    fn add_pending_request(
        &self,
        requester: UserId,
        target: UserId,
        message: Option<&str>,
    ) -> Result<()> {
        self.lock()?.add_pending_contact(requester, target, message)
    }

    fn confirm_request(&self, requester: UserId, target: UserId) -> Result<()> {
        self.lock()?.confirm_contact(requester, target)
    }

    fn reject_request(&self, requester: UserId, target: UserId) -> Result<()> {
        self.lock()?.reject_contact(requester, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_shared_across_threads() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(SharedDatabase::open(&dir.path().join("natter.db")).unwrap());

        let handles: Vec<_> = ["alice", "bobby", "carol"]
            .into_iter()
            .map(|name| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || {
                    db.create_account(&NewAccount {
                        username: name.to_string(),
                        password: "password1".to_string(),
                        email: format!("{name}@example.com"),
                        display_name: name.to_string(),
                    })
                    .unwrap()
                })
            })
            .collect();

        let ids: Vec<UserId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for id in ids {
            assert!(db.user_by_id(id).unwrap().is_some());
        }
    }

    #[test]
    fn test_trait_object_usable() {
        let db: Arc<dyn Directory> = Arc::new(SharedDatabase::open_in_memory().unwrap());
        assert!(db.user_by_username("nobody").unwrap().is_none());
        assert_eq!(db.reset_user_statuses().unwrap(), 0);
    }
}
