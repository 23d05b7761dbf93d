//! Friend lists and the pending-request table.
//!
//! Pending rows are directed: `(requester_id, target_id)`. A user's pending
//! list is every row whose target is that user. Confirmed contacts are stored
//! as two rows, one per direction.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use natter_proto::UserId;

use crate::database::Database;
use crate::error::{map_constraint, Result, StoreError};
use crate::models::{Friend, PendingRequest};

impl Database {
    // ------------------------------------------------------------------
    // Confirmed contacts
    // ------------------------------------------------------------------

    /// Profiles of every confirmed contact of `user`, ordered by username.
    pub fn get_friends(&self, user: UserId) -> Result<Vec<Friend>> {
        let mut stmt = self.conn().prepare(
            "SELECT u.id, u.username, u.display_name, u.status, u.image_url, u.status_text
             FROM contacts c
             JOIN users u ON u.id = c.contact_id
             WHERE c.user_id = ?1
             ORDER BY u.username ASC",
        )?;

        let rows = stmt.query_map(params![user.0], row_to_friend)?;

        let mut friends = Vec::new();
        for row in rows {
            friends.push(row?);
        }
        Ok(friends)
    }

    /// Whether `other` is a confirmed contact of `user`.
    pub fn find_contact(&self, user: UserId, other: UserId) -> Result<bool> {
        let found = self
            .conn()
            .query_row(
                "SELECT 1 FROM contacts WHERE user_id = ?1 AND contact_id = ?2",
                params![user.0, other.0],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    // ------------------------------------------------------------------
    // Pending requests
    // ------------------------------------------------------------------

    /// Requests waiting for `target` to confirm or reject, oldest first.
    pub fn get_pending_contacts(&self, target: UserId) -> Result<Vec<PendingRequest>> {
        let mut stmt = self.conn().prepare(
            "SELECT u.id, u.username, u.display_name, u.image_url, p.message
             FROM pending_contacts p
             JOIN users u ON u.id = p.requester_id
             WHERE p.target_id = ?1
             ORDER BY p.id ASC",
        )?;

        let rows = stmt.query_map(params![target.0], |row| {
            Ok(PendingRequest {
                user_id: UserId(row.get(0)?),
                username: row.get(1)?,
                display_name: row.get(2)?,
                image_url: row.get(3)?,
                message: row.get(4)?,
            })
        })?;

        let mut pending = Vec::new();
        for row in rows {
            pending.push(row?);
        }
        Ok(pending)
    }

    pub fn find_pending_contact(&self, requester: UserId, target: UserId) -> Result<bool> {
        let found = self
            .conn()
            .query_row(
                "SELECT 1 FROM pending_contacts WHERE requester_id = ?1 AND target_id = ?2",
                params![requester.0, target.0],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Record a request from `requester` to `target`.
    ///
    /// A second request for the same pair fails with [`StoreError::Conflict`].
    pub fn add_pending_contact(
        &self,
        requester: UserId,
        target: UserId,
        message: Option<&str>,
    ) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO pending_contacts (requester_id, target_id, message, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![requester.0, target.0, message, Utc::now().to_rfc3339()],
            )
            .map_err(|e| map_constraint(e, "request already pending"))?;
        Ok(())
    }

    /// Consume the pending row `(requester, target)`, along with any
    /// `(target, requester)` row, and create the contact pair atomically.
    ///
    /// Fails with [`StoreError::NotFound`] if the row is already gone and
    /// with [`StoreError::Conflict`] if the pair is already connected.
    pub fn confirm_contact(&self, requester: UserId, target: UserId) -> Result<()> {
        let tx = self.conn().unchecked_transaction()?;

        let removed = tx.execute(
            "DELETE FROM pending_contacts WHERE requester_id = ?1 AND target_id = ?2",
            params![requester.0, target.0],
        )?;
        if removed != 1 {
            return Err(StoreError::NotFound);
        }

        let now = Utc::now().to_rfc3339();
        for (owner, other) in [(requester, target), (target, requester)] {
            tx.execute(
                "INSERT INTO contacts (user_id, contact_id, created_at) VALUES (?1, ?2, ?3)",
                params![owner.0, other.0, now],
            )
            .map_err(|e| map_constraint(e, "already contacts"))?;
        }

        // A crossing request in the other direction is settled as well.
        tx.execute(
            "DELETE FROM pending_contacts WHERE requester_id = ?1 AND target_id = ?2",
            params![target.0, requester.0],
        )?;

        tx.commit()?;
        tracing::debug!(%requester, %target, "contact confirmed");
        Ok(())
    }

    /// Delete the pending row `(requester, target)`.
    pub fn reject_contact(&self, requester: UserId, target: UserId) -> Result<()> {
        let removed = self.conn().execute(
            "DELETE FROM pending_contacts WHERE requester_id = ?1 AND target_id = ?2",
            params![requester.0, target.0],
        )?;
        if removed != 1 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_friend(row: &rusqlite::Row<'_>) -> rusqlite::Result<Friend> {
    Ok(Friend {
        user_id: UserId(row.get(0)?),
        username: row.get(1)?,
        display_name: row.get(2)?,
        status: row.get(3)?,
        image_url: row.get(4)?,
        status_text: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewAccount;

    fn seed(db: &Database, username: &str) -> UserId {
        db.create_account(&NewAccount {
            username: username.to_string(),
            password: "password1".to_string(),
            email: format!("{username}@example.com"),
            display_name: username.to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_pending_then_confirm() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed(&db, "alice");
        let bobby = seed(&db, "bobby");

        db.add_pending_contact(alice, bobby, Some("hi bobby")).unwrap();
        assert!(db.find_pending_contact(alice, bobby).unwrap());
        assert!(!db.find_pending_contact(bobby, alice).unwrap());

        let pending = db.get_pending_contacts(bobby).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].user_id, alice);
        assert_eq!(pending[0].message.as_deref(), Some("hi bobby"));
        assert!(db.get_pending_contacts(alice).unwrap().is_empty());

        db.confirm_contact(alice, bobby).unwrap();
        assert!(!db.find_pending_contact(alice, bobby).unwrap());
        assert!(db.find_contact(alice, bobby).unwrap());
        assert!(db.find_contact(bobby, alice).unwrap());

        let friends = db.get_friends(alice).unwrap();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].username, "bobby");
    }

    #[test]
    fn test_duplicate_pending_is_conflict() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed(&db, "alice");
        let bobby = seed(&db, "bobby");

        db.add_pending_contact(alice, bobby, None).unwrap();
        assert!(matches!(
            db.add_pending_contact(alice, bobby, None),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_confirm_without_pending_changes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed(&db, "alice");
        let bobby = seed(&db, "bobby");

        assert!(matches!(
            db.confirm_contact(alice, bobby),
            Err(StoreError::NotFound)
        ));
        assert!(!db.find_contact(alice, bobby).unwrap());
        assert!(db.get_friends(bobby).unwrap().is_empty());
    }

    #[test]
    fn test_confirm_rolls_back_when_already_contacts() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed(&db, "alice");
        let bobby = seed(&db, "bobby");

        db.add_pending_contact(alice, bobby, None).unwrap();
        db.confirm_contact(alice, bobby).unwrap();

        db.add_pending_contact(bobby, alice, None).unwrap();
        assert!(matches!(
            db.confirm_contact(bobby, alice),
            Err(StoreError::Conflict(_))
        ));
        // The failed transaction must leave the pending row in place.
        assert!(db.find_pending_contact(bobby, alice).unwrap());
    }

    #[test]
    fn test_confirm_settles_crossing_request() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed(&db, "alice");
        let bobby = seed(&db, "bobby");

        db.add_pending_contact(alice, bobby, None).unwrap();
        db.add_pending_contact(bobby, alice, Some("me too")).unwrap();
        assert_eq!(db.get_pending_contacts(alice).unwrap().len(), 1);

        db.confirm_contact(alice, bobby).unwrap();
        assert!(db.find_contact(alice, bobby).unwrap());
        assert!(!db.find_pending_contact(alice, bobby).unwrap());
        assert!(!db.find_pending_contact(bobby, alice).unwrap());
        assert!(db.get_pending_contacts(alice).unwrap().is_empty());
        assert!(db.get_pending_contacts(bobby).unwrap().is_empty());
    }

    #[test]
    fn test_reject_consumes_row_once() {
        let db = Database::open_in_memory().unwrap();
        let alice = seed(&db, "alice");
        let bobby = seed(&db, "bobby");

        db.add_pending_contact(alice, bobby, None).unwrap();
        db.reject_contact(alice, bobby).unwrap();
        assert!(matches!(
            db.reject_contact(alice, bobby),
            Err(StoreError::NotFound)
        ));
        assert!(!db.find_contact(alice, bobby).unwrap());

        // A fresh request after rejection is allowed.
        db.add_pending_contact(alice, bobby, None).unwrap();
    }
}
