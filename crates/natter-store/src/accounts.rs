//! Account lookup, creation and presence updates.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use natter_proto::{ContactProfile, Presence, UserId};

use crate::database::Database;
use crate::error::{map_constraint, Result, StoreError};
use crate::models::{NewAccount, UserAccount};
use crate::password::hash_password;
use crate::validate::{validate_new_account, SignupError};

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, display_name, status, \
                               status_text, image_url, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Validate, hash and insert a new account. Returns the new user id.
    pub fn create_account(&self, account: &NewAccount) -> Result<UserId> {
        validate_new_account(account)?;

        if self.get_user_by_username(&account.username)?.is_some() {
            return Err(SignupError::UsernameExists.into());
        }

        let password_hash = hash_password(&account.password)?;
        let validation_guid = uuid::Uuid::new_v4().to_string();

        // The username can still clash with a concurrent signup here; the
        // unique index turns that into a Conflict.
        self.conn()
            .execute(
                "INSERT INTO users (username, email, password_hash, display_name, status,
                                    validation_guid, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
                params![
                    account.username,
                    account.email,
                    password_hash,
                    account.display_name,
                    validation_guid,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| map_constraint(e, "username already taken"))?;

        let id = self.conn().last_insert_rowid();
        tracing::info!(user_id = id, username = %account.username, "account created");
        Ok(UserId(id as i32))
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a full account row by username (case-insensitive).
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE username = ?1");
        let account = self
            .conn()
            .query_row(&sql, params![username], row_to_account)
            .optional()?;
        Ok(account)
    }

    /// Fetch the public profile of a user by id.
    pub fn get_user_by_id(&self, id: UserId) -> Result<Option<ContactProfile>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = ?1");
        let account = self
            .conn()
            .query_row(&sql, params![id.0], row_to_account)
            .optional()?;
        Ok(account.map(|a| a.profile()))
    }

    // ------------------------------------------------------------------
    // Presence
    // ------------------------------------------------------------------

    /// Mark a user as logged in (presence online).
    pub fn login_user(&self, id: UserId) -> Result<()> {
        self.set_status(id, Presence::Online)
    }

    /// Mark a user as logged out (presence offline).
    pub fn logout_user(&self, id: UserId) -> Result<()> {
        self.set_status(id, Presence::Offline)
    }

    pub fn set_status(&self, id: UserId, status: Presence) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET status = ?1 WHERE id = ?2",
            params![status.as_i32(), id.0],
        )?;
        if affected != 1 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Set every user offline. Run at startup, when no session can be live.
    pub fn reset_user_statuses(&self) -> Result<usize> {
        let affected = self
            .conn()
            .execute("UPDATE users SET status = 0 WHERE status <> 0", [])?;
        Ok(affected)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserAccount> {
    let id: i64 = row.get(0)?;
    let status: i32 = row.get(5)?;
    let created_str: String = row.get(8)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(UserAccount {
        id: UserId(id as i32),
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        display_name: row.get(4)?,
        // Out-of-range values written by other tools read as offline.
        status: Presence::from_i32(status).unwrap_or_default(),
        status_text: row.get(6)?,
        image_url: row.get(7)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::verify_password;

    fn new_account(username: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            password: "password1".to_string(),
            email: format!("{username}@example.com"),
            display_name: username.to_uppercase(),
        }
    }

    #[test]
    fn test_create_and_lookup() {
        let db = Database::open_in_memory().unwrap();
        let id = db.create_account(&new_account("alice")).unwrap();

        let account = db.get_user_by_username("ALICE").unwrap().expect("case-insensitive");
        assert_eq!(account.id, id);
        assert_eq!(account.status, Presence::Offline);
        assert!(verify_password("password1", &account.password_hash));

        let profile = db.get_user_by_id(id).unwrap().unwrap();
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.display_name.as_deref(), Some("ALICE"));
    }

    #[test]
    fn test_unknown_user_is_none_not_error() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_user_by_username("nobody").unwrap().is_none());
        assert!(db.get_user_by_id(UserId(77)).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_account(&new_account("alice")).unwrap();
        let err = db.create_account(&new_account("alice")).unwrap_err();
        assert!(matches!(err, StoreError::Signup(SignupError::UsernameExists)));
    }

    #[test]
    fn test_invalid_signup_rejected_before_insert() {
        let db = Database::open_in_memory().unwrap();
        let mut account = new_account("alice");
        account.password = "short".to_string();
        assert!(matches!(
            db.create_account(&account),
            Err(StoreError::Signup(SignupError::InvalidPassword))
        ));
        assert!(db.get_user_by_username("alice").unwrap().is_none());
    }

    #[test]
    fn test_presence_updates() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_account(&new_account("alice")).unwrap();
        let bob = db.create_account(&new_account("bobby")).unwrap();

        db.login_user(alice).unwrap();
        db.set_status(bob, Presence::Busy).unwrap();
        assert_eq!(db.get_user_by_id(alice).unwrap().unwrap().status, 1);
        assert_eq!(db.get_user_by_id(bob).unwrap().unwrap().status, 3);

        assert_eq!(db.reset_user_statuses().unwrap(), 2);
        assert_eq!(db.get_user_by_id(bob).unwrap().unwrap().status, 0);

        db.login_user(alice).unwrap();
        db.logout_user(alice).unwrap();
        assert_eq!(db.get_user_by_id(alice).unwrap().unwrap().status, 0);
    }

    #[test]
    fn test_status_for_missing_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.set_status(UserId(5), Presence::Away),
            Err(StoreError::NotFound)
        ));
    }
}
