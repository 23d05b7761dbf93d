//! Domain model structs persisted in the SQLite database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use natter_proto::{ContactProfile, Presence, UserId};

pub use natter_proto::PendingRequest;

/// A friend as shown in a user's contact list; identical to the public profile.
pub type Friend = ContactProfile;

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// A full account row, including the password hash. Never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub display_name: Option<String>,
    pub status: Presence,
    pub status_text: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    /// The subset of fields other users may see.
    pub fn profile(&self) -> ContactProfile {
        ContactProfile {
            user_id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            status: self.status.as_i32(),
            image_url: self.image_url.clone(),
            status_text: self.status_text.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Signup
// ---------------------------------------------------------------------------

/// Data needed to create an account. The password is plaintext and is hashed
/// before it reaches the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub email: String,
    pub display_name: String,
}
