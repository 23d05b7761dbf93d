use serde::{Deserialize, Serialize};

/// Numeric account identifier assigned by the store.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct UserId(pub i32);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Presence status shown to a user's contacts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum Presence {
    #[default]
    Offline = 0,
    Online = 1,
    Away = 2,
    Busy = 3,
}

impl Presence {
    /// Accepts only the range `[0, 3]`.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Offline),
            1 => Some(Self::Online),
            2 => Some(Self::Away),
            3 => Some(Self::Busy),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Outcome of an add-contact request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum AddContactResult {
    Failed = 0,
    Success = 1,
    /// Also returned for self-adds.
    UserNotFound = 2,
    UserAlreadyContact = 3,
    UserAlreadyPending = 4,
}

impl AddContactResult {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Failed),
            1 => Some(Self::Success),
            2 => Some(Self::UserNotFound),
            3 => Some(Self::UserAlreadyContact),
            4 => Some(Self::UserAlreadyPending),
            _ => None,
        }
    }
}

/// Outcome of a confirm-contact or reject-contact request. Both share the same codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PendingResult {
    Success = 0,
    NotPending = 1,
    Failed = 2,
}

impl PendingResult {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            1 => Some(Self::NotPending),
            2 => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Public profile fields of a user, as shown to contacts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContactProfile {
    pub user_id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub status: i32,
    pub image_url: Option<String>,
    pub status_text: Option<String>,
}

/// A pending request as listed in the login snapshot of the requested user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub user_id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub image_url: Option<String>,
    pub message: Option<String>,
}
