//! Signup field validation.
//!
//! Rules: usernames are 5-15 characters of `[A-Za-z0-9_]`, passwords are
//! 8-20 printable non-space characters, display names are 1-20 characters,
//! e-mail addresses are at most 320 characters of the usual `local@domain`
//! shape.

use thiserror::Error;

use crate::models::NewAccount;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupError {
    #[error("missing required field")]
    BadRequest,

    #[error("invalid username")]
    InvalidUsername,

    #[error("username already exists")]
    UsernameExists,

    #[error("invalid password")]
    InvalidPassword,

    #[error("invalid email")]
    InvalidEmail,

    #[error("invalid display name")]
    InvalidDisplayName,
}

impl SignupError {
    /// Numeric code reported to signup front-ends.
    pub fn code(self) -> i32 {
        match self {
            SignupError::BadRequest => -1,
            SignupError::InvalidUsername => -2,
            SignupError::UsernameExists => -3,
            SignupError::InvalidPassword => -4,
            SignupError::InvalidEmail => -5,
            SignupError::InvalidDisplayName => -6,
        }
    }
}

pub fn validate_username(username: &str) -> Result<(), SignupError> {
    let len = username.chars().count();
    let charset_ok = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if (5..=15).contains(&len) && charset_ok {
        Ok(())
    } else {
        Err(SignupError::InvalidUsername)
    }
}

pub fn validate_password(password: &str) -> Result<(), SignupError> {
    let len = password.chars().count();
    let charset_ok = password.chars().all(|c| c.is_ascii_graphic() || c == '£');
    if (8..=20).contains(&len) && charset_ok {
        Ok(())
    } else {
        Err(SignupError::InvalidPassword)
    }
}

pub fn validate_email(email: &str) -> Result<(), SignupError> {
    if email.is_empty() || email.len() > 320 {
        return Err(SignupError::InvalidEmail);
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(SignupError::InvalidEmail);
    };

    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || ".!#$%&'*+/=?^_`{|}~-".contains(c));

    let domain_ok = !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });

    if local_ok && domain_ok {
        Ok(())
    } else {
        Err(SignupError::InvalidEmail)
    }
}

pub fn validate_display_name(display_name: &str) -> Result<(), SignupError> {
    let len = display_name.chars().count();
    if (1..=20).contains(&len) {
        Ok(())
    } else {
        Err(SignupError::InvalidDisplayName)
    }
}

/// Validate every field of a signup request. Does not check username availability.
pub fn validate_new_account(account: &NewAccount) -> Result<(), SignupError> {
    if account.username.is_empty()
        || account.password.is_empty()
        || account.email.is_empty()
        || account.display_name.is_empty()
    {
        return Err(SignupError::BadRequest);
    }
    validate_username(&account.username)?;
    validate_password(&account.password)?;
    validate_email(&account.email)?;
    validate_display_name(&account.display_name)?;
    Ok(())
}
