//! Field format checks for the account step.
//!
//! Pure and total: every input yields `Ok(())` or a [`FormatError`] carrying
//! the inline message for that field.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::FormatError;

/// Minimum password length, counted in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{3,30}$").unwrap());

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// 3–30 ASCII letters, digits, `_` or `-`.
pub fn validate_username_format(s: &str) -> Result<(), FormatError> {
    if USERNAME_RE.is_match(s) {
        Ok(())
    } else {
        Err(FormatError::Username)
    }
}

/// A single `@` with a non-empty local part and a dotted domain.
pub fn validate_email_format(s: &str) -> Result<(), FormatError> {
    if EMAIL_RE.is_match(s) {
        Ok(())
    } else {
        Err(FormatError::Email)
    }
}

pub fn validate_password_strength(s: &str) -> Result<(), FormatError> {
    if s.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(FormatError::Password)
    }
}
