//! Account field rules.

use super::error::DomainError;

pub const MAX_USERNAME_LEN: usize = 150;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Usernames are letters, digits and `@ . + - _`, up to 150 characters.
pub fn validate_username(input: &str) -> Result<String, DomainError> {
    let username = input.trim();
    if username.is_empty() {
        return Err(DomainError::validation("username", "This field is required."));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(DomainError::validation(
            "username",
            "Ensure this value has at most 150 characters.",
        ));
    }
    let allowed = username
        .chars()
        .all(|ch| ch.is_alphanumeric() || matches!(ch, '@' | '.' | '+' | '-' | '_'));
    if !allowed {
        return Err(DomainError::validation(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(username.to_string())
}

/// Strength rules for a new password; failures are reported on the confirmation field.
pub fn validate_password(password: &str) -> Result<(), DomainError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DomainError::validation(
            "password2",
            "This password is too short. It must contain at least 8 characters.",
        ));
    }
    if password.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(DomainError::validation(
            "password2",
            "This password is entirely numeric.",
        ));
    }
    Ok(())
}

/// Lowercases the domain part, leaving the local part untouched.
pub fn normalize_email(input: &str) -> Result<String, DomainError> {
    let email = input.trim();
    if email.is_empty() {
        return Ok(String::new());
    }
    match email.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {
            Ok(format!("{local}@{}", domain.to_lowercase()))
        }
        _ => Err(DomainError::validation("email", "Enter a valid email address.")),
    }
}
