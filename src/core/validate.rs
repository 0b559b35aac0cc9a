//! Input validation shared by the CRUD subsystems.

use crate::core::error::HandoverError;
use regex::Regex;
use std::sync::OnceLock;

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
    })
}

/// Normalize (trim, lowercase) and validate an email address.
pub fn normalize_email(email: &str) -> Result<String, HandoverError> {
    let normalized = email.trim().to_lowercase();
    if !email_regex().is_match(&normalized) {
        return Err(HandoverError::ValidationError(format!(
            "Invalid email address: '{}'",
            email
        )));
    }
    Ok(normalized)
}

pub fn require_non_empty(field: &str, value: &str) -> Result<(), HandoverError> {
    if value.trim().is_empty() {
        return Err(HandoverError::ValidationError(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

/// Scores and ratings share the 1..=5 scale.
pub fn validate_one_to_five(field: &str, value: u8) -> Result<u8, HandoverError> {
    if !(1..=5).contains(&value) {
        return Err(HandoverError::ValidationError(format!(
            "{} must be between 1 and 5, got {}",
            field, value
        )));
    }
    Ok(value)
}
