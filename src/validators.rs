/// Input validators for authentication requests
///
/// Emails are trimmed and lower-cased here, so every lookup in the credential
/// store sees the same normalized form.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_NAME_LENGTH: usize = 256;
const MAX_TOKEN_LENGTH: usize = 512;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).expect("email regex is valid");
}

/// Validates an email address and returns its normalized (trimmed,
/// lower-cased) form
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    if trimmed.len() < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    if has_suspicious_email_patterns(trimmed) {
        return Err(ValidationError::SuspiciousContent("email".to_string()));
    }

    Ok(trimmed.to_lowercase())
}

/// Validates a display name
pub fn is_valid_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("name".to_string()));
    }

    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("name".to_string(), MAX_NAME_LENGTH));
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent("name".to_string()));
    }

    Ok(trimmed.to_string())
}

/// Validates an opaque token supplied by a client (reset or refresh token)
pub fn is_valid_token(field: &str, token: &str) -> Result<String, ValidationError> {
    let trimmed = token.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()));
    }

    if trimmed.len() > MAX_TOKEN_LENGTH {
        return Err(ValidationError::TooLong(field.to_string(), MAX_TOKEN_LENGTH));
    }

    if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat(field.to_string()));
    }

    Ok(trimmed.to_string())
}

fn has_suspicious_email_patterns(email: &str) -> bool {
    // Local part longer than RFC 5321 allows
    if let Some(at_pos) = email.find('@') {
        if at_pos > 64 {
            return true;
        }
    }

    if email.matches('@').count() != 1 {
        return true;
    }

    email.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(is_valid_email("user@example.com").is_ok());
        assert!(is_valid_email("test.email@domain.co.uk").is_ok());
        assert!(is_valid_email("user+tag@example.com").is_ok());
    }

    #[test]
    fn test_email_is_normalized() {
        assert_eq!(
            is_valid_email("  Test@Example.COM ").unwrap(),
            "test@example.com"
        );
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(is_valid_email("invalid").is_err());
        assert!(is_valid_email("user@").is_err());
        assert!(is_valid_email("@example.com").is_err());
        assert!(is_valid_email("user@@example.com").is_err());
        assert!(is_valid_email("").is_err());
    }

    #[test]
    fn test_email_length_limits() {
        let too_long = format!("{}@example.com", "a".repeat(250));
        assert!(is_valid_email(&too_long).is_err());

        assert!(is_valid_email("a@b.").is_err());
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("Adaeze Okafor").is_ok());
        assert!(is_valid_name("Jean-Pierre").is_ok());
        assert!(is_valid_name("O'Brien").is_ok());
    }

    #[test]
    fn test_name_rejects_empty_and_control_chars() {
        assert!(is_valid_name("   ").is_err());
        assert!(is_valid_name("Name\0with\0null").is_err());
        assert!(is_valid_name(&"a".repeat(257)).is_err());
    }

    #[test]
    fn test_token_validation() {
        assert_eq!(is_valid_token("token", " abcDEF123 ").unwrap(), "abcDEF123");
        assert!(is_valid_token("token", "").is_err());
        assert!(is_valid_token("token", "abc-def").is_err());
        assert!(is_valid_token("token", &"a".repeat(513)).is_err());
    }
}
