/// Password Hashing and Verification
///
/// bcrypt is CPU-bound; async callers go through `hash_password_blocking` and
/// `verify_password_blocking`, which move the work onto tokio's blocking pool.

use bcrypt::{hash, verify};

use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
/// bcrypt ignores everything past this many bytes
const MAX_PASSWORD_BYTES: usize = 72;

/// Validate and hash a new password with the given bcrypt cost
///
/// # Errors
/// Returns a validation error for a weak password, or an internal error if
/// bcrypt fails
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    validate_password_strength(password)?;

    hash(password, cost)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// # Errors
/// Returns error if the stored hash cannot be parsed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

pub async fn hash_password_blocking(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Hashing task failed: {}", e)))?
}

pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Verification task failed: {}", e)))?
}

/// Validate password strength requirements
///
/// Requirements:
/// - At least 8 characters and at most 72 bytes
/// - At least one digit
/// - At least one lowercase letter
/// - At least one uppercase letter
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        ));
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_BYTES,
        ));
    }

    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(ValidationError::WeakPassword(
            "Password must contain at least one digit, one lowercase letter, and one uppercase letter"
                .to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_password() {
        let password = "ValidPassword123";
        let hash = hash_password(password, TEST_COST).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("Test@1234", TEST_COST).expect("Failed to hash password");

        assert!(verify_password("Test@1234", &hash).unwrap());
        assert!(!verify_password("Test@12345", &hash).unwrap());
    }

    #[test]
    fn test_verify_against_garbage_hash_errors() {
        assert!(verify_password("Test@1234", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    fn test_too_short_password() {
        assert_eq!(
            validate_password_strength("Short1"),
            Err(ValidationError::TooShort("password".to_string(), 8))
        );
    }

    #[test]
    fn test_too_long_password() {
        let at_limit = "a".repeat(MAX_PASSWORD_BYTES - 2) + "A1";
        assert!(validate_password_strength(&at_limit).is_ok());

        let long_password = "a".repeat(MAX_PASSWORD_BYTES - 1) + "A1";
        assert_eq!(
            validate_password_strength(&long_password),
            Err(ValidationError::TooLong("password".to_string(), 72))
        );
    }

    #[test]
    fn test_byte_limit_counts_multibyte_characters() {
        // 30 two-byte characters plus 15 ASCII is 45 characters but 75 bytes
        let password = "\u{e9}".repeat(30) + "Abcdefghijklm12";
        assert!(matches!(
            validate_password_strength(&password),
            Err(ValidationError::TooLong(_, _))
        ));
    }

    #[test]
    fn test_missing_character_classes() {
        for weak in ["NoDigitsPassword", "NOLOWERCASE1", "nouppercase1"] {
            assert!(matches!(
                validate_password_strength(weak),
                Err(ValidationError::WeakPassword(_))
            ));
        }
    }

    #[test]
    fn test_weak_password_is_never_hashed() {
        assert!(matches!(
            hash_password("weak", TEST_COST),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_blocking_wrappers() {
        let hash = hash_password_blocking("Passw0rdOk".to_string(), TEST_COST)
            .await
            .unwrap();
        assert!(verify_password_blocking("Passw0rdOk".to_string(), hash)
            .await
            .unwrap());
    }
}
