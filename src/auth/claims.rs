/// JWT Claims structure
///
/// Represents the payload of a JWT token containing user information
/// and standard JWT claims (RFC 7519).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::users::Role;

/// What a token may be used for. A temp token only unlocks the first-login
/// reset endpoint; it is never accepted as an access token.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    PasswordReset,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub purpose: TokenPurpose,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
}

impl Claims {
    pub fn new(
        user_id: Uuid,
        email: String,
        role: Role,
        purpose: TokenPurpose,
        expiry_seconds: i64,
        issuer: String,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            email,
            role,
            purpose,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// Returns `TokenInvalid` if the subject is not a UUID
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Auth(AuthError::TokenInvalid))
    }

    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(user_id: Uuid) -> Claims {
        Claims::new(
            user_id,
            "test@example.com".to_string(),
            Role::Coordinator,
            TokenPurpose::Access,
            3600,
            "test".to_string(),
        )
    }

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = claims(user_id);

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.role, Role::Coordinator);
        assert!(!claims.is_expired());
        assert!(!claims.is_admin());
    }

    #[test]
    fn test_user_id_extraction() {
        let user_id = Uuid::new_v4();
        assert_eq!(claims(user_id).user_id().unwrap(), user_id);
    }

    #[test]
    fn test_invalid_user_id() {
        let mut claims = claims(Uuid::new_v4());
        claims.sub = "invalid-uuid".to_string();

        assert!(matches!(
            claims.user_id(),
            Err(AppError::Auth(AuthError::TokenInvalid))
        ));
    }

    #[test]
    fn test_purpose_serializes_snake_case() {
        let json = serde_json::to_value(TokenPurpose::PasswordReset).unwrap();
        assert_eq!(json, "password_reset");
    }
}
