/// Refresh Token Management
///
/// Refresh tokens are:
/// - 64 random alphanumeric characters
/// - Hashed with SHA-256 before storage (never store plaintext)
/// - Single-use: refreshing revokes the presented token (rotation)
/// - Revoked wholesale whenever the owner's password or account changes

use chrono::{Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::users::CredentialStore;

const REFRESH_TOKEN_LENGTH: usize = 64;

/// Generate a new random refresh token. The plaintext goes to the client,
/// the server keeps only its hash.
pub fn generate_refresh_token() -> String {
    random_token(REFRESH_TOKEN_LENGTH)
}

pub(crate) fn random_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// SHA-256 hex digest of an opaque token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Generate a refresh token for `user_id` and persist its hash
///
/// # Errors
/// Returns error if the store write fails
pub async fn issue_refresh_token(
    store: &dyn CredentialStore,
    user_id: Uuid,
    expiry_seconds: i64,
) -> Result<String, AppError> {
    let token = generate_refresh_token();
    let expires_at = Utc::now() + Duration::seconds(expiry_seconds);

    store
        .save_refresh_token(user_id, &hash_token(&token), expires_at)
        .await?;

    Ok(token)
}

/// Validate a refresh token
///
/// Checks:
/// 1. Token exists in the store
/// 2. Token has not been revoked
/// 3. Token has not expired
///
/// # Returns
/// User ID associated with the token if valid
///
/// # Errors
/// Returns `InvalidOrExpiredToken` otherwise
pub async fn validate_refresh_token(
    store: &dyn CredentialStore,
    token: &str,
) -> Result<Uuid, AppError> {
    let record = store.find_refresh_token(&hash_token(token)).await?;

    match record {
        None => {
            tracing::warn!("Refresh token not found");
            Err(AppError::Auth(AuthError::InvalidOrExpiredToken))
        }
        Some(record) if record.is_revoked => {
            tracing::warn!(user_id = %record.user_id, "Attempt to use revoked refresh token");
            Err(AppError::Auth(AuthError::InvalidOrExpiredToken))
        }
        Some(record) if !record.is_usable(Utc::now()) => {
            tracing::info!(user_id = %record.user_id, "Refresh token expired");
            Err(AppError::Auth(AuthError::InvalidOrExpiredToken))
        }
        Some(record) => Ok(record.user_id),
    }
}

/// Revoke a single refresh token. Unknown or already revoked tokens are
/// not an error.
pub async fn revoke_refresh_token(store: &dyn CredentialStore, token: &str) -> Result<(), AppError> {
    let revoked = store.revoke_refresh_token(&hash_token(token)).await?;
    if !revoked {
        tracing::debug!("Refresh token was already revoked or unknown");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{InMemoryCredentialStore, NewUser, Role};

    #[test]
    fn test_generate_refresh_token() {
        let token = generate_refresh_token();

        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_token_hashing() {
        let token = generate_refresh_token();
        let hash1 = hash_token(&token);
        let hash2 = hash_token(&token);

        assert_eq!(hash1, hash2);
        assert_ne!(token, hash1);
        // SHA-256 hex
        assert_eq!(hash1.len(), 64);
        assert_ne!(hash1, hash_token(&generate_refresh_token()));
    }

    async fn store_with_user() -> (InMemoryCredentialStore, Uuid) {
        let store = InMemoryCredentialStore::new();
        let user = store
            .insert_user(NewUser {
                email: "r@example.com".to_string(),
                name: "R".to_string(),
                password_hash: "$2b$04$hash".to_string(),
                role: Role::Student,
                is_first_login: false,
            })
            .await
            .unwrap();
        (store, user.id)
    }

    #[tokio::test]
    async fn test_issue_then_validate() {
        let (store, user_id) = store_with_user().await;
        let token = issue_refresh_token(&store, user_id, 3600).await.unwrap();

        assert_eq!(validate_refresh_token(&store, &token).await.unwrap(), user_id);
        // only the hash is stored
        assert!(store.find_refresh_token(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoked_and_expired_tokens_are_rejected() {
        let (store, user_id) = store_with_user().await;

        let token = issue_refresh_token(&store, user_id, 3600).await.unwrap();
        revoke_refresh_token(&store, &token).await.unwrap();
        assert!(matches!(
            validate_refresh_token(&store, &token).await,
            Err(AppError::Auth(AuthError::InvalidOrExpiredToken))
        ));

        let expired = issue_refresh_token(&store, user_id, -1).await.unwrap();
        assert!(validate_refresh_token(&store, &expired).await.is_err());

        assert!(validate_refresh_token(&store, "unknown").await.is_err());
    }
}
