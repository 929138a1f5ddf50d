/// Credential store abstraction
///
/// The workflow only talks to this trait. Every method is a single atomic unit:
/// a password replacement, its flag changes and the revocation of the user's
/// refresh tokens either all happen or none do.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::users::model::{NewUser, RefreshTokenRecord, User};

/// Which password mutation is being applied. Decides which reset fields are
/// cleared alongside the new hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordChange {
    /// Clears `is_first_login` and `password_reset_required`
    FirstLoginReset,
    /// Replaces the hash only
    UserChange,
}

/// Administrative account changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountChange {
    Deactivate,
    RequirePasswordReset,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert_user(&self, new_user: NewUser) -> Result<User, AppError>;

    /// `email` must already be normalized
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<User>, AppError>;

    /// Stamp `last_login_at` and drop any outstanding reset token
    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Replace the password hash, clear the fields `change` covers and revoke
    /// every refresh token of the user
    async fn replace_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        change: PasswordChange,
    ) -> Result<User, AppError>;

    /// Redeem an emailed reset token: set the new hash, clear the token and
    /// revoke every refresh token of the user. Only matches an active user
    /// whose token is still live at `now`, so a token is redeemed at most once.
    /// Returns `None` when nothing matched.
    async fn consume_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError>;

    /// Apply an administrative change and revoke every refresh token of the user
    async fn apply_account_change(
        &self,
        user_id: Uuid,
        change: AccountChange,
    ) -> Result<User, AppError>;

    /// Store a new refresh token and drop the user's expired ones
    async fn save_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// Returns `false` when the token was unknown or already revoked
    async fn revoke_refresh_token(&self, token_hash: &str) -> Result<bool, AppError>;
}
