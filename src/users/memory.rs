/// In-memory credential store
///
/// Backs the integration tests and local runs without Postgres. Every trait
/// method takes a single write (or read) guard, so compound mutations are
/// atomic in the same way the Postgres transactions are.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AppError, AuthError, DatabaseError};
use crate::users::model::{NewUser, RefreshTokenRecord, User};
use crate::users::store::{AccountChange, CredentialStore, PasswordChange};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    /// Keyed by token hash
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
}

impl Tables {
    fn user_mut(&mut self, user_id: Uuid) -> Result<&mut User, AppError> {
        self.users
            .get_mut(&user_id)
            .ok_or_else(|| AppError::Auth(AuthError::NotFound("User".to_string())))
    }

    fn revoke_all_for(&mut self, user_id: Uuid) -> usize {
        let mut revoked = 0;
        for record in self.refresh_tokens.values_mut() {
            if record.user_id == user_id && !record.is_revoked {
                record.is_revoked = true;
                revoked += 1;
            }
        }
        revoked
    }
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn insert_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;

        let taken = tables
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&new_user.email));
        if taken {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            )));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            name: new_user.name,
            password_hash: new_user.password_hash,
            role: new_user.role,
            is_active: true,
            is_first_login: new_user.is_first_login,
            password_reset_required: false,
            reset_token_hash: None,
            reset_token_expires_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&user_id).cloned())
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.reset_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let user = tables.user_mut(user_id)?;
        user.last_login_at = Some(at);
        user.reset_token_hash = None;
        user.reset_token_expires_at = None;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let user = tables.user_mut(user_id)?;
        user.reset_token_hash = Some(token_hash.to_string());
        user.reset_token_expires_at = Some(expires_at);
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn replace_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        change: PasswordChange,
    ) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;

        let user = tables.user_mut(user_id)?;
        user.password_hash = password_hash.to_string();
        match change {
            PasswordChange::FirstLoginReset => {
                user.is_first_login = false;
                user.password_reset_required = false;
            }
            PasswordChange::UserChange => {}
        }
        user.updated_at = Utc::now();
        let updated = user.clone();

        let revoked = tables.revoke_all_for(user_id);
        tracing::info!(user_id = %user_id, revoked, "Refresh tokens revoked for user");

        Ok(updated)
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        let mut tables = self.tables.write().await;

        let user = tables.users.values_mut().find(|u| {
            u.is_active
                && u.reset_token_hash.as_deref() == Some(token_hash)
                && u.has_live_reset_token(now)
        });
        let user = match user {
            Some(user) => user,
            None => return Ok(None),
        };

        user.password_hash = password_hash.to_string();
        user.reset_token_hash = None;
        user.reset_token_expires_at = None;
        user.updated_at = now;
        let updated = user.clone();

        let revoked = tables.revoke_all_for(updated.id);
        tracing::info!(user_id = %updated.id, revoked, "Refresh tokens revoked for user");

        Ok(Some(updated))
    }

    async fn apply_account_change(
        &self,
        user_id: Uuid,
        change: AccountChange,
    ) -> Result<User, AppError> {
        let mut tables = self.tables.write().await;

        let user = tables.user_mut(user_id)?;
        match change {
            AccountChange::Deactivate => user.is_active = false,
            AccountChange::RequirePasswordReset => user.password_reset_required = true,
        }
        user.updated_at = Utc::now();
        let updated = user.clone();

        let revoked = tables.revoke_all_for(user_id);
        tracing::info!(user_id = %user_id, revoked, "Refresh tokens revoked for user");

        Ok(updated)
    }

    async fn save_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        tables
            .refresh_tokens
            .retain(|_, record| record.user_id != user_id || record.expires_at > now);
        tables.refresh_tokens.insert(
            token_hash.to_string(),
            RefreshTokenRecord {
                user_id,
                token_hash: token_hash.to_string(),
                expires_at,
                is_revoked: false,
            },
        );
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.refresh_tokens.get(token_hash).cloned())
    }

    async fn revoke_refresh_token(&self, token_hash: &str) -> Result<bool, AppError> {
        let mut tables = self.tables.write().await;
        match tables.refresh_tokens.get_mut(token_hash) {
            Some(record) if !record.is_revoked => {
                record.is_revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
