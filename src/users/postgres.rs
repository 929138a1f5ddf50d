/// PostgreSQL credential store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AuthError};
use crate::users::model::{NewUser, RefreshTokenRecord, User, UserRow};
use crate::users::store::{AccountChange, CredentialStore, PasswordChange};

const USER_COLUMNS: &str = r#"
    id, email, name, password_hash, role, is_active, is_first_login,
    password_reset_required, reset_token_hash, reset_token_expires_at,
    last_login_at, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn select_user_where(clause: &str) -> String {
    format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, clause)
}

/// Revoke all live refresh tokens of a user inside an open transaction
async fn revoke_all_user_tokens(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE refresh_tokens
        SET is_revoked = true, revoked_at = $1
        WHERE user_id = $2 AND is_revoked = false
        "#,
    )
    .bind(Utc::now())
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    tracing::info!(
        user_id = %user_id,
        revoked = result.rows_affected(),
        "Refresh tokens revoked for user"
    );
    Ok(result.rows_affected())
}

fn user_not_found() -> AppError {
    AppError::Auth(AuthError::NotFound("User".to_string()))
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert_user(&self, new_user: NewUser) -> Result<User, AppError> {
        let now = Utc::now();
        let query = format!(
            r#"
            INSERT INTO users (id, email, name, password_hash, role, is_active,
                               is_first_login, password_reset_required, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, true, $6, false, $7, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(Uuid::new_v4())
            .bind(&new_user.email)
            .bind(&new_user.name)
            .bind(&new_user.password_hash)
            .bind(new_user.role.as_str())
            .bind(new_user.is_first_login)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        User::try_from(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&select_user_where("LOWER(email) = LOWER($1)"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&select_user_where("id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_reset_token(&self, token_hash: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&select_user_where("reset_token_hash = $1"))
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::try_from).transpose()
    }

    async fn record_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = $1,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL
            WHERE id = $2
            "#,
        )
        .bind(at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_reset_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = $1, reset_token_expires_at = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(token_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(user_not_found());
        }
        Ok(())
    }

    async fn replace_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        change: PasswordChange,
    ) -> Result<User, AppError> {
        let set_clause = match change {
            PasswordChange::FirstLoginReset => {
                "is_first_login = false, password_reset_required = false,"
            }
            PasswordChange::UserChange => "",
        };
        let query = format!(
            r#"
            UPDATE users
            SET password_hash = $1, {} updated_at = $2
            WHERE id = $3
            RETURNING {}
            "#,
            set_clause, USER_COLUMNS
        );

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(password_hash)
            .bind(Utc::now())
            .bind(user_id)
            .fetch_optional(&mut tx)
            .await?
            .ok_or_else(user_not_found)?;

        revoke_all_user_tokens(&mut tx, user_id).await?;
        tx.commit().await?;

        User::try_from(row)
    }

    async fn consume_reset_token(
        &self,
        token_hash: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        let query = format!(
            r#"
            UPDATE users
            SET password_hash = $1,
                reset_token_hash = NULL,
                reset_token_expires_at = NULL,
                updated_at = $2
            WHERE reset_token_hash = $3
              AND reset_token_expires_at > $2
              AND is_active = true
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let mut tx = self.pool.begin().await?;

        let row = match sqlx::query_as::<_, UserRow>(&query)
            .bind(password_hash)
            .bind(now)
            .bind(token_hash)
            .fetch_optional(&mut tx)
            .await?
        {
            Some(row) => row,
            None => return Ok(None),
        };

        revoke_all_user_tokens(&mut tx, row.id).await?;
        tx.commit().await?;

        User::try_from(row).map(Some)
    }

    async fn apply_account_change(
        &self,
        user_id: Uuid,
        change: AccountChange,
    ) -> Result<User, AppError> {
        let set_clause = match change {
            AccountChange::Deactivate => "is_active = false",
            AccountChange::RequirePasswordReset => "password_reset_required = true",
        };
        let query = format!(
            "UPDATE users SET {}, updated_at = $1 WHERE id = $2 RETURNING {}",
            set_clause, USER_COLUMNS
        );

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UserRow>(&query)
            .bind(Utc::now())
            .bind(user_id)
            .fetch_optional(&mut tx)
            .await?
            .ok_or_else(user_not_found)?;

        revoke_all_user_tokens(&mut tx, user_id).await?;
        tx.commit().await?;

        User::try_from(row)
    }

    async fn save_refresh_token(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let pruned = sqlx::query(
            "DELETE FROM refresh_tokens WHERE user_id = $1 AND expires_at <= $2",
        )
        .bind(user_id)
        .bind(now)
        .execute(&mut tx)
        .await?
        .rows_affected();
        if pruned > 0 {
            tracing::debug!(user_id = %user_id, pruned, "Expired refresh tokens pruned");
        }

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(now)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(
            r#"
            SELECT user_id, token_hash, expires_at, is_revoked
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn revoke_refresh_token(&self, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_revoked = true, revoked_at = $1
            WHERE token_hash = $2 AND is_revoked = false
            "#,
        )
        .bind(Utc::now())
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
