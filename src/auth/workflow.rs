/// Authentication workflow
///
/// Orchestrates login, the three password mutation paths, refresh rotation and
/// the administrative account actions on top of a `CredentialStore`.
///
/// A user flagged `is_first_login` or `password_reset_required` never receives
/// an access or refresh token: login hands out a temp token instead, and
/// refresh refuses to rotate.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditLog};
use crate::auth::jwt::{generate_access_token, generate_temp_token};
use crate::auth::password::{
    hash_password_blocking, validate_password_strength, verify_password_blocking,
};
use crate::auth::refresh_token::{
    hash_token, issue_refresh_token, revoke_refresh_token, validate_refresh_token,
};
use crate::auth::reset_token::ResetToken;
use crate::configuration::{AuthSettings, BootstrapAdmin, JwtSettings, Settings};
use crate::email_client::EmailClient;
use crate::error::{AppError, AuthError};
use crate::users::{
    AccountChange, CredentialStore, NewUser, PasswordChange, Role, User, UserProfile,
};
use crate::validators::{is_valid_email, is_valid_name, is_valid_token};

/// Settings the workflow needs, cut out of the full `Settings`
#[derive(Clone)]
pub struct WorkflowSettings {
    pub jwt: JwtSettings,
    pub auth: AuthSettings,
    /// Public dashboard URL used in reset links
    pub base_url: String,
}

impl From<&Settings> for WorkflowSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            jwt: settings.jwt.clone(),
            auth: settings.auth.clone(),
            base_url: settings.application.base_url.clone(),
        }
    }
}

/// A durable session
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Authenticated(Session),
    /// Credentials were right but the password has to be replaced first.
    /// `temp_token` only unlocks the first-login reset.
    PasswordResetRequired {
        user_id: Uuid,
        email: String,
        is_first_login: bool,
        temp_token: String,
    },
}

pub struct AuthWorkflow {
    store: Arc<dyn CredentialStore>,
    email_client: EmailClient,
    settings: WorkflowSettings,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthWorkflow {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        email_client: EmailClient,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            store,
            email_client,
            settings,
        }
    }

    pub fn jwt_settings(&self) -> &JwtSettings {
        &self.settings.jwt
    }

    async fn load_user(&self, user_id: Uuid) -> Result<User, AppError> {
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Auth(AuthError::NotFound("User".to_string())))
    }

    async fn load_active_user(&self, user_id: Uuid) -> Result<User, AppError> {
        let user = self.load_user(user_id).await?;
        if !user.is_active {
            return Err(AppError::Auth(AuthError::AccountDeactivated));
        }
        Ok(user)
    }

    async fn hash_new_password(&self, new_password: &str) -> Result<String, AppError> {
        validate_password_strength(new_password)?;
        hash_password_blocking(new_password.to_string(), self.settings.auth.bcrypt_cost).await
    }

    async fn issue_session(&self, user: &User) -> Result<Session, AppError> {
        let access_token = generate_access_token(user, &self.settings.jwt)?;
        let refresh_token = issue_refresh_token(
            self.store.as_ref(),
            user.id,
            self.settings.jwt.refresh_token_expiry,
        )
        .await?;

        Ok(Session {
            access_token,
            refresh_token,
            user: UserProfile::from(user),
        })
    }

    #[tracing::instrument(name = "Login", skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let email = normalize_email(email);

        let user = match self.store.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                AuditLog::failure(AuditAction::Login, "Unknown email").emit();
                return Err(AppError::Auth(AuthError::InvalidCredentials));
            }
        };

        let matches =
            verify_password_blocking(password.to_string(), user.password_hash.clone()).await?;
        if !matches {
            AuditLog::failure(AuditAction::Login, "Wrong password")
                .with_user_id(user.id)
                .emit();
            return Err(AppError::Auth(AuthError::InvalidCredentials));
        }

        if !user.is_active {
            AuditLog::failure(AuditAction::Login, "Account deactivated")
                .with_user_id(user.id)
                .emit();
            return Err(AppError::Auth(AuthError::AccountDeactivated));
        }

        self.store.record_login(user.id, Utc::now()).await?;

        if user.requires_password_reset() {
            let temp_token = generate_temp_token(&user, &self.settings.jwt)?;
            AuditLog::success(AuditAction::Login, "Password reset required")
                .with_user_id(user.id)
                .emit();
            return Ok(LoginOutcome::PasswordResetRequired {
                user_id: user.id,
                email: user.email,
                is_first_login: user.is_first_login,
                temp_token,
            });
        }

        let session = self.issue_session(&user).await?;
        AuditLog::success(AuditAction::Login, "Signed in")
            .with_user_id(user.id)
            .emit();
        Ok(LoginOutcome::Authenticated(session))
    }

    #[tracing::instrument(name = "First-login password reset", skip(self, new_password))]
    pub async fn reset_password_first_login(
        &self,
        user_id: Uuid,
        new_password: &str,
    ) -> Result<Session, AppError> {
        let user = self.load_active_user(user_id).await?;
        if !user.requires_password_reset() {
            return Err(AppError::Auth(AuthError::NoPendingReset));
        }

        let password_hash = self.hash_new_password(new_password).await?;
        let updated = self
            .store
            .replace_password(user.id, &password_hash, PasswordChange::FirstLoginReset)
            .await?;

        AuditLog::success(AuditAction::FirstLoginReset, "Initial password replaced")
            .with_user_id(updated.id)
            .with_state_change("pending_first_login_reset", "active")
            .emit();

        self.issue_session(&updated).await
    }

    #[tracing::instrument(name = "Token password reset", skip(self, token, new_password))]
    pub async fn reset_password_with_token(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let token = is_valid_token("token", token)
            .map_err(|_| AppError::Auth(AuthError::InvalidOrExpiredToken))?;

        let token_hash = hash_token(&token);
        let user = self
            .store
            .find_by_reset_token(&token_hash)
            .await?
            .ok_or(AppError::Auth(AuthError::InvalidOrExpiredToken))?;

        if !user.has_live_reset_token(Utc::now()) {
            AuditLog::failure(AuditAction::TokenReset, "Reset token expired")
                .with_user_id(user.id)
                .emit();
            return Err(AppError::Auth(AuthError::InvalidOrExpiredToken));
        }
        if !user.is_active {
            return Err(AppError::Auth(AuthError::AccountDeactivated));
        }

        let password_hash = self.hash_new_password(new_password).await?;
        // The token may have been redeemed or replaced while bcrypt ran
        let updated = self
            .store
            .consume_reset_token(&token_hash, &password_hash, Utc::now())
            .await?
            .ok_or(AppError::Auth(AuthError::InvalidOrExpiredToken))?;

        AuditLog::success(AuditAction::TokenReset, "Password reset with emailed token")
            .with_user_id(updated.id)
            .with_state_change("pending_token_reset", "active")
            .emit();
        Ok(())
    }

    #[tracing::instrument(
        name = "Change password",
        skip(self, current_password, new_password)
    )]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        let user = self.load_active_user(user_id).await?;

        let matches =
            verify_password_blocking(current_password.to_string(), user.password_hash.clone())
                .await?;
        if !matches {
            AuditLog::failure(AuditAction::PasswordChange, "Current password mismatch")
                .with_user_id(user.id)
                .emit();
            return Err(AppError::Auth(AuthError::IncorrectPassword));
        }

        let password_hash = self.hash_new_password(new_password).await?;
        self.store
            .replace_password(user.id, &password_hash, PasswordChange::UserChange)
            .await?;

        AuditLog::success(AuditAction::PasswordChange, "Password changed")
            .with_user_id(user.id)
            .emit();
        Ok(())
    }

    /// Email a reset link. Unknown and deactivated addresses succeed silently.
    #[tracing::instrument(name = "Request password reset", skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AppError> {
        let email = normalize_email(email);

        let user = match self.store.find_by_email(&email).await? {
            Some(user) if user.is_active => user,
            Some(user) => {
                AuditLog::failure(AuditAction::PasswordResetRequest, "Account deactivated")
                    .with_user_id(user.id)
                    .emit();
                return Ok(());
            }
            None => {
                AuditLog::failure(AuditAction::PasswordResetRequest, "Unknown email").emit();
                return Ok(());
            }
        };

        let reset_token = ResetToken::new(self.settings.auth.reset_token_expiry);
        self.store
            .set_reset_token(user.id, &reset_token.token_hash(), reset_token.expires_at())
            .await?;

        let link = reset_token.reset_link(&self.settings.base_url);
        let html = format!(
            "<p>Hello {},</p>\
             <p>A password reset was requested for your SIWES portal account. \
             Click <a href=\"{}\">here</a> to choose a new password.</p>\
             <p>The link expires at {}. If you did not ask for this, ignore this email.</p>",
            user.name,
            link,
            reset_token.expires_at().to_rfc2822()
        );
        self.email_client
            .send_email(&user.email, "Reset your SIWES portal password", &html)
            .await?;

        AuditLog::success(AuditAction::PasswordResetRequest, "Reset link sent")
            .with_user_id(user.id)
            .with_state_change("active", "pending_token_reset")
            .emit();
        Ok(())
    }

    /// Rotate a refresh token into a new session
    #[tracing::instrument(name = "Refresh session", skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AppError> {
        let user_id = validate_refresh_token(self.store.as_ref(), refresh_token).await?;

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::Auth(AuthError::InvalidOrExpiredToken))?;
        if !user.is_active {
            return Err(AppError::Auth(AuthError::AccountDeactivated));
        }
        if user.requires_password_reset() {
            return Err(AppError::Auth(AuthError::InvalidOrExpiredToken));
        }

        // Losing this race means someone else already rotated the token
        let revoked = self
            .store
            .revoke_refresh_token(&hash_token(refresh_token))
            .await?;
        if !revoked {
            return Err(AppError::Auth(AuthError::InvalidOrExpiredToken));
        }

        AuditLog::success(AuditAction::TokenRefresh, "Refresh token rotated")
            .with_user_id(user.id)
            .emit();
        self.issue_session(&user).await
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        revoke_refresh_token(self.store.as_ref(), refresh_token).await?;
        AuditLog::success(AuditAction::Logout, "Refresh token revoked").emit();
        Ok(())
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<UserProfile, AppError> {
        let user = self.load_active_user(user_id).await?;
        Ok(UserProfile::from(&user))
    }

    async fn require_admin(&self, actor_id: Uuid) -> Result<User, AppError> {
        let actor = self.load_active_user(actor_id).await?;
        if actor.role != Role::Admin {
            return Err(AppError::Auth(AuthError::Forbidden(
                "administrator role required".to_string(),
            )));
        }
        Ok(actor)
    }

    #[tracing::instrument(name = "Deactivate user", skip(self))]
    pub async fn deactivate_user(
        &self,
        actor_id: Uuid,
        user_id: Uuid,
    ) -> Result<UserProfile, AppError> {
        let actor = self.require_admin(actor_id).await?;
        if actor.id == user_id {
            return Err(AppError::Auth(AuthError::Forbidden(
                "administrators cannot deactivate their own account".to_string(),
            )));
        }

        let updated = self
            .store
            .apply_account_change(user_id, AccountChange::Deactivate)
            .await?;

        AuditLog::success(AuditAction::Deactivate, "Account deactivated")
            .with_user_id(updated.id)
            .with_actor_id(actor.id)
            .with_state_change("active", "inactive")
            .emit();
        Ok(UserProfile::from(&updated))
    }

    #[tracing::instrument(name = "Require password reset", skip(self))]
    pub async fn require_password_reset(
        &self,
        actor_id: Uuid,
        user_id: Uuid,
    ) -> Result<UserProfile, AppError> {
        let actor = self.require_admin(actor_id).await?;

        let updated = self
            .store
            .apply_account_change(user_id, AccountChange::RequirePasswordReset)
            .await?;

        AuditLog::success(AuditAction::RequirePasswordReset, "Password reset forced")
            .with_user_id(updated.id)
            .with_actor_id(actor.id)
            .with_state_change("active", "pending_first_login_reset")
            .emit();
        Ok(UserProfile::from(&updated))
    }

    /// Create the configured administrator if no account uses its email yet.
    /// Returns the new account, or `None` when it already existed.
    pub async fn bootstrap_admin(&self, admin: &BootstrapAdmin) -> Result<Option<User>, AppError> {
        let email = is_valid_email(&admin.email)?;
        let name = is_valid_name(&admin.name)?;

        if self.store.find_by_email(&email).await?.is_some() {
            tracing::info!(email = %email, "Bootstrap admin already present");
            return Ok(None);
        }

        let password_hash = self.hash_new_password(&admin.password).await?;
        let user = self
            .store
            .insert_user(NewUser {
                email,
                name,
                password_hash,
                role: Role::Admin,
                is_first_login: true,
            })
            .await?;

        AuditLog::success(AuditAction::BootstrapAdmin, "Bootstrap administrator created")
            .with_user_id(user.id)
            .emit();
        Ok(Some(user))
    }
}
