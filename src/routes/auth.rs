/// Authentication Routes
///
/// Login, the three password flows, refresh rotation, logout and the current
/// user lookup. Every handler is a thin shell over `AuthWorkflow`.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{AuthWorkflow, Claims, LoginOutcome, Session};
use crate::error::{AppError, ErrorContext, ValidationError};
use crate::routes::ApiResponse;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirstLoginResetRequest {
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResetRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Body of a login that must go through the first-login reset
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequired {
    pub requires_password_reset: bool,
    pub is_first_login: bool,
    pub user_id: Uuid,
    pub email: String,
    pub temp_token: String,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum LoginResponse {
    Session(Session),
    ResetRequired(PasswordResetRequired),
}

impl From<LoginOutcome> for LoginResponse {
    fn from(outcome: LoginOutcome) -> Self {
        match outcome {
            LoginOutcome::Authenticated(session) => LoginResponse::Session(session),
            LoginOutcome::PasswordResetRequired {
                user_id,
                email,
                is_first_login,
                temp_token,
            } => LoginResponse::ResetRequired(PasswordResetRequired {
                requires_password_reset: true,
                is_first_login,
                user_id,
                email,
                temp_token,
            }),
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field.to_string()).into());
    }
    Ok(())
}

/// POST /api/auth/login
///
/// # Errors
/// - 400: Empty email or password
/// - 401: Unknown email or wrong password
/// - 403: Account deactivated (only reported after a correct password)
pub async fn login(
    form: web::Json<LoginRequest>,
    workflow: web::Data<AuthWorkflow>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("login");
    require("email", &form.email)?;
    require("password", &form.password)?;

    let outcome = workflow.login(&form.email, &form.password).await?;

    let response = LoginResponse::from(outcome);
    match &response {
        LoginResponse::Session(session) => tracing::info!(
            request_id = %context.request_id,
            user_id = %session.user.id,
            "User logged in successfully"
        ),
        LoginResponse::ResetRequired(pending) => tracing::info!(
            request_id = %context.request_id,
            user_id = %pending.user_id,
            "Login deferred until password reset"
        ),
    }

    Ok(ApiResponse::data(response))
}

/// POST /api/auth/reset-password-first-login
///
/// Requires the temp token from login as `Authorization: Bearer <token>`.
pub async fn reset_password_first_login(
    claims: web::ReqData<Claims>,
    form: web::Json<FirstLoginResetRequest>,
    workflow: web::Data<AuthWorkflow>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let context = ErrorContext::new("first_login_reset").with_user_id(user_id.to_string());
    require("newPassword", &form.new_password)?;

    let session = workflow
        .reset_password_first_login(user_id, &form.new_password)
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = ?context.user_id,
        "First-login password reset completed"
    );
    Ok(ApiResponse::data(session))
}

/// POST /api/auth/forgot-password
///
/// Answers the same way whether or not the email belongs to an account.
pub async fn forgot_password(
    form: web::Json<ForgotPasswordRequest>,
    workflow: web::Data<AuthWorkflow>,
) -> Result<HttpResponse, AppError> {
    require("email", &form.email)?;

    workflow.request_password_reset(&form.email).await?;

    Ok(ApiResponse::message(
        "If an account exists for this email, a password reset link has been sent",
    ))
}

/// POST /api/auth/reset-password
pub async fn reset_password_with_token(
    form: web::Json<TokenResetRequest>,
    workflow: web::Data<AuthWorkflow>,
) -> Result<HttpResponse, AppError> {
    require("token", &form.token)?;
    require("newPassword", &form.new_password)?;

    workflow
        .reset_password_with_token(&form.token, &form.new_password)
        .await?;

    Ok(ApiResponse::message("Password has been reset. You can now log in"))
}

/// POST /api/auth/change-password
///
/// # Errors
/// - 400: Current password is incorrect, or the new one is too weak
/// - 401: Missing or invalid access token
pub async fn change_password(
    claims: web::ReqData<Claims>,
    form: web::Json<ChangePasswordRequest>,
    workflow: web::Data<AuthWorkflow>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    require("currentPassword", &form.current_password)?;
    require("newPassword", &form.new_password)?;

    workflow
        .change_password(user_id, &form.current_password, &form.new_password)
        .await?;

    Ok(ApiResponse::message("Password changed successfully"))
}

/// POST /api/auth/refresh
///
/// Rotates the refresh token: the presented one is revoked and a new pair is
/// issued. Reusing the old token afterwards fails.
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    workflow: web::Data<AuthWorkflow>,
) -> Result<HttpResponse, AppError> {
    require("refreshToken", &form.refresh_token)?;

    let session = workflow.refresh(&form.refresh_token).await?;
    Ok(ApiResponse::data(session))
}

/// POST /api/auth/logout
pub async fn logout(
    form: web::Json<RefreshRequest>,
    workflow: web::Data<AuthWorkflow>,
) -> Result<HttpResponse, AppError> {
    require("refreshToken", &form.refresh_token)?;

    workflow.logout(&form.refresh_token).await?;
    Ok(ApiResponse::message("Logged out"))
}

/// GET /api/auth/me
pub async fn current_user(
    claims: web::ReqData<Claims>,
    workflow: web::Data<AuthWorkflow>,
) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;
    let profile = workflow.current_user(user_id).await?;
    Ok(ApiResponse::data(profile))
}
