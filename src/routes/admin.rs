use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::auth::{AuthWorkflow, Claims};
use crate::error::{AppError, AuthError, ErrorContext};
use crate::routes::ApiResponse;

fn admin_id(claims: &Claims) -> Result<Uuid, AppError> {
    // The workflow checks the stored role again
    if !claims.is_admin() {
        return Err(AuthError::Forbidden("administrator role required".to_string()).into());
    }
    claims.user_id()
}

/// POST /api/admin/users/{id}/deactivate
pub async fn deactivate_user(
    claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
    workflow: web::Data<AuthWorkflow>,
) -> Result<HttpResponse, AppError> {
    let actor_id = admin_id(&claims)?;
    let context = ErrorContext::new("deactivate_user").with_user_id(actor_id.to_string());

    let profile = workflow.deactivate_user(actor_id, path.into_inner()).await?;

    tracing::info!(
        request_id = %context.request_id,
        actor_id = %actor_id,
        user_id = %profile.id,
        "User deactivated"
    );
    Ok(ApiResponse::data(profile))
}

/// POST /api/admin/users/{id}/require-password-reset
pub async fn require_password_reset(
    claims: web::ReqData<Claims>,
    path: web::Path<Uuid>,
    workflow: web::Data<AuthWorkflow>,
) -> Result<HttpResponse, AppError> {
    let actor_id = admin_id(&claims)?;
    let context =
        ErrorContext::new("require_password_reset").with_user_id(actor_id.to_string());

    let profile = workflow
        .require_password_reset(actor_id, path.into_inner())
        .await?;

    tracing::info!(
        request_id = %context.request_id,
        actor_id = %actor_id,
        user_id = %profile.id,
        "Password reset required for user"
    );
    Ok(ApiResponse::data(profile))
}
