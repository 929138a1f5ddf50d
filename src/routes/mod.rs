mod admin;
mod auth;
mod health_check;

pub use admin::{deactivate_user, require_password_reset};
pub use auth::{
    change_password, current_user, forgot_password, login, logout, refresh,
    reset_password_first_login, reset_password_with_token,
};
pub use health_check::health_check;

use actix_web::HttpResponse;
use serde::Serialize;

/// Success envelope shared by every JSON route
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn data(data: T) -> HttpResponse {
        HttpResponse::Ok().json(ApiResponse {
            success: true,
            data: Some(data),
            message: None,
        })
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> HttpResponse {
        HttpResponse::Ok().json(ApiResponse::<()> {
            success: true,
            data: None,
            message: Some(message.into()),
        })
    }
}
