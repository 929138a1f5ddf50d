/// JWT Authentication Middleware
///
/// Validates the bearer token from the Authorization header and injects its
/// claims into request extensions. Handlers read them with
/// `web::ReqData<Claims>`.
///
/// Each scope states which token purpose it accepts, so a first-login temp
/// token cannot reach routes that want an access token and vice versa.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{validate_token, TokenPurpose};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

pub struct JwtMiddleware {
    jwt_config: JwtSettings,
    purpose: TokenPurpose,
}

impl JwtMiddleware {
    /// Accept regular access tokens
    pub fn access(jwt_config: JwtSettings) -> Self {
        Self {
            jwt_config,
            purpose: TokenPurpose::Access,
        }
    }

    /// Accept only the temp token issued by a login that must reset first
    pub fn password_reset(jwt_config: JwtSettings) -> Self {
        Self {
            jwt_config,
            purpose: TokenPurpose::PasswordReset,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            jwt_config: self.jwt_config.clone(),
            purpose: self.purpose,
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    jwt_config: JwtSettings,
    purpose: TokenPurpose,
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token = match bearer_token(&req) {
            Some(token) => token,
            None => {
                tracing::warn!(path = %req.path(), "Missing or invalid Authorization header");
                let error: Error = AppError::Auth(AuthError::MissingToken).into();
                return Box::pin(async move { Err(error) });
            }
        };

        match validate_token(&token, &self.jwt_config, self.purpose) {
            Ok(claims) => {
                tracing::debug!(
                    user_id = %claims.sub,
                    purpose = ?claims.purpose,
                    "JWT validated successfully"
                );
                req.extensions_mut().insert(claims);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => {
                let error: Error = e.into();
                Box::pin(async move { Err(error) })
            }
        }
    }
}
